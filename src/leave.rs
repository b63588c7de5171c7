use chrono::NaiveDate;

use crate::models::LeaveInterval;
use crate::normalize::{parse_date, MonthKey};

/// Leave days falling inside `month`, summed over every interval.
///
/// Intervals are not merged, so overlapping records count twice. Intervals with
/// an unreadable or reversed date range contribute nothing.
pub fn leave_days_in_month(month: MonthKey, leaves: &[LeaveInterval]) -> u32 {
    let month_start = month.first_day();
    let month_end = month.last_day();

    leaves
        .iter()
        .filter_map(interval)
        .map(|(start, end)| overlap_days(start.max(month_start), end.min(month_end)))
        .sum()
}

/// Inclusive length of a raw leave range; 0 when malformed or reversed.
pub fn leave_days_between(start: &str, end: &str) -> u32 {
    match (parse_date(start), parse_date(end)) {
        (Some(start), Some(end)) => overlap_days(start, end),
        _ => 0,
    }
}

pub fn covers(leave: &LeaveInterval, day: NaiveDate) -> bool {
    interval(leave)
        .map(|(start, end)| start <= day && day <= end)
        .unwrap_or(false)
}

fn interval(leave: &LeaveInterval) -> Option<(NaiveDate, NaiveDate)> {
    let start = parse_date(&leave.start)?;
    let end = parse_date(&leave.end)?;
    (end >= start).then_some((start, end))
}

fn overlap_days(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        0
    } else {
        ((end - start).num_days() + 1) as u32
    }
}
