use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{LeaveInterval, MonthlySnapshot, Rank, StaffRecord};
use crate::normalize::{months_before, MonthKey};
use crate::quota::evaluate_snapshot;

/// Which months of a history a view looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeWindow {
    Lifetime,
    TrailingMonths(u32),
    Month(MonthKey),
    /// Inclusive bounds on the first day of each month; a missing bound is open.
    DateRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl TimeWindow {
    pub fn contains(&self, month: MonthKey, today: NaiveDate) -> bool {
        match *self {
            TimeWindow::Lifetime => true,
            TimeWindow::TrailingMonths(months) => month.first_day() >= months_before(today, months),
            TimeWindow::Month(target) => month == target,
            TimeWindow::DateRange { start, end } => {
                let day = month.first_day();
                start.map_or(true, |start| day >= start) && end.map_or(true, |end| day <= end)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TimeWindow::Lifetime => "lifetime".to_string(),
            TimeWindow::TrailingMonths(months) => format!("last {months} months"),
            TimeWindow::Month(month) => month.label(),
            TimeWindow::DateRange { start, end } => format!(
                "{} to {}",
                start.map(|d| d.to_string()).unwrap_or_else(|| "start".to_string()),
                end.map(|d| d.to_string()).unwrap_or_else(|| "now".to_string())
            ),
        }
    }
}

/// Pooled quota outcomes and raw counters over some set of months.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReliabilityTally {
    pub met: usize,
    pub total: usize,
    pub ig_sum: u64,
    pub forum_sum: u64,
    pub discord_sum: u64,
}

impl ReliabilityTally {
    pub fn record(&mut self, snapshot: &MonthlySnapshot, met: bool) {
        self.total += 1;
        if met {
            self.met += 1;
        }
        self.ig_sum += u64::from(snapshot.new_ig);
        self.forum_sum += u64::from(snapshot.new_forum);
        self.discord_sum += u64::from(snapshot.new_discord);
    }

    pub fn merge(&mut self, other: &ReliabilityTally) {
        self.met += other.met;
        self.total += other.total;
        self.ig_sum += other.ig_sum;
        self.forum_sum += other.forum_sum;
        self.discord_sum += other.discord_sum;
    }

    /// Whole percentage of months met; 0 when nothing was evaluated.
    pub fn reliability(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            (100.0 * self.met as f64 / self.total as f64).round() as u32
        }
    }

    pub fn avg_ig(&self) -> f64 {
        average(self.ig_sum, self.total)
    }

    pub fn avg_forum(&self) -> f64 {
        average(self.forum_sum, self.total)
    }
}

fn average(sum: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

pub fn tally_history(
    history: &[MonthlySnapshot],
    rank: Rank,
    leaves: &[LeaveInterval],
    window: TimeWindow,
    today: NaiveDate,
) -> ReliabilityTally {
    let mut tally = ReliabilityTally::default();
    for snapshot in history.iter().filter(|s| window.contains(s.month, today)) {
        let evaluation = evaluate_snapshot(snapshot, rank, leaves);
        tally.record(snapshot, evaluation.status.counts_as_met());
    }
    tally
}

pub fn aggregate_reliability(
    history: &[MonthlySnapshot],
    rank: Rank,
    leaves: &[LeaveInterval],
    window: TimeWindow,
    today: NaiveDate,
) -> u32 {
    tally_history(history, rank, leaves, window, today).reliability()
}

pub fn staff_reliability(staff: &StaffRecord, window: TimeWindow, today: NaiveDate) -> u32 {
    aggregate_reliability(&staff.history, staff.rank, &staff.leaves, window, today)
}

/// Pools every staff member of `rank`, active or not.
pub fn group_tally(
    staff: &[StaffRecord],
    rank: Rank,
    window: TimeWindow,
    today: NaiveDate,
) -> ReliabilityTally {
    staff
        .iter()
        .filter(|member| member.rank == rank)
        .fold(ReliabilityTally::default(), |mut pooled, member| {
            pooled.merge(&tally_history(
                &member.history,
                member.rank,
                &member.leaves,
                window,
                today,
            ));
            pooled
        })
}

#[derive(Debug, Clone, Serialize)]
pub struct RankRollup {
    pub rank: Rank,
    pub reliability_six_months: u32,
    pub reliability_lifetime: u32,
    pub avg_ig: f64,
    pub avg_forum: Option<f64>,
    pub months_evaluated: usize,
}

pub fn rank_rollup(staff: &[StaffRecord], rank: Rank, today: NaiveDate) -> RankRollup {
    let recent = group_tally(staff, rank, TimeWindow::TrailingMonths(6), today);
    let lifetime = group_tally(staff, rank, TimeWindow::Lifetime, today);

    RankRollup {
        rank,
        reliability_six_months: recent.reliability(),
        reliability_lifetime: lifetime.reliability(),
        avg_ig: lifetime.avg_ig(),
        avg_forum: rank.is_senior().then(|| lifetime.avg_forum()),
        months_evaluated: lifetime.total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::tests::snapshot;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn member(name: &str, rank: Rank, history: Vec<MonthlySnapshot>) -> StaffRecord {
        let mut record = StaffRecord::new(name, rank, true);
        record.history = history;
        record
    }

    #[test]
    fn empty_history_is_zero_percent() {
        let result = aggregate_reliability(&[], Rank::Support, &[], TimeWindow::Lifetime, today());
        assert_eq!(result, 0);
    }

    #[test]
    fn grace_counts_toward_reliability() {
        let history = vec![
            snapshot(2024, 5, 30, 0),
            snapshot(2024, 4, 26, 0),
            snapshot(2024, 3, 10, 0),
        ];
        let result = aggregate_reliability(&history, Rank::Support, &[], TimeWindow::Lifetime, today());
        assert_eq!(result, 67);
    }

    #[test]
    fn windows_filter_months() {
        let history = vec![
            snapshot(2024, 5, 30, 0),
            snapshot(2024, 1, 30, 0),
            snapshot(2023, 6, 0, 0),
        ];
        let rel = |window| aggregate_reliability(&history, Rank::Support, &[], window, today());

        assert_eq!(rel(TimeWindow::Lifetime), 67);
        assert_eq!(rel(TimeWindow::TrailingMonths(6)), 100);
        assert_eq!(rel(TimeWindow::Month(MonthKey::new(2023, 6).unwrap())), 0);
        assert_eq!(rel(TimeWindow::Month(MonthKey::new(2022, 1).unwrap())), 0);
        assert_eq!(
            rel(TimeWindow::DateRange {
                start: NaiveDate::from_ymd_opt(2023, 1, 1),
                end: NaiveDate::from_ymd_opt(2024, 1, 1),
            }),
            50
        );
        assert_eq!(
            rel(TimeWindow::DateRange {
                start: None,
                end: NaiveDate::from_ymd_opt(2023, 12, 31),
            }),
            0
        );
    }

    #[test]
    fn leave_records_feed_into_each_month() {
        let history = vec![snapshot(2024, 5, 16, 0)];
        let leaves = vec![LeaveInterval {
            start: "2024-05-01".to_string(),
            end: "2024-05-15".to_string(),
        }];
        assert_eq!(
            aggregate_reliability(&history, Rank::Support, &leaves, TimeWindow::Lifetime, today()),
            100
        );
        assert_eq!(
            aggregate_reliability(&history, Rank::Support, &[], TimeWindow::Lifetime, today()),
            0
        );
    }

    #[test]
    fn group_rollup_pools_by_rank() {
        let staff = vec![
            member("Ash", Rank::Support, vec![snapshot(2024, 5, 30, 0), snapshot(2024, 4, 0, 0)]),
            member("June", Rank::Support, vec![snapshot(2024, 5, 40, 0)]),
            member("Kai", Rank::SeniorSupport, vec![snapshot(2024, 5, 10, 8)]),
        ];

        let support = rank_rollup(&staff, Rank::Support, today());
        assert_eq!(support.reliability_lifetime, 67);
        assert_eq!(support.months_evaluated, 3);
        assert!((support.avg_ig - 70.0 / 3.0).abs() < 0.001);
        assert_eq!(support.avg_forum, None);

        let senior = rank_rollup(&staff, Rank::SeniorSupport, today());
        assert_eq!(senior.reliability_lifetime, 0);
        assert_eq!(senior.avg_forum, Some(8.0));
    }

    #[test]
    fn empty_group_has_zero_averages() {
        let senior = rank_rollup(&[], Rank::SeniorSupport, today());
        assert_eq!(senior.reliability_six_months, 0);
        assert_eq!(senior.avg_ig, 0.0);
        assert_eq!(senior.avg_forum, Some(0.0));
    }
}
