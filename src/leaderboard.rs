use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{MonthlySnapshot, Rank, StaffRecord};
use crate::normalize::{name_key, MonthKey};
use crate::quota::{evaluate_snapshot, QuotaEvaluation};
use crate::reliability::{tally_history, ReliabilityTally, TimeWindow};

pub const LEADERBOARD_SIZE: usize = 5;
pub const ANALYSIS_MONTHS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    pub name: String,
    pub rank: Rank,
    pub ig: u64,
    pub forum: u64,
    pub discord: u64,
    pub total: u64,
    pub reliability: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Leaderboard {
    pub top_ig: Vec<Performance>,
    pub top_forum: Vec<Performance>,
    pub top_discord: Vec<Performance>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifetimeTotals {
    pub ig: u64,
    pub forum: u64,
    pub discord: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthEvaluation {
    pub snapshot: MonthlySnapshot,
    pub evaluation: QuotaEvaluation,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndividualAnalysis {
    pub name: String,
    pub rank: Rank,
    pub months: Vec<MonthEvaluation>,
    pub met_count: usize,
    pub reliability: u32,
    pub strikes: Vec<MonthKey>,
}

pub fn performance(staff: &StaffRecord, window: TimeWindow, today: NaiveDate) -> Performance {
    let tally = tally_history(&staff.history, staff.rank, &staff.leaves, window, today);
    let (ig, forum, discord) = match window {
        TimeWindow::Lifetime => (
            u64::from(staff.lifetime_ig),
            u64::from(staff.lifetime_forum),
            u64::from(staff.lifetime_discord),
        ),
        _ => (tally.ig_sum, tally.forum_sum, tally.discord_sum),
    };

    Performance {
        name: staff.name.clone(),
        rank: staff.rank,
        ig,
        forum,
        discord,
        total: ig + forum + discord,
        reliability: tally.reliability(),
    }
}

pub fn build_leaderboard(staff: &[StaffRecord], window: TimeWindow, today: NaiveDate) -> Leaderboard {
    let rows: Vec<Performance> = staff
        .iter()
        .filter(|member| member.is_active)
        .map(|member| performance(member, window, today))
        .collect();

    Leaderboard {
        top_ig: top_by(&rows, |p| p.ig),
        top_forum: top_by(&rows, |p| p.forum),
        top_discord: top_by(&rows, |p| p.discord),
    }
}

fn top_by(rows: &[Performance], key: impl Fn(&Performance) -> u64) -> Vec<Performance> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| key(b).cmp(&key(a)));
    sorted
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .filter(|p| key(p) > 0)
        .collect()
}

/// Side-by-side figures for the named staff, in the order given. Unknown names
/// are skipped.
pub fn compare_staff(
    staff: &[StaffRecord],
    names: &[String],
    window: TimeWindow,
    today: NaiveDate,
) -> Vec<Performance> {
    names
        .iter()
        .filter_map(|name| {
            let key = name_key(name);
            staff.iter().find(|member| name_key(&member.name) == key)
        })
        .map(|member| performance(member, window, today))
        .collect()
}

pub fn lifetime_totals(staff: &[StaffRecord]) -> LifetimeTotals {
    staff.iter().fold(LifetimeTotals::default(), |acc, member| LifetimeTotals {
        ig: acc.ig + u64::from(member.lifetime_ig),
        forum: acc.forum + u64::from(member.lifetime_forum),
        discord: acc.discord + u64::from(member.lifetime_discord),
    })
}

/// Quota outcome of a staff member's latest months.
pub fn individual_analysis(staff: &StaffRecord) -> IndividualAnalysis {
    let months: Vec<MonthEvaluation> = staff
        .history
        .iter()
        .take(ANALYSIS_MONTHS)
        .map(|snapshot| MonthEvaluation {
            snapshot: snapshot.clone(),
            evaluation: evaluate_snapshot(snapshot, staff.rank, &staff.leaves),
        })
        .collect();

    let mut tally = ReliabilityTally::default();
    for month in &months {
        tally.record(&month.snapshot, month.evaluation.status.counts_as_met());
    }

    IndividualAnalysis {
        name: staff.name.clone(),
        rank: staff.rank,
        met_count: tally.met,
        reliability: tally.reliability(),
        strikes: staff
            .history
            .iter()
            .filter(|s| s.strike > 0)
            .map(|s| s.month)
            .collect(),
        months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::tests::snapshot;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn member(name: &str, history: Vec<MonthlySnapshot>) -> StaffRecord {
        let mut record = StaffRecord::new(name, Rank::Support, true);
        record.history = history;
        record
    }

    fn with_discord(mut row: MonthlySnapshot, discord: u32) -> MonthlySnapshot {
        row.new_discord = discord;
        row
    }

    #[test]
    fn leaderboard_ranks_active_staff_in_month() {
        let mut inactive = member("Zed", vec![snapshot(2024, 5, 500, 0)]);
        inactive.is_active = false;
        let staff = vec![
            member("Ash", vec![snapshot(2024, 5, 40, 2)]),
            member("June", vec![snapshot(2024, 5, 55, 0)]),
            member("Kai", vec![snapshot(2024, 4, 90, 9)]),
            inactive,
        ];

        let board = build_leaderboard(
            &staff,
            TimeWindow::Month(MonthKey::new(2024, 5).unwrap()),
            today(),
        );
        let names: Vec<&str> = board.top_ig.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["June", "Ash"]);
        assert_eq!(board.top_forum.len(), 1);
        assert!(board.top_discord.is_empty());
    }

    #[test]
    fn leaderboard_keeps_five_entries() {
        let staff: Vec<StaffRecord> = (1..=7)
            .map(|i| member(&format!("Staff {i}"), vec![with_discord(snapshot(2024, 5, i, 0), i)]))
            .collect();
        let board = build_leaderboard(&staff, TimeWindow::Lifetime, today());
        assert!(board.top_ig.is_empty());

        let board = build_leaderboard(&staff, TimeWindow::TrailingMonths(6), today());
        assert_eq!(board.top_discord.len(), 5);
        assert_eq!(board.top_discord[0].discord, 7);
    }

    #[test]
    fn lifetime_window_uses_latest_totals() {
        let mut ash = member("Ash", vec![snapshot(2024, 5, 30, 0)]);
        ash.lifetime_ig = 1200;
        ash.lifetime_forum = 40;
        let result = performance(&ash, TimeWindow::Lifetime, today());
        assert_eq!(result.ig, 1200);
        assert_eq!(result.total, 1240);
        assert_eq!(result.reliability, 100);

        assert_eq!(lifetime_totals(&[ash]).ig, 1200);
    }

    #[test]
    fn range_window_sums_new_counters() {
        let staff = member(
            "Ash",
            vec![snapshot(2024, 5, 30, 1), snapshot(2024, 4, 10, 2), snapshot(2024, 1, 99, 0)],
        );
        let window = TimeWindow::DateRange {
            start: NaiveDate::from_ymd_opt(2024, 4, 1),
            end: NaiveDate::from_ymd_opt(2024, 5, 31),
        };
        let result = performance(&staff, window, today());
        assert_eq!(result.ig, 40);
        assert_eq!(result.forum, 3);
        assert_eq!(result.reliability, 50);
    }

    #[test]
    fn comparison_follows_requested_order() {
        let staff = vec![member("Ash", vec![]), member("June", vec![])];
        let names = vec!["june".to_string(), "Nobody".to_string(), "Ash".to_string()];
        let rows = compare_staff(&staff, &names, TimeWindow::Lifetime, today());
        let order: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["June", "Ash"]);
        assert_eq!(rows[0].reliability, 0);
    }

    #[test]
    fn analysis_covers_latest_six_months() {
        let mut history: Vec<MonthlySnapshot> = (1..=8).rev().map(|m| snapshot(2024, m, 30, 0)).collect();
        history[1].new_ig = 0;
        history[1].strike = 1;
        let analysis = individual_analysis(&member("Ash", history));
        assert_eq!(analysis.months.len(), 6);
        assert_eq!(analysis.met_count, 5);
        assert_eq!(analysis.reliability, 83);
        assert_eq!(analysis.strikes, vec![MonthKey::new(2024, 7).unwrap()]);
    }

    #[test]
    fn analysis_matches_staff_reliability() {
        let staff = member(
            "June",
            vec![snapshot(2024, 5, 26, 0), snapshot(2024, 4, 10, 0), snapshot(2024, 3, 30, 0)],
        );
        let analysis = individual_analysis(&staff);
        assert_eq!(analysis.reliability, 67);
        assert_eq!(
            analysis.reliability,
            crate::reliability::staff_reliability(&staff, TimeWindow::Lifetime, today())
        );
        assert_eq!(individual_analysis(&member("Kai", vec![])).reliability, 0);
    }
}
