use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::leave::leave_days_between;
use crate::models::{RosterRow, StatRow};
use crate::normalize::{compact_name, flag_cell, parse_count, parse_flag, MonthKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Baseline {
    pub name: String,
    pub is_senior: bool,
    pub prev_ig: u32,
    pub prev_forum: u32,
    pub prev_discord: u32,
    pub fetched_forum_total: u32,
    pub has_baseline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLine {
    pub name: String,
    pub quizzes_accepted: u32,
    pub quizzes_rejected: u32,
    pub total_reports: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedEntry {
    pub baseline: Baseline,
    pub current_ig: u32,
    pub current_forum: u32,
    pub quizzes_accepted: u32,
    pub quizzes_rejected: u32,
}

/// Operator input collected between staging and commit, keyed by compact name.
#[derive(Debug, Clone, Default)]
pub struct BatchOverrides {
    pub discord_totals: HashMap<String, u32>,
    pub leave_ranges: HashMap<String, (String, String)>,
}

/// Running totals for every active staff member, taken from their most recent
/// stat row. `forum_authors` holds one entry per row of the forum reports table.
pub fn build_baselines(roster: &[RosterRow], stats: &[StatRow], forum_authors: &[String]) -> Vec<Baseline> {
    let mut baselines: HashMap<String, Baseline> = HashMap::new();
    for row in roster.iter().filter(|r| parse_flag(&r.support)) {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }
        baselines.insert(
            compact_name(name),
            Baseline {
                name: name.to_string(),
                is_senior: parse_flag(&row.senior_support),
                prev_ig: 0,
                prev_forum: 0,
                prev_discord: 0,
                fetched_forum_total: 0,
                has_baseline: false,
            },
        );
    }

    for row in stats.iter().rev() {
        if let Some(baseline) = baselines.get_mut(&compact_name(&row.staff_name)) {
            if !baseline.has_baseline {
                baseline.prev_ig = parse_count(&row.total_ig);
                baseline.prev_forum = parse_count(&row.total_forum);
                baseline.prev_discord = parse_count(&row.total_discord);
                baseline.has_baseline = true;
            }
        }
    }

    for author in forum_authors {
        if let Some(baseline) = baselines.get_mut(&compact_name(author)) {
            baseline.fetched_forum_total += 1;
        }
    }

    let mut baselines: Vec<Baseline> = baselines.into_values().collect();
    baselines.sort_by_key(|b| b.name.to_lowercase());
    baselines
}

fn panel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9_ -]+)\t(\d+)\t(\d+)\t([\d,]+)").expect("panel pattern is valid")
    })
}

/// Lines that do not look like `name, accepted, rejected, total` are skipped.
pub fn parse_panel(text: &str) -> Vec<PanelLine> {
    text.lines()
        .filter_map(|line| {
            let caps = panel_pattern().captures(line)?;
            Some(PanelLine {
                name: caps[1].to_string(),
                quizzes_accepted: parse_count(&caps[2]),
                quizzes_rejected: parse_count(&caps[3]),
                total_reports: parse_count(&caps[4]),
            })
        })
        .collect()
}

pub fn stage(baselines: &[Baseline], panel_text: &str) -> Vec<StagedEntry> {
    let mut staged: Vec<StagedEntry> = baselines
        .iter()
        .map(|baseline| StagedEntry {
            baseline: baseline.clone(),
            current_ig: baseline.prev_ig,
            current_forum: baseline.prev_forum.max(baseline.fetched_forum_total),
            quizzes_accepted: 0,
            quizzes_rejected: 0,
        })
        .collect();

    for line in parse_panel(panel_text) {
        let key = compact_name(&line.name);
        if let Some(entry) = staged.iter_mut().find(|e| compact_name(&e.baseline.name) == key) {
            entry.current_ig = line.total_reports;
            entry.quizzes_accepted = line.quizzes_accepted;
            entry.quizzes_rejected = line.quizzes_rejected;
        }
    }

    staged
}

/// Stat rows for `month`. New counters never go negative.
pub fn build_rows(staged: &[StagedEntry], month: MonthKey, overrides: &BatchOverrides) -> Vec<StatRow> {
    staged
        .iter()
        .map(|entry| {
            let base = &entry.baseline;
            let key = compact_name(&base.name);
            let current_discord = overrides
                .discord_totals
                .get(&key)
                .copied()
                .filter(|total| *total > 0)
                .unwrap_or(base.prev_discord);
            let loa_days = overrides
                .leave_ranges
                .get(&key)
                .map(|(start, end)| leave_days_between(start, end))
                .unwrap_or(0);

            StatRow {
                staff_name: base.name.clone(),
                date: month.label(),
                senior: flag_cell(base.is_senior).to_string(),
                quizzes_accepted: entry.quizzes_accepted.to_string(),
                quizzes_rejected: entry.quizzes_rejected.to_string(),
                new_ig: entry.current_ig.saturating_sub(base.prev_ig).to_string(),
                new_forum: entry.current_forum.saturating_sub(base.prev_forum).to_string(),
                new_discord: current_discord.saturating_sub(base.prev_discord).to_string(),
                total_ig: entry.current_ig.to_string(),
                total_forum: entry.current_forum.to_string(),
                total_discord: current_discord.to_string(),
                strike_given: "0".to_string(),
                loa_days: loa_days.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(name: &str, support: &str, senior: &str) -> RosterRow {
        RosterRow {
            name: name.to_string(),
            support: support.to_string(),
            senior_support: senior.to_string(),
            ..RosterRow::default()
        }
    }

    fn totals(name: &str, ig: &str, forum: &str, discord: &str) -> StatRow {
        StatRow {
            staff_name: name.to_string(),
            total_ig: ig.to_string(),
            total_forum: forum.to_string(),
            total_discord: discord.to_string(),
            ..StatRow::default()
        }
    }

    fn sample_baselines() -> Vec<Baseline> {
        let roster = vec![
            roster("Ash Reyes", "TRUE", "FALSE"),
            roster("Kai Nakamura", "TRUE", "TRUE"),
            roster("Gone Person", "FALSE", "FALSE"),
        ];
        let stats = vec![
            totals("Ash Reyes", "900", "10", "50"),
            totals("Ash Reyes", "1,000", "12", "60"),
            totals("Kai Nakamura", "400", "30", "5"),
        ];
        let forum = vec!["KaiNakamura".to_string(); 33];
        build_baselines(&roster, &stats, &forum)
    }

    #[test]
    fn baselines_use_latest_totals_of_active_staff() {
        let baselines = sample_baselines();
        assert_eq!(baselines.len(), 2);
        assert_eq!(baselines[0].name, "Ash Reyes");
        assert_eq!(baselines[0].prev_ig, 1000);
        assert_eq!(baselines[0].prev_discord, 60);
        assert!(baselines[0].has_baseline);
        assert_eq!(baselines[1].fetched_forum_total, 33);
    }

    #[test]
    fn panel_lines_need_four_tab_separated_fields() {
        let text = "Ash Reyes\t3\t1\t1,042\tignored\nheader line\nKai_Nakamura\t0\t0\t410";
        let lines = parse_panel(text);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].total_reports, 1042);
        assert_eq!(lines[0].quizzes_accepted, 3);
        assert_eq!(lines[1].name, "Kai_Nakamura");
    }

    #[test]
    fn staged_rows_carry_deltas() {
        let staged = stage(&sample_baselines(), "AshReyes\t3\t1\t1,042\n");
        let mut overrides = BatchOverrides::default();
        overrides.discord_totals.insert("ashreyes".to_string(), 75);
        overrides
            .leave_ranges
            .insert("kainakamura".to_string(), ("2024-03-01".to_string(), "2024-03-05".to_string()));

        let rows = build_rows(&staged, MonthKey::new(2024, 3).unwrap(), &overrides);
        let ash = &rows[0];
        assert_eq!(ash.date, "01/Mar/2024");
        assert_eq!(ash.new_ig, "42");
        assert_eq!(ash.total_ig, "1042");
        assert_eq!(ash.new_discord, "15");
        assert_eq!(ash.quizzes_accepted, "3");
        assert_eq!(ash.loa_days, "0");

        let kai = &rows[1];
        assert_eq!(kai.senior, "TRUE");
        assert_eq!(kai.new_ig, "0");
        assert_eq!(kai.total_forum, "33");
        assert_eq!(kai.new_forum, "3");
        assert_eq!(kai.total_discord, "5");
        assert_eq!(kai.loa_days, "5");
        assert_eq!(kai.strike_given, "0");
    }

    #[test]
    fn lower_panel_total_never_goes_negative() {
        let staged = stage(&sample_baselines(), "Ash Reyes\t0\t0\t10\n");
        let rows = build_rows(&staged, MonthKey::new(2024, 3).unwrap(), &BatchOverrides::default());
        assert_eq!(rows[0].new_ig, "0");
    }
}
