use std::cmp::Reverse;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::leaderboard::{build_leaderboard, lifetime_totals, Performance};
use crate::models::{DisciplineNote, Rank};
use crate::normalize::{parse_date, MonthKey};
use crate::reliability::{rank_rollup, RankRollup, TimeWindow};
use crate::roster::Roster;
use crate::workflow::{flag_cases, AtRiskCase, Dismissals, Severity};

pub fn describe_case(case: &AtRiskCase) -> String {
    let shortfall = match case.severity {
        Severity::High => format!(
            "IG {} of {} (grace {})",
            case.snapshot.new_ig, case.evaluation.ig_target, case.evaluation.ig_grace_target
        ),
        Severity::Low => format!(
            "forum {} of {}",
            case.snapshot.new_forum, case.evaluation.forum_target
        ),
    };
    let options = match case.severity {
        Severity::High => "strike task or exception",
        Severity::Low => "strike task or dismiss",
    };
    format!(
        "{} ({}) {}: {}; {}",
        case.name,
        case.rank.label(),
        case.month,
        shortfall,
        options
    )
}

pub fn describe_rollup(rollup: &RankRollup) -> String {
    let mut line = format!(
        "{}: {}% last 6 months, {}% lifetime, avg IG {:.1}",
        rollup.rank.label(),
        rollup.reliability_six_months,
        rollup.reliability_lifetime,
        rollup.avg_ig
    );
    if let Some(avg_forum) = rollup.avg_forum {
        let _ = write!(line, ", avg forum {:.1}", avg_forum);
    }
    line
}

fn write_board(output: &mut String, title: &str, rows: &[Performance], value: fn(&Performance) -> u64) {
    let _ = writeln!(output, "### {title}");
    if rows.is_empty() {
        let _ = writeln!(output, "No activity recorded for this window.");
    }
    for (position, row) in rows.iter().enumerate() {
        let _ = writeln!(output, "{}. {} ({})", position + 1, row.name, value(row));
    }
}

pub fn build_report(
    roster: &Roster,
    month: Option<MonthKey>,
    window: TimeWindow,
    today: NaiveDate,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Staff Performance Report");
    let _ = writeln!(output, "Generated {} ({} staff on roster)", today, roster.staff.len());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Quota Evaluator");

    match month {
        None => {
            let _ = writeln!(output, "No monthly stats recorded yet.");
        }
        Some(month) => {
            let cases = flag_cases(&roster.staff, month, &Dismissals::default());
            let _ = writeln!(output, "Month evaluated: {month}");
            if cases.is_empty() {
                let _ = writeln!(output, "Everyone met quota or has been handled.");
            }
            for case in &cases {
                let _ = writeln!(output, "- {}", describe_case(case));
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rank Reliability");
    for rank in [Rank::SeniorSupport, Rank::Support] {
        let _ = writeln!(output, "- {}", describe_rollup(&rank_rollup(&roster.staff, rank, today)));
    }

    let totals = lifetime_totals(&roster.staff);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Lifetime Totals");
    let _ = writeln!(
        output,
        "IG {} / forum {} / Discord {}",
        totals.ig, totals.forum, totals.discord
    );

    let board = build_leaderboard(&roster.staff, window, today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Leaderboard ({})", window.describe());
    write_board(&mut output, "In-game reports", &board.top_ig, |p| p.ig);
    write_board(&mut output, "Forum reports", &board.top_forum, |p| p.forum);
    write_board(&mut output, "Discord", &board.top_discord, |p| p.discord);

    let mut notes: Vec<(&str, &DisciplineNote)> = roster
        .staff
        .iter()
        .flat_map(|member| member.notes.iter().map(move |note| (member.name.as_str(), note)))
        .collect();
    notes.sort_by_key(|(_, note)| Reverse(parse_date(note.timestamp())));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Notes");
    if notes.is_empty() {
        let _ = writeln!(output, "No notes logged.");
    }
    for (name, note) in notes.iter().take(5) {
        let line = match note {
            DisciplineNote::SpokenTo { timestamp, note } => format!("{name} on {timestamp}: {note}"),
            DisciplineNote::MetricException {
                timestamp,
                month,
                reason,
            } => format!(
                "{name} on {timestamp}: exception for {}: {reason}",
                month.map(|m| m.label()).unwrap_or_else(|| "unspecified month".to_string())
            ),
        };
        let _ = writeln!(output, "- {line}");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaffRecord;
    use crate::quota::tests::snapshot;

    fn roster() -> Roster {
        let mut ash = StaffRecord::new("Ash Reyes", Rank::Support, true);
        ash.history = vec![snapshot(2024, 3, 10, 0)];
        ash.notes.push(DisciplineNote::SpokenTo {
            timestamp: "02/Mar/2024".to_string(),
            note: "Reminded about ticket etiquette".to_string(),
        });
        let mut kai = StaffRecord::new("Kai Nakamura", Rank::SeniorSupport, true);
        kai.history = vec![snapshot(2024, 3, 40, 1)];
        Roster {
            staff: vec![kai, ash],
            management: Vec::new(),
        }
    }

    #[test]
    fn report_lists_flagged_cases_and_rollups() {
        let month = MonthKey::new(2024, 3);
        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let report = build_report(&roster(), month, TimeWindow::Month(month.unwrap()), today);

        assert!(report.contains("# Staff Performance Report"));
        assert!(report.contains("Month evaluated: 01/Mar/2024"));
        assert!(report.contains("- Ash Reyes (Support) 01/Mar/2024: IG 10 of 30 (grace 25); strike task or exception"));
        assert!(report.contains("- Kai Nakamura (Senior Support) 01/Mar/2024: forum 1 of 5; strike task or dismiss"));
        assert!(report.contains("Senior Support: 100% last 6 months, 100% lifetime, avg IG 40.0, avg forum 1.0"));
        assert!(report.contains("1. Kai Nakamura (40)"));
        assert!(report.contains("Ash Reyes on 02/Mar/2024: Reminded about ticket etiquette"));
    }

    #[test]
    fn empty_roster_still_renders() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let report = build_report(&Roster::default(), None, TimeWindow::Lifetime, today);
        assert!(report.contains("No monthly stats recorded yet."));
        assert!(report.contains("Support: 0% last 6 months, 0% lifetime, avg IG 0.0"));
        assert!(report.contains("No notes logged."));
    }
}
