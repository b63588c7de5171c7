use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{DisciplineNote, MonthlySnapshot, Rank, StaffRecord};
use crate::normalize::{name_key, MonthKey};
use crate::quota::{evaluate_snapshot, QuotaEvaluation};

pub const EXCEPTION_TAG: &str = "METRIC EXCEPTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// IG below the grace target: strike task or a logged exception.
    High,
    /// Only the senior forum target was missed: strike task or dismiss.
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Unevaluated,
    Compliant,
    AtRisk(Severity),
    Dismissed,
    Excepted,
    Struck,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtRiskCase {
    pub name: String,
    pub rank: Rank,
    pub month: MonthKey,
    pub snapshot: MonthlySnapshot,
    pub evaluation: QuotaEvaluation,
    pub severity: Severity,
}

/// Names handled during the current session only. Nothing here is persisted, so
/// a dismissed case comes back on the next load unless it was excepted or struck.
#[derive(Debug, Clone, Default)]
pub struct Dismissals {
    names: HashSet<String>,
}

impl Dismissals {
    pub fn dismiss(&mut self, name: &str) {
        self.names.insert(name_key(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name_key(name))
    }
}

pub fn exception_note(month: MonthKey, reason: &str) -> String {
    format!("{EXCEPTION_TAG} ({}): {}", month.label(), reason.trim())
}

fn exception_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^METRIC EXCEPTION\s*(?:\(([^)]*)\))?\s*:?\s*(.*)$")
            .expect("exception pattern is valid")
    })
}

/// Classifies a raw log note. Untagged legacy exceptions carry no month.
pub fn parse_note(timestamp: &str, note: &str) -> DisciplineNote {
    let trimmed = note.trim();
    match exception_pattern().captures(trimmed) {
        Some(caps) => DisciplineNote::MetricException {
            timestamp: timestamp.to_string(),
            month: caps.get(1).and_then(|m| MonthKey::parse(m.as_str())),
            reason: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
        },
        None => DisciplineNote::SpokenTo {
            timestamp: timestamp.to_string(),
            note: note.to_string(),
        },
    }
}

pub fn has_exception(staff: &StaffRecord, month: MonthKey) -> bool {
    staff.notes.iter().any(|note| {
        matches!(note, DisciplineNote::MetricException { month: Some(m), .. } if *m == month)
    })
}

/// Where a staff member's month sits in the strike/exception lifecycle.
pub fn case_state(staff: &StaffRecord, month: MonthKey, dismissals: &Dismissals) -> CaseState {
    if !staff.is_active {
        return CaseState::Unevaluated;
    }
    let Some(snapshot) = staff.snapshot_for(month) else {
        return CaseState::Unevaluated;
    };
    if snapshot.strike > 0 {
        return CaseState::Struck;
    }
    if has_exception(staff, month) {
        return CaseState::Excepted;
    }

    let evaluation = evaluate_snapshot(snapshot, staff.rank, &staff.leaves);
    let Some(severity) = severity(snapshot, &evaluation) else {
        return CaseState::Compliant;
    };

    if dismissals.contains(&staff.name) {
        CaseState::Dismissed
    } else {
        CaseState::AtRisk(severity)
    }
}

fn severity(snapshot: &MonthlySnapshot, evaluation: &QuotaEvaluation) -> Option<Severity> {
    if snapshot.new_ig < evaluation.ig_grace_target {
        Some(Severity::High)
    } else if evaluation.missed_forum {
        Some(Severity::Low)
    } else {
        None
    }
}

/// Every active staff member still needing a decision for `month`.
pub fn flag_cases(staff: &[StaffRecord], month: MonthKey, dismissals: &Dismissals) -> Vec<AtRiskCase> {
    staff
        .iter()
        .filter_map(|member| match case_state(member, month, dismissals) {
            CaseState::AtRisk(severity) => {
                let snapshot = member.snapshot_for(month)?.clone();
                let evaluation = evaluate_snapshot(&snapshot, member.rank, &member.leaves);
                Some(AtRiskCase {
                    name: member.name.clone(),
                    rank: member.rank,
                    month,
                    snapshot,
                    evaluation,
                    severity,
                })
            }
            _ => None,
        })
        .collect()
}

/// The month the evaluator looks at by default.
pub fn most_recent_month(staff: &[StaffRecord]) -> Option<MonthKey> {
    staff
        .iter()
        .flat_map(|member| member.history.iter().map(|s| s.month))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::tests::snapshot;

    fn march() -> MonthKey {
        MonthKey::new(2024, 3).unwrap()
    }

    fn member(name: &str, rank: Rank, history: Vec<MonthlySnapshot>) -> StaffRecord {
        let mut record = StaffRecord::new(name, rank, true);
        record.history = history;
        record
    }

    #[test]
    fn ig_shortfall_is_high_severity() {
        let staff = vec![member("Ash", Rank::Support, vec![snapshot(2024, 3, 10, 0)])];
        let cases = flag_cases(&staff, march(), &Dismissals::default());
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].severity, Severity::High);
    }

    #[test]
    fn forum_only_shortfall_is_low_severity() {
        let staff = vec![member("Kai", Rank::SeniorSupport, vec![snapshot(2024, 3, 30, 3)])];
        let cases = flag_cases(&staff, march(), &Dismissals::default());
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].severity, Severity::Low);
        assert!(cases[0].evaluation.missed_forum);
    }

    #[test]
    fn grace_month_is_not_flagged() {
        let staff = vec![member("Ash", Rank::Support, vec![snapshot(2024, 3, 26, 0)])];
        assert!(flag_cases(&staff, march(), &Dismissals::default()).is_empty());
        assert_eq!(case_state(&staff[0], march(), &Dismissals::default()), CaseState::Compliant);
    }

    #[test]
    fn inactive_or_missing_month_is_unevaluated() {
        let mut inactive = member("Ash", Rank::Support, vec![snapshot(2024, 3, 0, 0)]);
        inactive.is_active = false;
        assert_eq!(case_state(&inactive, march(), &Dismissals::default()), CaseState::Unevaluated);

        let absent = member("June", Rank::Support, vec![snapshot(2024, 2, 0, 0)]);
        assert_eq!(case_state(&absent, march(), &Dismissals::default()), CaseState::Unevaluated);
    }

    #[test]
    fn struck_month_is_resolved() {
        let mut row = snapshot(2024, 3, 0, 0);
        row.strike = 1;
        let staff = member("Ash", Rank::Support, vec![row]);
        assert_eq!(case_state(&staff, march(), &Dismissals::default()), CaseState::Struck);
    }

    #[test]
    fn exception_suppresses_only_its_month() {
        let mut staff = member(
            "Ash",
            Rank::Support,
            vec![snapshot(2024, 4, 0, 0), snapshot(2024, 3, 0, 0)],
        );
        let note = exception_note(march(), "medical leave not filed");
        staff.notes.push(parse_note("05/Apr/2024", &note));

        let roster = vec![staff];
        assert!(flag_cases(&roster, march(), &Dismissals::default()).is_empty());
        assert_eq!(
            flag_cases(&roster, MonthKey::new(2024, 4).unwrap(), &Dismissals::default()).len(),
            1
        );
    }

    #[test]
    fn dismissal_is_session_scoped() {
        let staff = vec![member("Ash Reyes", Rank::Support, vec![snapshot(2024, 3, 0, 0)])];
        let mut session = Dismissals::default();
        session.dismiss(" ash reyes");
        assert!(flag_cases(&staff, march(), &session).is_empty());
        assert_eq!(case_state(&staff[0], march(), &session), CaseState::Dismissed);

        let reloaded = Dismissals::default();
        assert_eq!(flag_cases(&staff, march(), &reloaded).len(), 1);
    }

    #[test]
    fn notes_are_classified_by_tag() {
        assert_eq!(
            parse_note("t", "METRIC EXCEPTION (01/Mar/2024): approved"),
            DisciplineNote::MetricException {
                timestamp: "t".to_string(),
                month: Some(march()),
                reason: "approved".to_string(),
            }
        );
        assert_eq!(
            parse_note("t", "METRIC EXCEPTION: legacy"),
            DisciplineNote::MetricException {
                timestamp: "t".to_string(),
                month: None,
                reason: "legacy".to_string(),
            }
        );
        assert!(matches!(
            parse_note("t", "Spoke about tone in tickets"),
            DisciplineNote::SpokenTo { .. }
        ));
    }

    #[test]
    fn evaluator_defaults_to_latest_month() {
        let staff = vec![
            member("Ash", Rank::Support, vec![snapshot(2024, 2, 0, 0)]),
            member("June", Rank::Support, vec![snapshot(2024, 4, 0, 0)]),
        ];
        assert_eq!(most_recent_month(&staff), MonthKey::new(2024, 4));
        assert_eq!(most_recent_month(&[]), None);
    }
}
