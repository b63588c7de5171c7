use serde::Serialize;

use crate::models::{StatRow, Task, TaskKind, TaskRow, TaskStatus};
use crate::normalize::{name_key, MonthKey};

pub const STRIKE_TITLE_PREFIX: &str = "Issue Strike - ";
pub const SPOKEN_TO_TITLE_PREFIX: &str = "Spoken To - ";
pub const MANAGEMENT_TARGET: &str = "SSM";

/// A task about to be appended to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target: String,
    pub kind: TaskKind,
}

impl NewTask {
    pub fn general(id: String, title: &str, description: &str, target: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: description.to_string(),
            target: target.to_string(),
            kind: TaskKind::General,
        }
    }

    pub fn issue_strike(id: String, staff_name: &str, month: MonthKey) -> Self {
        Self {
            id,
            title: format!("{STRIKE_TITLE_PREFIX}{staff_name}"),
            description: format!("Missed Metric Quota for {}", month.label()),
            target: MANAGEMENT_TARGET.to_string(),
            kind: TaskKind::IssueStrike {
                staff_name: staff_name.to_string(),
            },
        }
    }

    pub fn spoken_to(id: String, staff_names: &[String], description: &str, target: &str) -> Self {
        Self {
            id,
            title: format!("{SPOKEN_TO_TITLE_PREFIX}{}", staff_names.join(", ")),
            description: description.to_string(),
            target: target.to_string(),
            kind: TaskKind::SpokenTo {
                staff_names: staff_names.to_vec(),
            },
        }
    }
}

/// Store encoding of a kind: a tag cell plus a `;`-separated subject cell.
pub fn encode_kind(kind: &TaskKind) -> (&'static str, String) {
    match kind {
        TaskKind::General => ("general", String::new()),
        TaskKind::IssueStrike { staff_name } => ("issue_strike", staff_name.clone()),
        TaskKind::SpokenTo { staff_names } => ("spoken_to", staff_names.join(";")),
    }
}

/// Reads the typed kind, falling back to the title for rows written before the
/// kind column existed.
pub fn decode_kind(kind: &str, subjects: &str, title: &str) -> TaskKind {
    match kind.trim() {
        "issue_strike" if !subjects.trim().is_empty() => TaskKind::IssueStrike {
            staff_name: subjects.trim().to_string(),
        },
        "spoken_to" => TaskKind::SpokenTo {
            staff_names: subjects
                .split(';')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        },
        "general" => TaskKind::General,
        _ => kind_from_title(title),
    }
}

fn kind_from_title(title: &str) -> TaskKind {
    match title.strip_prefix(STRIKE_TITLE_PREFIX) {
        Some(name) if !name.trim().is_empty() => TaskKind::IssueStrike {
            staff_name: name.trim().to_string(),
        },
        _ => TaskKind::General,
    }
}

pub fn task_from_row(row: &TaskRow) -> Task {
    Task {
        id: row.task_id.clone(),
        timestamp: row.timestamp.clone(),
        title: row.title.clone(),
        description: row.description.clone(),
        target: if row.target.trim().is_empty() {
            MANAGEMENT_TARGET.to_string()
        } else {
            row.target.clone()
        },
        status: TaskStatus::parse(&row.status),
        claimed_by: row.claimed_by.trim().to_string(),
        kind: decode_kind(&row.kind, &row.subjects, &row.title),
    }
}

/// Month a strike task refers to: the text after `for ` in the description,
/// else the task's own timestamp.
pub fn strike_target_month(task: &Task) -> Option<MonthKey> {
    let from_description = task
        .description
        .find("for ")
        .map(|index| task.description[index + 4..].trim())
        .filter(|text| !text.is_empty());

    match from_description {
        Some(text) => MonthKey::parse(text),
        None => MonthKey::parse(&task.timestamp),
    }
}

/// Index of the stat row a completed strike task marks, if any.
///
/// Only an exact month match on the named staff member counts; there is no
/// nearest-month fallback.
pub fn strike_row<'a, I>(rows: I, task: &Task) -> Option<usize>
where
    I: IntoIterator<Item = &'a StatRow>,
{
    let TaskKind::IssueStrike { staff_name } = &task.kind else {
        return None;
    };
    let target = strike_target_month(task)?;
    let staff_key = name_key(staff_name);

    rows.into_iter().position(|row| {
        name_key(&row.staff_name) == staff_key && MonthKey::parse(&row.date) == Some(target)
    })
}

/// Applies the strike-completion side effect to in-memory rows.
pub fn mark_strike(rows: &mut [StatRow], task: &Task) -> Option<usize> {
    let index = strike_row(rows.iter(), task)?;
    rows[index].strike_given = "1".to_string();
    Some(index)
}

pub fn completion_details(task: &Task) -> String {
    let claimer = if task.claimed_by.is_empty() {
        "Unclaimed"
    } else {
        task.claimed_by.as_str()
    };
    format!("Claimed by: {claimer}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(name: &str, date: &str) -> StatRow {
        StatRow {
            staff_name: name.to_string(),
            date: date.to_string(),
            strike_given: "0".to_string(),
            ..StatRow::default()
        }
    }

    fn strike_task(name: &str, description: &str, timestamp: &str) -> Task {
        Task {
            id: "t-1".to_string(),
            timestamp: timestamp.to_string(),
            title: format!("{STRIKE_TITLE_PREFIX}{name}"),
            description: description.to_string(),
            target: MANAGEMENT_TARGET.to_string(),
            status: TaskStatus::Pending,
            claimed_by: String::new(),
            kind: TaskKind::IssueStrike {
                staff_name: name.to_string(),
            },
        }
    }

    #[test]
    fn completing_strike_marks_exact_month_only() {
        let mut rows = vec![
            stat("Ash Reyes", "01/Feb/2024"),
            stat("Ash Reyes", "2024-03"),
            stat("June Okafor", "01/Mar/2024"),
            stat("Ash Reyes", "01/Apr/2024"),
        ];
        let task = strike_task("ash reyes", "Missed Metric Quota for Mar 2024", "10/Apr/2024");

        assert_eq!(mark_strike(&mut rows, &task), Some(1));
        let strikes: Vec<&str> = rows.iter().map(|r| r.strike_given.as_str()).collect();
        assert_eq!(strikes, vec!["0", "1", "0", "0"]);
    }

    #[test]
    fn missing_month_is_a_silent_no_op() {
        let mut rows = vec![stat("Ash Reyes", "01/Feb/2024")];
        let task = strike_task("Ash Reyes", "Missed Metric Quota for 01/Mar/2024", "");
        assert_eq!(mark_strike(&mut rows, &task), None);
        assert_eq!(rows[0].strike_given, "0");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn falls_back_to_task_timestamp() {
        let mut rows = vec![stat("Ash Reyes", "01/Feb/2024"), stat("Ash Reyes", "01/Mar/2024")];
        let task = strike_task("Ash Reyes", "Missed quota", "14/Mar/2024");
        assert_eq!(mark_strike(&mut rows, &task), Some(1));
    }

    #[test]
    fn general_tasks_never_mark() {
        let rows = vec![stat("Ash Reyes", "01/Mar/2024")];
        let mut task = strike_task("Ash Reyes", "for Mar 2024", "");
        task.kind = TaskKind::General;
        assert_eq!(strike_row(rows.iter(), &task), None);
    }

    #[test]
    fn strike_task_description_round_trips_month() {
        let month = MonthKey::new(2024, 3).unwrap();
        let new_task = NewTask::issue_strike("t-9".to_string(), "Ash Reyes", month);
        assert_eq!(new_task.title, "Issue Strike - Ash Reyes");
        assert_eq!(new_task.target, "SSM");

        let task = Task {
            id: new_task.id,
            timestamp: "02/Apr/2024".to_string(),
            title: new_task.title,
            description: new_task.description,
            target: new_task.target,
            status: TaskStatus::Pending,
            claimed_by: String::new(),
            kind: new_task.kind,
        };
        assert_eq!(strike_target_month(&task), Some(month));
    }

    #[test]
    fn kinds_decode_from_columns_or_legacy_titles() {
        assert_eq!(
            decode_kind("", "", "Issue Strike - Kai Nakamura"),
            TaskKind::IssueStrike {
                staff_name: "Kai Nakamura".to_string()
            }
        );
        assert_eq!(decode_kind("", "", "Restock FAQ"), TaskKind::General);
        assert_eq!(
            decode_kind("spoken_to", "Ash; June", "whatever"),
            TaskKind::SpokenTo {
                staff_names: vec!["Ash".to_string(), "June".to_string()]
            }
        );

        let kind = TaskKind::SpokenTo {
            staff_names: vec!["Ash".to_string(), "June".to_string()],
        };
        let (tag, subjects) = encode_kind(&kind);
        assert_eq!(decode_kind(tag, &subjects, ""), kind);
    }

    #[test]
    fn rows_default_target_and_status() {
        let task = task_from_row(&TaskRow {
            task_id: "1".to_string(),
            title: "Check logs".to_string(),
            status: "".to_string(),
            ..TaskRow::default()
        });
        assert_eq!(task.target, "SSM");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(completion_details(&task), "Claimed by: Unclaimed");
    }
}
