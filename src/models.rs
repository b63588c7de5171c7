use serde::{Deserialize, Serialize};

use crate::normalize::MonthKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Rank {
    Support,
    SeniorSupport,
}

impl Rank {
    pub fn from_flag(is_senior: bool) -> Self {
        if is_senior {
            Rank::SeniorSupport
        } else {
            Rank::Support
        }
    }

    pub fn is_senior(self) -> bool {
        self == Rank::SeniorSupport
    }

    pub fn label(self) -> &'static str {
        match self {
            Rank::Support => "Support",
            Rank::SeniorSupport => "Senior Support",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySnapshot {
    pub month: MonthKey,
    pub new_ig: u32,
    pub new_forum: u32,
    pub new_discord: u32,
    pub total_ig: u32,
    pub total_forum: u32,
    pub total_discord: u32,
    pub strike: u32,
    /// Legacy `LOA Days` column, used only when no leave records exist.
    pub loa_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveInterval {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    pub timestamp: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisciplineNote {
    SpokenTo {
        timestamp: String,
        note: String,
    },
    MetricException {
        timestamp: String,
        month: Option<MonthKey>,
        reason: String,
    },
}

impl DisciplineNote {
    pub fn timestamp(&self) -> &str {
        match self {
            DisciplineNote::SpokenTo { timestamp, .. } => timestamp,
            DisciplineNote::MetricException { timestamp, .. } => timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffRecord {
    pub name: String,
    pub rank: Rank,
    pub is_active: bool,
    pub discord_id: String,
    pub forum_link: String,
    pub discord_name: String,
    /// Most recent month first.
    pub history: Vec<MonthlySnapshot>,
    pub leaves: Vec<LeaveInterval>,
    pub lifecycle: Vec<LifecycleEvent>,
    pub notes: Vec<DisciplineNote>,
    pub first_seen: Option<MonthKey>,
    pub latest_seen: Option<MonthKey>,
    pub lifetime_ig: u32,
    pub lifetime_forum: u32,
    pub lifetime_discord: u32,
    pub total_strikes: usize,
    pub recent_strikes: usize,
    pub active_leave: Option<String>,
    pub pending_strike: bool,
}

impl StaffRecord {
    pub fn new(name: &str, rank: Rank, is_active: bool) -> Self {
        Self {
            name: name.to_string(),
            rank,
            is_active,
            discord_id: String::new(),
            forum_link: String::new(),
            discord_name: String::new(),
            history: Vec::new(),
            leaves: Vec::new(),
            lifecycle: Vec::new(),
            notes: Vec::new(),
            first_seen: None,
            latest_seen: None,
            lifetime_ig: 0,
            lifetime_forum: 0,
            lifetime_discord: 0,
            total_strikes: 0,
            recent_strikes: 0,
            active_leave: None,
            pending_strike: false,
        }
    }

    pub fn snapshot_for(&self, month: MonthKey) -> Option<&MonthlySnapshot> {
        self.history.iter().find(|snapshot| snapshot.month == month)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagementMember {
    pub name: String,
    pub discord_id: String,
    pub forum_link: String,
    pub discord_name: String,
    pub pending_tasks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("completed") {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    General,
    IssueStrike { staff_name: String },
    SpokenTo { staff_names: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    pub timestamp: String,
    pub title: String,
    pub description: String,
    pub target: String,
    pub status: TaskStatus,
    pub claimed_by: String,
    pub kind: TaskKind,
}

/// One row of each store table, exactly as the cells hold it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterRow {
    pub name: String,
    pub support: String,
    pub senior_support: String,
    pub discord_id: String,
    pub forum_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagementRow {
    pub name: String,
    pub discord_id: String,
    pub forum_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRow {
    #[serde(rename = "Staff Name")]
    pub staff_name: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Senior", default)]
    pub senior: String,
    #[serde(rename = "Quizzes Accepted", default)]
    pub quizzes_accepted: String,
    #[serde(rename = "Quizzes Rejected", default)]
    pub quizzes_rejected: String,
    #[serde(rename = "New IG Reports", default)]
    pub new_ig: String,
    #[serde(rename = "New Forum Reports", default)]
    pub new_forum: String,
    #[serde(rename = "New Discord", default)]
    pub new_discord: String,
    #[serde(rename = "Total Reports Completed", default)]
    pub total_ig: String,
    #[serde(rename = "Total Forum Reports", default)]
    pub total_forum: String,
    #[serde(rename = "Total Discord", default)]
    pub total_discord: String,
    #[serde(rename = "Strike Given", default)]
    pub strike_given: String,
    #[serde(rename = "LOA Days", default)]
    pub loa_days: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveRow {
    pub name: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangelogRow {
    pub timestamp: String,
    pub staff: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisciplineRow {
    pub timestamp: String,
    pub staff_name: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRow {
    pub task_id: String,
    pub timestamp: String,
    pub title: String,
    pub description: String,
    pub target: String,
    pub status: String,
    pub claimed_by: String,
    pub kind: String,
    pub subjects: String,
}

/// Everything one roster view is derived from.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub roster: Vec<RosterRow>,
    pub management: Vec<ManagementRow>,
    pub stats: Vec<StatRow>,
    pub leaves: Vec<LeaveRow>,
    pub changelog: Vec<ChangelogRow>,
    pub discipline: Vec<DisciplineRow>,
    pub tasks: Vec<TaskRow>,
}
