use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::leave::covers;
use crate::models::{
    LeaveInterval, LifecycleEvent, ManagementMember, MonthlySnapshot, Rank, StaffRecord, StatRow,
    StoreSnapshot, TaskKind, TaskStatus,
};
use crate::normalize::{
    months_before, name_key, parse_count, parse_date, parse_flag, parse_strike, MonthKey,
};
use crate::tasks::task_from_row;
use crate::workflow::parse_note;

pub const NO_DISCORD_ID: &str = "N/A";
pub const LOOKUP_NOT_FOUND: &str = "Not Found";
pub const RECENT_STRIKE_MONTHS: u32 = 3;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Roster {
    /// Senior Support first, then Support, each alphabetical.
    pub staff: Vec<StaffRecord>,
    pub management: Vec<ManagementMember>,
}

impl Roster {
    pub fn find(&self, name: &str) -> Option<&StaffRecord> {
        let key = name_key(name);
        self.staff.iter().find(|member| name_key(&member.name) == key)
    }
}

/// Every distinct Discord ID on either roster.
pub fn discord_ids(store: &StoreSnapshot) -> Vec<String> {
    store
        .roster
        .iter()
        .map(|row| row.discord_id.trim())
        .chain(store.management.iter().map(|row| row.discord_id.trim()))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn display_name(discord_id: &str, names: &HashMap<String, String>) -> String {
    let id = discord_id.trim();
    if id.is_empty() {
        return NO_DISCORD_ID.to_string();
    }
    names
        .get(id)
        .cloned()
        .unwrap_or_else(|| LOOKUP_NOT_FOUND.to_string())
}

pub fn snapshot_from_row(row: &StatRow) -> Option<MonthlySnapshot> {
    let month = MonthKey::parse(&row.date)?;
    Some(MonthlySnapshot {
        month,
        new_ig: parse_count(&row.new_ig),
        new_forum: parse_count(&row.new_forum),
        new_discord: parse_count(&row.new_discord),
        total_ig: parse_count(&row.total_ig),
        total_forum: parse_count(&row.total_forum),
        total_discord: parse_count(&row.total_discord),
        strike: parse_strike(&row.strike_given),
        loa_days: parse_count(&row.loa_days),
    })
}

/// A store that cannot be read leaves every view empty instead of failing it.
pub fn store_or_empty(result: Result<StoreSnapshot, StoreError>) -> StoreSnapshot {
    result.unwrap_or_else(|err| {
        error!(error = %err, "failed to load staff records, showing an empty roster");
        StoreSnapshot::default()
    })
}

/// Builds the roster view from raw store rows.
///
/// Rows naming someone who is not on the roster are ignored. A second stat row
/// for a month already seen replaces the first.
pub fn assemble(store: &StoreSnapshot, names: &HashMap<String, String>, today: NaiveDate) -> Roster {
    let tasks: Vec<_> = store.tasks.iter().map(task_from_row).collect();
    let mut pending_strikes = BTreeSet::new();
    let mut claimed: HashMap<String, usize> = HashMap::new();

    for task in tasks.iter().filter(|t| t.status == TaskStatus::Pending) {
        if let TaskKind::IssueStrike { staff_name } = &task.kind {
            pending_strikes.insert(name_key(staff_name));
        }
        if !task.claimed_by.is_empty() {
            *claimed.entry(name_key(&task.claimed_by)).or_insert(0) += 1;
        }
    }

    let mut management: HashMap<String, ManagementMember> = HashMap::new();
    for row in &store.management {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }
        management.insert(
            name_key(name),
            ManagementMember {
                name: name.to_string(),
                discord_id: row.discord_id.clone(),
                forum_link: row.forum_link.clone(),
                discord_name: display_name(&row.discord_id, names),
                pending_tasks: claimed.get(&name_key(name)).copied().unwrap_or(0),
            },
        );
    }

    let mut staff: HashMap<String, StaffRecord> = HashMap::new();
    for row in &store.roster {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }
        let key = name_key(name);
        let mut record = StaffRecord::new(
            name,
            Rank::from_flag(parse_flag(&row.senior_support)),
            parse_flag(&row.support),
        );
        record.discord_id = row.discord_id.clone();
        record.forum_link = row.forum_link.clone();
        record.discord_name = display_name(&row.discord_id, names);
        record.pending_strike = pending_strikes.contains(&key);
        staff.insert(key, record);
    }

    for row in &store.leaves {
        let Some(record) = staff.get_mut(&name_key(&row.name)) else {
            continue;
        };
        let leave = LeaveInterval {
            start: row.start_date.clone(),
            end: row.end_date.clone(),
        };
        if covers(&leave, today) {
            record.active_leave = Some(leave.end.clone());
        }
        record.leaves.push(leave);
    }

    for row in &store.stats {
        let Some(record) = staff.get_mut(&name_key(&row.staff_name)) else {
            continue;
        };
        let Some(snapshot) = snapshot_from_row(row) else {
            warn!(staff = %row.staff_name, date = %row.date, "skipping stat row with unreadable month");
            continue;
        };
        match record.history.iter_mut().find(|s| s.month == snapshot.month) {
            Some(existing) => {
                debug!(staff = %record.name, month = %snapshot.month, "stat row overwrites earlier row");
                *existing = snapshot;
            }
            None => record.history.push(snapshot),
        }
    }

    for row in &store.changelog {
        if let Some(record) = staff.get_mut(&name_key(&row.staff)) {
            record.lifecycle.push(LifecycleEvent {
                timestamp: row.timestamp.clone(),
                action: row.action.clone(),
            });
        }
    }

    for row in &store.discipline {
        if let Some(record) = staff.get_mut(&name_key(&row.staff_name)) {
            record.notes.push(parse_note(&row.timestamp, &row.note));
        }
    }

    let recent_cutoff = months_before(today, RECENT_STRIKE_MONTHS);
    for record in staff.values_mut() {
        summarize(record, recent_cutoff);
    }

    let mut staff: Vec<StaffRecord> = staff.into_values().collect();
    staff.sort_by(|a, b| {
        b.rank
            .is_senior()
            .cmp(&a.rank.is_senior())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let mut management: Vec<ManagementMember> = management.into_values().collect();
    management.sort_by_key(|member| member.name.to_lowercase());

    Roster { staff, management }
}

fn summarize(record: &mut StaffRecord, recent_cutoff: NaiveDate) {
    record.history.sort_by_key(|s| Reverse(s.month));
    record
        .lifecycle
        .sort_by_key(|event| Reverse(parse_date(&event.timestamp)));
    record.notes.sort_by_key(|note| Reverse(parse_date(note.timestamp())));

    if let Some(latest) = record.history.first() {
        record.latest_seen = Some(latest.month);
        record.lifetime_ig = latest.total_ig;
        record.lifetime_forum = latest.total_forum;
        record.lifetime_discord = latest.total_discord;
    }
    record.first_seen = record.history.last().map(|s| s.month);
    record.total_strikes = record.history.iter().filter(|s| s.strike > 0).count();
    record.recent_strikes = record
        .history
        .iter()
        .filter(|s| s.strike > 0 && s.month.first_day() >= recent_cutoff)
        .count();
}
