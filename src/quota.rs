use serde::Serialize;

use crate::leave::leave_days_in_month;
use crate::models::{LeaveInterval, MonthlySnapshot, Rank};

pub const BASE_IG_TARGET: u32 = 30;
pub const GRACE_MARGIN: u32 = 5;
pub const SENIOR_FORUM_TARGET: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuotaStatus {
    Met,
    Grace,
    Missed,
}

impl QuotaStatus {
    /// Grace months count as met for reliability.
    pub fn counts_as_met(self) -> bool {
        self != QuotaStatus::Missed
    }

    pub fn label(self) -> &'static str {
        match self {
            QuotaStatus::Met => "MET",
            QuotaStatus::Grace => "GRACE",
            QuotaStatus::Missed => "MISSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaEvaluation {
    pub status: QuotaStatus,
    pub ig_target: u32,
    pub ig_grace_target: u32,
    pub forum_target: u32,
    /// Tracked beside `status`; a forum shortfall never demotes it.
    pub missed_forum: bool,
}

pub fn evaluate_quota(snapshot: &MonthlySnapshot, rank: Rank, leave_days: u32) -> QuotaEvaluation {
    let ig_target = BASE_IG_TARGET.saturating_sub(leave_days);
    let ig_grace_target = ig_target.saturating_sub(GRACE_MARGIN);
    let forum_target = if rank.is_senior() { SENIOR_FORUM_TARGET } else { 0 };

    let status = if snapshot.new_ig >= ig_target {
        QuotaStatus::Met
    } else if snapshot.new_ig >= ig_grace_target {
        QuotaStatus::Grace
    } else {
        QuotaStatus::Missed
    };

    QuotaEvaluation {
        status,
        ig_target,
        ig_grace_target,
        forum_target,
        missed_forum: rank.is_senior() && snapshot.new_forum < forum_target,
    }
}

/// Leave days used to prorate a snapshot: computed from leave records when the
/// staff member has any, otherwise the legacy column on the row.
pub fn effective_leave_days(snapshot: &MonthlySnapshot, leaves: &[LeaveInterval]) -> u32 {
    if leaves.is_empty() {
        snapshot.loa_days
    } else {
        leave_days_in_month(snapshot.month, leaves)
    }
}

pub fn evaluate_snapshot(
    snapshot: &MonthlySnapshot,
    rank: Rank,
    leaves: &[LeaveInterval],
) -> QuotaEvaluation {
    evaluate_quota(snapshot, rank, effective_leave_days(snapshot, leaves))
}
