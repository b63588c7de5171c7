use crate::models::Rank;
use crate::normalize::flag_cell;

/// Roster changes an operator can make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffAction {
    Add(Rank),
    Remove { reason: Option<String> },
    Promote,
    Demote,
    Reinstate(Rank),
    UpdateRank(Rank),
    EditProfile {
        new_name: Option<String>,
        discord_id: Option<String>,
        forum_link: Option<String>,
    },
}

/// Values written to the roster's `Support` / `SeniorSupport` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterFlags {
    pub support: bool,
    pub senior: bool,
}

impl RosterFlags {
    pub fn cells(self) -> (&'static str, &'static str) {
        (flag_cell(self.support), flag_cell(self.senior))
    }
}

impl StaffAction {
    /// Flags after the action. Profile edits keep the row's current flags.
    pub fn flags(&self) -> Option<RosterFlags> {
        match self {
            StaffAction::Add(rank) | StaffAction::Reinstate(rank) | StaffAction::UpdateRank(rank) => {
                Some(RosterFlags {
                    support: true,
                    senior: rank.is_senior(),
                })
            }
            StaffAction::Promote => Some(RosterFlags {
                support: true,
                senior: true,
            }),
            StaffAction::Demote => Some(RosterFlags {
                support: true,
                senior: false,
            }),
            StaffAction::Remove { .. } => Some(RosterFlags {
                support: false,
                senior: false,
            }),
            StaffAction::EditProfile { .. } => None,
        }
    }

    /// Changelog text; profile edits are not logged.
    pub fn changelog_label(&self) -> Option<String> {
        let label = match self {
            StaffAction::Add(_) => "Added to Roster".to_string(),
            StaffAction::Remove { reason } => format!(
                "REMOVED: {}",
                reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_uppercase)
                    .unwrap_or_else(|| "REMOVAL".to_string())
            ),
            StaffAction::Promote => "Promoted to Senior Support".to_string(),
            StaffAction::Demote => "Demoted to Support".to_string(),
            StaffAction::Reinstate(rank) => format!("Reinstated as {}", rank.label()),
            StaffAction::UpdateRank(_) => "UpdateRank".to_string(),
            StaffAction::EditProfile { .. } => return None,
        };
        Some(label)
    }

    /// Only additions create a row when the name is not on the roster yet.
    pub fn creates_row(&self) -> bool {
        matches!(self, StaffAction::Add(_))
    }
}
