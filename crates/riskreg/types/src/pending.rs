//! Submitted batches of edits awaiting review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::edit::ChangeSet;
use crate::ids::{ControlId, PendingChangeId, UserId};
use crate::role::Actor;

/// Entity kinds known to the register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Row,
    Control,
    ControlLink,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Control => "control",
            Self::ControlLink => "control_link",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only updates are gated today.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Update,
}

/// Review status. `Approved` and `Rejected` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Approved,
    Rejected,
}

impl PendingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for PendingStatus {
    type Err = crate::error::ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(crate::error::ModelError::InvalidValue {
                field: "status".into(),
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable record of one draft submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub id: PendingChangeId,
    pub entity_type: EntityKind,
    pub entity_id: ControlId,
    /// Label captured at submission; not kept in sync with later renames.
    pub entity_name: String,
    pub change_type: ChangeType,
    pub proposed_values: ChangeSet,
    /// Live values of every proposed field at submission time.
    pub current_values: ChangeSet,
    pub submitted_by: Actor,
    pub submitted_at: DateTime<Utc>,
    pub status: PendingStatus,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Reviewer's reason, recorded on rejection.
    #[serde(default)]
    pub resolution_note: Option<String>,
}

impl PendingChange {
    /// A new `pending` control update.
    pub fn control_update(
        entity_id: ControlId,
        entity_name: impl Into<String>,
        proposed_values: ChangeSet,
        current_values: ChangeSet,
        submitted_by: Actor,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PendingChangeId::generate(),
            entity_type: EntityKind::Control,
            entity_id,
            entity_name: entity_name.into(),
            change_type: ChangeType::Update,
            proposed_values,
            current_values,
            submitted_by,
            submitted_at,
            status: PendingStatus::Pending,
            resolved_by: None,
            resolved_at: None,
            resolution_note: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PendingStatus::Pending
    }
}

/// Terminal outcome written back by the reviewing workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub status: PendingStatus,
    pub resolved_by: UserId,
    pub resolved_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl PendingChange {
    /// Stamp a terminal resolution onto the record.
    pub fn resolve(&mut self, resolution: Resolution) {
        self.status = resolution.status;
        self.resolved_by = Some(resolution.resolved_by);
        self.resolved_at = Some(resolution.resolved_at);
        self.resolution_note = resolution.note;
    }
}
