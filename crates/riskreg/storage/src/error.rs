use std::fmt;

use riskreg_types::{ControlId, LinkId, PendingChangeId, PendingStatus, RowId};
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failures reported by register storage. Both backends report the same
/// variant for the same failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A link or pending change with this id is already stored.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// Control ids are unique across every row and the hub.
    #[error("control {0} already exists")]
    ControlExists(ControlId),

    #[error("control {control_id} is already linked to row {row_id}")]
    DuplicateLink { row_id: RowId, control_id: ControlId },

    #[error("link {link_id} belongs to control {owner}, not {control_id}")]
    ForeignLink {
        link_id: LinkId,
        owner: ControlId,
        control_id: ControlId,
    },

    #[error("pending change {id} is already {status}")]
    AlreadyResolved {
        id: PendingChangeId,
        status: PendingStatus,
    },

    /// Stored documents disagree with their lookup columns.
    #[error("register data is inconsistent: {0}")]
    Inconsistent(String),

    #[error("query window out of range: {0}")]
    WindowOutOfRange(usize),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether the write clashed with a record that is already stored.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. } | Self::ControlExists(_) | Self::DuplicateLink { .. }
        )
    }
}

#[cfg(feature = "postgres")]
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
