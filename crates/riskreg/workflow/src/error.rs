use riskreg_storage::StorageError;
use riskreg_types::{ControlId, LinkId, ModelError, PendingChangeId, PendingStatus};
use thiserror::Error;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors surfaced by routing, submission, review and catalog operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid value: {0}")]
    Model(#[from] ModelError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("pending change {id} is already {status}")]
    AlreadyResolved {
        id: PendingChangeId,
        status: PendingStatus,
    },

    #[error("pending change {id} was rejected: baseline changed for {}", fields.join(", "))]
    StaleBaseline {
        id: PendingChangeId,
        fields: Vec<String>,
    },

    #[error("draft for control {control_id} already targets link {existing}, not {requested}")]
    DraftLinkMismatch {
        control_id: ControlId,
        existing: LinkId,
        requested: LinkId,
    },

    #[error("control {0} is embedded in a row and cannot be linked")]
    NotHubControl(ControlId),

    #[error("link {link_id} belongs to control {owner}, not {control_id}")]
    ForeignLink {
        link_id: LinkId,
        owner: ControlId,
        control_id: ControlId,
    },
}

impl WorkflowError {
    pub(crate) fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
