//! Approval-gated editing for the risk register.
//!
//! ```text
//!  EditSession ──blur──► MutationRouter ──┬── policy says no ──► EntityStore ──► EventBus
//!  (FieldBuffer)                          │                                       │
//!                                         └── policy says yes ─► DraftAccumulator │
//!                                                                   │ submit      ▼
//!                                             PendingChangeQueue ◄──┘        ScoreBoard
//!                                               approve / reject
//! ```
//!
//! Components receive their collaborators explicitly; nothing here holds
//! global state. Drafts belong to the caller's editing session and are
//! passed in by `&mut`.

#![deny(unsafe_code)]

mod board;
mod catalog;
mod config;
mod draft;
mod error;
mod events;
mod notify;
mod policy;
mod queue;
mod regenerate;
mod router;
mod session;

pub use board::ScoreBoard;
pub use catalog::{ControlCatalog, SharedEditWarning};
pub use config::WorkflowConfig;
pub use draft::{Draft, DraftAccumulator, FieldEdit};
pub use error::{WorkflowError, WorkflowResult};
pub use events::{EventBus, RegisterEvent};
pub use notify::{
    ChannelNotificationSink, Notification, NotificationContext, NotificationEvent,
    NotificationSink, TracingNotificationSink, WritePath,
};
pub use policy::{
    requires_approval, ApprovalConfig, ApprovalMode, ApprovalPolicy, ConfiguredApprovalPolicy,
};
pub use queue::{PendingChangeQueue, STALE_BASELINE_NOTE};
pub use regenerate::regenerate_rows;
pub use router::{MutationRouter, RouteOutcome};
pub use session::{CloseDisposition, CloseOutcome, EditSession, FieldBuffer, FieldTarget};
