//! # riskreg-types
//!
//! Domain model for the risk register core.
//!
//! ```text
//! Row ──owns──▶ [embedded Control]
//!  ▲
//!  └──rowId── ControlLink ──controlId──▶ hub Control
//!                 (per-row probability/impact overrides)
//!
//! Draft (session-local) ──submit──▶ PendingChange ──approve──▶ live entity
//!                                                 └─reject───▶ unchanged
//! ```
//!
//! Field edits are a closed sum type ([`ControlEdit`], [`LinkEdit`]) so an
//! edit can never name a field the entity does not have.

#![deny(unsafe_code)]

pub mod edit;
pub mod error;
pub mod ids;
pub mod model;
pub mod pending;
pub mod role;
pub mod score;

// ── Re-exports ─────────────────────────────────────────────────────────

pub use edit::{ChangeSet, ControlEdit, ControlField, LinkChange, LinkEdit, LinkField, LINK_ID_KEY};
pub use error::{ModelError, ModelResult};
pub use ids::{ControlId, LinkId, PendingChangeId, ProcessId, RiskId, RowId, UserId};
pub use model::{Control, ControlLink, ControlPlacement, ControlType, NewControl, Row, TestFrequency};
pub use pending::{ChangeType, EntityKind, PendingChange, PendingStatus, Resolution};
pub use role::{Actor, Role};
pub use score::{Score, ScoreTriple};
