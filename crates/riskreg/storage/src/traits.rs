use async_trait::async_trait;
use riskreg_types::{
    ChangeSet, Control, ControlId, ControlLink, ControlPlacement, LinkId, PendingChange,
    PendingChangeId, Resolution, Row, RowId,
};
use serde::{Deserialize, Serialize};

use crate::filter::{LinkFilter, PendingFilter, QueryWindow, RowFilter};
use crate::StorageResult;

/// A control together with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedControl {
    pub control: Control,
    pub placement: ControlPlacement,
}

/// Post-update state returned by an atomic change-set apply.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub control: Control,
    pub link: Option<ControlLink>,
}

/// Everything the score aggregator reads, taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub rows: Vec<Row>,
    #[serde(default)]
    pub hub_controls: Vec<Control>,
    #[serde(default)]
    pub links: Vec<ControlLink>,
}

/// Storage interface for rows, controls and links.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_row(&self, id: &RowId) -> StorageResult<Option<Row>>;

    /// Rows in register order.
    async fn list_rows(&self, filter: &RowFilter) -> StorageResult<Vec<Row>>;

    /// Insert or replace one row, including its embedded controls. An
    /// embedded control id already used by another row or the hub is
    /// `ControlExists`.
    async fn put_row(&self, row: Row) -> StorageResult<()>;

    /// Swap the whole row set (bulk regeneration). Links whose row is no
    /// longer present are dropped in the same step.
    async fn replace_rows(&self, rows: Vec<Row>) -> StorageResult<()>;

    /// Look a control up wherever it lives.
    async fn get_control(&self, id: &ControlId) -> StorageResult<Option<LocatedControl>>;

    async fn list_hub_controls(&self) -> StorageResult<Vec<Control>>;

    /// Store a new control. Embedded placement appends it to the row's list.
    async fn insert_control(
        &self,
        control: Control,
        placement: ControlPlacement,
    ) -> StorageResult<()>;

    async fn get_link(&self, id: &LinkId) -> StorageResult<Option<ControlLink>>;

    async fn list_links(&self, filter: &LinkFilter) -> StorageResult<Vec<ControlLink>>;

    /// Create a link. A second link for the same `(rowId, controlId)` pair
    /// is `DuplicateLink`.
    async fn insert_link(&self, link: ControlLink) -> StorageResult<()>;

    async fn delete_link(&self, id: &LinkId) -> StorageResult<ControlLink>;

    /// Apply control and link edits as one atomic update. The link, when
    /// present, must belong to `control_id` (otherwise `ForeignLink`).
    async fn apply_change_set(
        &self,
        control_id: &ControlId,
        change: &ChangeSet,
    ) -> StorageResult<AppliedChange>;

    /// Rows, hub controls and links read together.
    async fn snapshot(&self) -> StorageResult<Snapshot> {
        Ok(Snapshot {
            rows: self.list_rows(&RowFilter::all()).await?,
            hub_controls: self.list_hub_controls().await?,
            links: self.list_links(&LinkFilter::all()).await?,
        })
    }
}

/// Storage interface for submitted edits awaiting review.
#[async_trait]
pub trait PendingChangeStore: Send + Sync {
    async fn insert_pending(&self, change: PendingChange) -> StorageResult<()>;

    async fn get_pending(&self, id: &PendingChangeId) -> StorageResult<Option<PendingChange>>;

    /// Changes newest-first.
    async fn list_pending(
        &self,
        filter: &PendingFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<PendingChange>>;

    /// Move a `pending` change to a terminal status. Fails with
    /// `AlreadyResolved` if the change is no longer pending.
    async fn resolve_pending(
        &self,
        id: &PendingChangeId,
        resolution: Resolution,
    ) -> StorageResult<PendingChange>;
}

/// Full register storage: entities, pending changes, and the one
/// operation that must touch both atomically.
#[async_trait]
pub trait RegisterStore: EntityStore + PendingChangeStore + Send + Sync {
    /// Apply a pending change's proposed values and mark it approved in one
    /// step. Nothing is written if the change is no longer pending.
    async fn approve_pending(
        &self,
        id: &PendingChangeId,
        resolution: Resolution,
    ) -> StorageResult<(PendingChange, AppliedChange)>;
}
