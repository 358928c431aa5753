//! Register change events.
//!
//! Components that mutate the register publish here; score recompute and
//! any UI listeners subscribe. Publishing never blocks and never fails:
//! with no subscribers the event is simply dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use riskreg_types::{ControlId, PendingChangeId, PendingStatus, RowId};
use serde::Serialize;
use tokio::sync::broadcast;

/// Something in the register changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegisterEvent {
    /// The row set was regenerated.
    RowsChanged { count: usize },
    /// One row's gross scores, appetite or embedded controls were written.
    RowChanged { row_id: RowId },
    /// A control was created or had fields written.
    ControlChanged { control_id: ControlId },
    /// A link was created, removed or had overrides written.
    LinkChanged { row_id: RowId, control_id: ControlId },
    PendingSubmitted {
        change_id: PendingChangeId,
        control_id: ControlId,
    },
    PendingResolved {
        change_id: PendingChangeId,
        control_id: ControlId,
        status: PendingStatus,
    },
}

impl RegisterEvent {
    /// Whether the event can change any aggregation input.
    pub fn affects_scores(&self) -> bool {
        matches!(
            self,
            Self::RowsChanged { .. }
                | Self::RowChanged { .. }
                | Self::ControlChanged { .. }
                | Self::LinkChanged { .. }
        )
    }
}

/// Broadcast bus for [`RegisterEvent`]s. Cheap to clone; clones share the
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RegisterEvent>,
    published: Arc<AtomicU64>,
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn publish(&self, event: RegisterEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegisterEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published since creation.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
