//! Fire-and-forget notifications for assignment-relevant edits.

use riskreg_types::{Actor, Control, ControlId, UserId};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    TesterAssigned,
}

/// How the triggering edit reached the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePath {
    Direct,
    Approval,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContext {
    pub control_id: ControlId,
    pub control_name: String,
    /// User whose edit (or approval) made the assignment.
    pub assigned_by: UserId,
    pub path: WritePath,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub event: NotificationEvent,
    pub recipient: UserId,
    pub context: NotificationContext,
}

impl Notification {
    pub fn tester_assigned(recipient: UserId, control: &Control, by: &Actor, path: WritePath) -> Self {
        Self {
            event: NotificationEvent::TesterAssigned,
            recipient,
            context: NotificationContext {
                control_id: control.id.clone(),
                control_name: control.name.clone(),
                assigned_by: by.user_id.clone(),
                path,
            },
        }
    }
}

/// Delivery is outside the register; sinks must not block and cannot fail
/// the write that triggered them.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notification: Notification) {
        info!(
            event = ?notification.event,
            recipient = %notification.recipient,
            control = %notification.context.control_id,
            path = ?notification.context.path,
            "Notification dispatched"
        );
    }
}

/// Forwards notifications into an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelNotificationSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotificationSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("Notification receiver dropped; discarding");
        }
    }
}
