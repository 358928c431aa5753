//! Fixtures shared by the risk register scenario and property suites.

use std::sync::Arc;

use riskreg_runtime::{RegisterConfig, RiskRegister};
use riskreg_storage::{InMemoryRegisterStore, Snapshot};
use riskreg_types::{Actor, Control, ControlType, ProcessId, RiskId, Role, Row, Score};
use riskreg_workflow::{ApprovalMode, ChannelNotificationSink, Notification};
use tokio::sync::mpsc::UnboundedReceiver;

/// `Some(score)` for `1..=5`, `None` otherwise.
pub fn score(value: u8) -> Option<Score> {
    Score::new(value).ok()
}

pub fn manager() -> Actor {
    Actor::manager("mgr-1")
}

pub fn risk_owner() -> Actor {
    Actor::new("owner-1", Role::RiskOwner)
}

pub fn row(risk: &str, process: &str) -> Row {
    Row::new(RiskId::new(risk), ProcessId::new(process), 9)
}

pub fn control(name: &str, probability: u8, impact: u8) -> Control {
    Control::new(name, ControlType::Preventive).with_scores(score(probability), score(impact))
}

/// A register over an in-memory store holding `snapshot`, with every
/// control gated and notifications captured.
pub fn gated_register(snapshot: Snapshot) -> (RiskRegister, UnboundedReceiver<Notification>) {
    let mut config = RegisterConfig::default();
    config.approval.mode = ApprovalMode::AllControls;
    register_with(snapshot, config)
}

pub fn register_with(
    snapshot: Snapshot,
    config: RegisterConfig,
) -> (RiskRegister, UnboundedReceiver<Notification>) {
    let (sink, notifications) = ChannelNotificationSink::new();
    let register = RiskRegister::with_store(
        Arc::new(InMemoryRegisterStore::from_snapshot(snapshot)),
        &config,
        Arc::new(sink),
    );
    (register, notifications)
}

/// One row carrying one embedded control.
pub fn single_control_snapshot() -> (Snapshot, Row, Control) {
    let control = control("Dual sign-off", 3, 3);
    let row = row("risk-1", "proc-1")
        .with_gross(score(4), score(4))
        .with_control(control.clone());
    (
        Snapshot {
            rows: vec![row.clone()],
            ..Snapshot::default()
        },
        row,
        control,
    )
}
