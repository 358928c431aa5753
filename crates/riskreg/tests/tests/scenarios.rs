//! Cross-crate scenarios: worked aggregation cases, gated submission, review
//! round trips and tester notifications.

use riskreg_runtime::RegisterConfig;
use riskreg_scoring::{score_rows, AppetiteStatus};
use riskreg_storage::{PendingFilter, QueryWindow, Snapshot};
use riskreg_tests::*;
use riskreg_types::{
    Actor, ControlField, ControlId, ControlLink, PendingChange, PendingStatus,
};
use riskreg_workflow::{
    ApprovalMode, CloseDisposition, CloseOutcome, DraftAccumulator, FieldTarget, RouteOutcome,
    WorkflowError, WritePath,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open a session, type each `(field, text)` in turn and close with submit.
async fn submit_edits(
    register: &riskreg_runtime::RiskRegister,
    drafts: &mut DraftAccumulator,
    control_id: &ControlId,
    actor: Actor,
    edits: &[(ControlField, &str)],
) -> PendingChange {
    let mut session = register.open_session(control_id, actor).await.unwrap();
    for (field, text) in edits {
        session
            .focus(drafts, FieldTarget::Control(*field))
            .await
            .unwrap();
        session.input(*text);
    }
    match session.close(drafts, CloseDisposition::Submit).await.unwrap() {
        CloseOutcome::Submitted(Some(change)) => change,
        other => panic!("expected a submitted change, got {other:?}"),
    }
}

async fn live_control(
    register: &riskreg_runtime::RiskRegister,
    id: &ControlId,
) -> riskreg_types::Control {
    register.control(id).await.unwrap().unwrap().control
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[test]
fn scenario_1_no_controls_uses_gross() {
    let row = row("risk-1", "proc-1").with_gross(score(3), score(4));

    let scores = score_rows(&[row], &[], &[]);

    assert_eq!(scores[0].net.score, Some(12));
    assert_eq!(scores[0].net, scores[0].gross);
    assert_eq!(scores[0].appetite_status(), AppetiteStatus::ExceedsAppetite);
}

#[test]
fn scenario_2_single_embedded_control() {
    let row = row("risk-1", "proc-1")
        .with_gross(score(4), score(5))
        .with_control(control("Dual sign-off", 2, 2));

    let scores = score_rows(&[row], &[], &[]);

    assert_eq!(scores[0].net.score, Some(4));
    assert_eq!(scores[0].appetite_status(), AppetiteStatus::WithinAppetite);
}

#[test]
fn scenario_3_link_override_takes_part_in_the_minimum() {
    let hub = control("Shared reconciliation", 5, 4);
    let row = row("risk-1", "proc-1")
        .with_gross(score(5), score(5))
        .with_control(control("Own", 2, 3));
    let link = ControlLink::new(row.id.clone(), hub.id.clone()).with_overrides(score(1), None);

    let scores = score_rows(&[row], &[link], &[hub]);

    let net = scores[0].net;
    assert_eq!(net.probability, score(1));
    assert_eq!(net.impact, score(3));
    assert_eq!(net.score, Some(3));
}

// ---------------------------------------------------------------------------
// Gated submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_4_two_fields_become_one_pending_change() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, _notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();

    let change = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::Name, "X"), (ControlField::Comment, "Y")],
    )
    .await;

    let all = register
        .queue()
        .list_pending(&PendingFilter::all(), QueryWindow::all())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, change.id);
    assert_eq!(change.proposed_values.field_keys(), vec!["name", "comment"]);
    assert_eq!(change.entity_name, "Dual sign-off");

    let live = live_control(&register, &control.id).await;
    assert_eq!(live.name, "Dual sign-off");
    assert!(live.comment.is_empty());
    assert!(!drafts.has_unsaved(&control.id));
}

#[tokio::test]
async fn scenario_5_separate_submissions_are_not_merged() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, _notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();

    let first = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::Name, "First")],
    )
    .await;
    let second = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::Name, "Second")],
    )
    .await;

    assert_ne!(first.id, second.id);
    let open = register
        .queue()
        .list_pending(
            &PendingFilter::open().for_entity(control.id.clone()),
            QueryWindow::all(),
        )
        .await
        .unwrap();
    assert_eq!(open.len(), 2);
}

#[tokio::test]
async fn managers_bypass_the_gate() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, _notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();

    let mut session = register.open_session(&control.id, manager()).await.unwrap();
    assert!(!session.is_gated());
    session
        .focus(&mut drafts, FieldTarget::Control(ControlField::NetProbability))
        .await
        .unwrap();
    session.input("1");
    let outcome = session.blur(&mut drafts).await.unwrap();

    assert!(matches!(outcome, Some(RouteOutcome::Applied(_))));
    assert!(drafts.is_empty());
    assert_eq!(live_control(&register, &control.id).await.net_probability, score(1));
    assert_eq!(register.scores().await.unwrap()[0].net.score, Some(3));
}

// ---------------------------------------------------------------------------
// Review round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approve_applies_every_proposed_field() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, _notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();
    let change = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::Name, "X"), (ControlField::Comment, "Y")],
    )
    .await;

    let approved = register.queue().approve(&change.id, &manager()).await.unwrap();

    assert_eq!(approved.status, PendingStatus::Approved);
    assert_eq!(approved.resolved_by, Some(manager().user_id));
    assert!(approved.resolved_at.is_some());
    let live = live_control(&register, &control.id).await;
    assert_eq!(live.name, "X");
    assert_eq!(live.comment, "Y");
    assert!(!register.queue().has_pending(&control.id).await.unwrap());
}

#[tokio::test]
async fn reject_leaves_the_control_untouched() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, _notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();
    let change = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::Name, "X"), (ControlField::Comment, "Y")],
    )
    .await;

    let rejected = register
        .queue()
        .reject(&change.id, &manager(), Some("not agreed".into()))
        .await
        .unwrap();

    assert_eq!(rejected.status, PendingStatus::Rejected);
    assert_eq!(rejected.resolution_note.as_deref(), Some("not agreed"));
    assert_eq!(live_control(&register, &control.id).await, control);
    assert!(!drafts.has_unsaved(&control.id));

    let again = register.queue().approve(&change.id, &manager()).await.unwrap_err();
    assert!(matches!(again, WorkflowError::AlreadyResolved { .. }));
}

#[tokio::test]
async fn only_managers_review() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, _notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();
    let change = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::Comment, "reviewed quarterly")],
    )
    .await;

    let err = register
        .queue()
        .approve(&change.id, &risk_owner())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
    assert!(register.queue().has_pending(&control.id).await.unwrap());
}

#[tokio::test]
async fn approved_score_change_reaches_the_board() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, _notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();
    assert_eq!(register.scores().await.unwrap()[0].net.score, Some(9));

    let change = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::NetImpact, "1")],
    )
    .await;
    assert_eq!(register.scores().await.unwrap()[0].net.score, Some(9));

    register.queue().approve(&change.id, &manager()).await.unwrap();
    assert_eq!(register.scores().await.unwrap()[0].net.score, Some(3));
}

#[tokio::test]
async fn row_write_reaches_the_board() {
    let row = row("risk-1", "proc-1").with_gross(score(3), score(4));
    let snapshot = Snapshot {
        rows: vec![row.clone()],
        ..Snapshot::default()
    };
    let (register, _notifications) = gated_register(snapshot);
    let before = register.scores().await.unwrap();
    assert_eq!(before[0].gross.score, Some(12));
    assert_eq!(before[0].net.score, Some(12));

    register
        .catalog()
        .put_row(row.clone().with_gross(score(5), score(5)))
        .await
        .unwrap();

    let after = register.scores().await.unwrap();
    assert_eq!(after[0].gross.score, Some(25));
    assert_eq!(after[0].net.score, Some(25));
    assert_eq!(
        register.row(&row.id).await.unwrap().unwrap().gross_probability,
        score(5)
    );
}

#[tokio::test]
async fn stale_baseline_is_rejected_when_validation_is_enabled() {
    let (snapshot, _, control) = single_control_snapshot();
    let mut config = RegisterConfig::default();
    config.approval.mode = ApprovalMode::AllControls;
    config.workflow.validate_baseline_on_approval = true;
    let (register, _notifications) = register_with(snapshot, config);
    let mut drafts = DraftAccumulator::new();

    let change = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::Name, "X")],
    )
    .await;

    let mut session = register.open_session(&control.id, manager()).await.unwrap();
    session
        .focus(&mut drafts, FieldTarget::Control(ControlField::Name))
        .await
        .unwrap();
    session.input("Z");
    session.blur(&mut drafts).await.unwrap();

    let err = register.queue().approve(&change.id, &manager()).await.unwrap_err();
    match err {
        WorkflowError::StaleBaseline { fields, .. } => assert_eq!(fields, vec!["name".to_string()]),
        other => panic!("expected stale baseline, got {other:?}"),
    }
    let stored = register.queue().get(&change.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PendingStatus::Rejected);
    assert_eq!(live_control(&register, &control.id).await.name, "Z");
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tester_assignment_notifies_after_approval() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, mut notifications) = gated_register(snapshot);
    let mut drafts = DraftAccumulator::new();
    let change = submit_edits(
        &register,
        &mut drafts,
        &control.id,
        risk_owner(),
        &[(ControlField::AssignedTester, "tester-7")],
    )
    .await;
    assert!(notifications.try_recv().is_err());

    register.queue().approve(&change.id, &manager()).await.unwrap();

    let sent = notifications.try_recv().unwrap();
    assert_eq!(sent.recipient.as_str(), "tester-7");
    assert_eq!(sent.context.control_id, control.id);
    assert_eq!(sent.context.assigned_by, risk_owner().user_id);
    assert_eq!(sent.context.path, WritePath::Approval);
}

#[tokio::test]
async fn direct_assignment_notifies_immediately() {
    let (snapshot, _, control) = single_control_snapshot();
    let (register, mut notifications) = register_with(snapshot, RegisterConfig::default());
    let mut drafts = DraftAccumulator::new();

    let mut session = register.open_session(&control.id, risk_owner()).await.unwrap();
    session
        .focus(&mut drafts, FieldTarget::Control(ControlField::AssignedTester))
        .await
        .unwrap();
    session.input("tester-3");
    session.blur(&mut drafts).await.unwrap();

    let sent = notifications.try_recv().unwrap();
    assert_eq!(sent.recipient.as_str(), "tester-3");
    assert_eq!(sent.context.path, WritePath::Direct);
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_json_seeds_a_register() {
    let (snapshot, row, _) = single_control_snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: Snapshot = serde_json::from_str(&json).unwrap();

    let register = riskreg_runtime::RiskRegister::from_config(&RegisterConfig::default())
        .await
        .unwrap();
    register.seed(parsed).await.unwrap();

    let scores = register.scores().await.unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].row_id, row.id);
    assert_eq!(scores[0].net.score, Some(9));
}
