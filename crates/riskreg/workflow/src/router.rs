//! Per-edit routing: straight to the store, or into the control's draft.

use std::sync::Arc;

use riskreg_storage::{AppliedChange, EntityStore, RegisterStore};
use riskreg_types::{Actor, ChangeSet, ControlId, LinkId};
use tracing::{debug, info, warn};

use crate::draft::{DraftAccumulator, FieldEdit};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{EventBus, RegisterEvent};
use crate::notify::{Notification, NotificationSink, WritePath};
use crate::policy::{requires_approval, ApprovalPolicy};

/// Where a routed edit ended up.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteOutcome {
    /// Written to the store; carries the post-write state.
    Applied(AppliedChange),
    /// Recorded in the control's draft; the store is untouched.
    Deferred,
}

impl RouteOutcome {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }
}

/// Applies or defers single-field edits according to the approval policy.
pub struct MutationRouter {
    store: Arc<dyn RegisterStore>,
    policy: Arc<dyn ApprovalPolicy>,
    sink: Arc<dyn NotificationSink>,
    bus: EventBus,
}

impl MutationRouter {
    pub fn new(
        store: Arc<dyn RegisterStore>,
        policy: Arc<dyn ApprovalPolicy>,
        sink: Arc<dyn NotificationSink>,
        bus: EventBus,
    ) -> Self {
        Self {
            store,
            policy,
            sink,
            bus,
        }
    }

    /// Whether an edit by `actor` to `control_id` would be deferred.
    pub fn requires_approval(&self, control_id: &ControlId, actor: &Actor) -> bool {
        requires_approval(self.policy.as_ref(), control_id, actor)
    }

    /// Route one edit.
    ///
    /// Link overrides are checked against the control before either path,
    /// so neither a write nor a draft can target another control's link.
    /// Store failures are returned as-is and never retried.
    pub async fn apply_or_defer(
        &self,
        drafts: &mut DraftAccumulator,
        control_id: &ControlId,
        edit: FieldEdit,
        actor: &Actor,
    ) -> WorkflowResult<RouteOutcome> {
        if self.store.get_control(control_id).await?.is_none() {
            return Err(WorkflowError::not_found("control", control_id));
        }
        if let FieldEdit::Link { link_id, .. } = &edit {
            self.check_link(control_id, link_id).await?;
        }

        if self.requires_approval(control_id, actor) {
            let field = edit.key();
            drafts.record(control_id, edit)?;
            debug!(control = %control_id, field, actor = %actor, "Edit deferred to draft");
            return Ok(RouteOutcome::Deferred);
        }

        let field = edit.key();
        let change = edit.into_change_set();
        let applied = self
            .store
            .apply_change_set(control_id, &change)
            .await
            .map_err(|e| {
                warn!(control = %control_id, field, error = %e, "Direct edit failed");
                e
            })?;

        info!(control = %control_id, field, actor = %actor, "Edit applied");
        announce_write(&self.bus, self.sink.as_ref(), &change, &applied, actor, WritePath::Direct);
        Ok(RouteOutcome::Applied(applied))
    }

    async fn check_link(&self, control_id: &ControlId, link_id: &LinkId) -> WorkflowResult<()> {
        let link = self
            .store
            .get_link(link_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("link", link_id))?;
        if link.control_id != *control_id {
            return Err(WorkflowError::ForeignLink {
                link_id: link_id.clone(),
                owner: link.control_id,
                control_id: control_id.clone(),
            });
        }
        Ok(())
    }
}

/// Publish change events and tester-assignment notifications for a write
/// that reached the store.
pub(crate) fn announce_write(
    bus: &EventBus,
    sink: &dyn NotificationSink,
    change: &ChangeSet,
    applied: &AppliedChange,
    actor: &Actor,
    path: WritePath,
) {
    if !change.control.is_empty() {
        bus.publish(RegisterEvent::ControlChanged {
            control_id: applied.control.id.clone(),
        });
    }
    if let Some(link) = &applied.link {
        bus.publish(RegisterEvent::LinkChanged {
            row_id: link.row_id.clone(),
            control_id: link.control_id.clone(),
        });
    }
    if let Some(recipient) = change.assigned_tester() {
        sink.notify(Notification::tester_assigned(
            recipient.clone(),
            &applied.control,
            actor,
            path,
        ));
    }
}
