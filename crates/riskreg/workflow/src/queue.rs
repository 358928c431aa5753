//! Pending change queue: draft submission and review.
//!
//! ```text
//!   draft ──submit──► pending ──approve──► approved   (live entity updated)
//!                        │
//!                        └────reject───► rejected    (live entity untouched)
//! ```
//!
//! Both resolutions are terminal. Two submissions for the same control
//! produce two independent entries; they are never merged.

use std::sync::Arc;

use chrono::Utc;
use riskreg_storage::{EntityStore, PendingChangeStore, PendingFilter, QueryWindow, RegisterStore};
use riskreg_types::{
    Actor, ChangeSet, Control, ControlId, ControlLink, LinkChange, PendingChange, PendingChangeId,
    PendingStatus, Resolution,
};
use tracing::{info, warn};

use crate::draft::{Draft, DraftAccumulator};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{EventBus, RegisterEvent};
use crate::notify::{NotificationSink, WritePath};
use crate::router::announce_write;

/// Note recorded on changes rejected by the baseline check.
pub const STALE_BASELINE_NOTE: &str = "stale baseline";

pub struct PendingChangeQueue {
    store: Arc<dyn RegisterStore>,
    sink: Arc<dyn NotificationSink>,
    bus: EventBus,
    validate_baseline: bool,
}

impl PendingChangeQueue {
    pub fn new(store: Arc<dyn RegisterStore>, sink: Arc<dyn NotificationSink>, bus: EventBus) -> Self {
        Self {
            store,
            sink,
            bus,
            validate_baseline: false,
        }
    }

    /// Reject approvals whose recorded baseline no longer matches the live
    /// entity.
    pub fn with_baseline_validation(mut self, enabled: bool) -> Self {
        self.validate_baseline = enabled;
        self
    }

    /// Submit the control's draft as one pending change.
    ///
    /// Returns `Ok(None)` when there is nothing to submit. The draft is
    /// cleared only once the change is stored; on any failure it is kept
    /// so the user can retry.
    pub async fn submit(
        &self,
        drafts: &mut DraftAccumulator,
        control_id: &ControlId,
        entity_name: &str,
        actor: &Actor,
    ) -> WorkflowResult<Option<PendingChange>> {
        let Some(draft) = drafts.get(control_id) else {
            return Ok(None);
        };

        let change = match self.build_change(draft, control_id, entity_name, actor).await {
            Ok(change) => change,
            Err(e) => {
                warn!(control = %control_id, error = %e, "Submission failed; draft kept");
                return Err(e);
            }
        };
        if let Err(e) = self.store.insert_pending(change.clone()).await {
            warn!(control = %control_id, error = %e, "Submission failed; draft kept");
            return Err(e.into());
        }

        drafts.discard(control_id);
        info!(
            change_id = %change.id,
            control = %control_id,
            fields = ?change.proposed_values.field_keys(),
            submitted_by = %actor,
            "Pending change submitted"
        );
        self.bus.publish(RegisterEvent::PendingSubmitted {
            change_id: change.id.clone(),
            control_id: control_id.clone(),
        });
        Ok(Some(change))
    }

    async fn build_change(
        &self,
        draft: &Draft,
        control_id: &ControlId,
        entity_name: &str,
        actor: &Actor,
    ) -> WorkflowResult<PendingChange> {
        let located = self
            .store
            .get_control(control_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("control", control_id))?;
        let proposed = draft.to_change_set();

        let current_link = match &proposed.link {
            Some(change) => {
                let link = self
                    .store
                    .get_link(&change.link_id)
                    .await?
                    .ok_or_else(|| WorkflowError::not_found("link", &change.link_id))?;
                Some(LinkChange {
                    link_id: change.link_id.clone(),
                    edits: change.edits.iter().map(|e| e.field().current(&link)).collect(),
                })
            }
            None => None,
        };
        let current = ChangeSet {
            control: proposed
                .control
                .iter()
                .map(|e| e.field().current(&located.control))
                .collect(),
            link: current_link,
        };

        Ok(PendingChange::control_update(
            control_id.clone(),
            entity_name,
            proposed,
            current,
            actor.clone(),
            Utc::now(),
        ))
    }

    /// Approve a pending change: apply its proposed values atomically and
    /// mark it approved.
    pub async fn approve(
        &self,
        id: &PendingChangeId,
        reviewer: &Actor,
    ) -> WorkflowResult<PendingChange> {
        let change = self.open_change(id, reviewer).await?;

        if self.validate_baseline {
            let stale = self.stale_fields(&change).await?;
            if !stale.is_empty() {
                let note = format!("{STALE_BASELINE_NOTE}: {} changed since submission", stale.join(", "));
                let rejected = self
                    .store
                    .resolve_pending(id, resolution(PendingStatus::Rejected, reviewer, Some(note)))
                    .await?;
                warn!(change_id = %id, control = %rejected.entity_id, fields = ?stale, "Approval refused: stale baseline");
                self.publish_resolved(&rejected);
                return Err(WorkflowError::StaleBaseline {
                    id: id.clone(),
                    fields: stale,
                });
            }
        }

        let (approved, applied) = self
            .store
            .approve_pending(id, resolution(PendingStatus::Approved, reviewer, None))
            .await?;

        info!(
            change_id = %id,
            control = %approved.entity_id,
            reviewer = %reviewer,
            "Pending change approved"
        );
        announce_write(
            &self.bus,
            self.sink.as_ref(),
            &approved.proposed_values,
            &applied,
            &approved.submitted_by,
            WritePath::Approval,
        );
        self.publish_resolved(&approved);
        Ok(approved)
    }

    /// Reject a pending change. The live entity is not touched.
    pub async fn reject(
        &self,
        id: &PendingChangeId,
        reviewer: &Actor,
        reason: Option<String>,
    ) -> WorkflowResult<PendingChange> {
        self.open_change(id, reviewer).await?;
        let rejected = self
            .store
            .resolve_pending(id, resolution(PendingStatus::Rejected, reviewer, reason))
            .await?;
        info!(
            change_id = %id,
            control = %rejected.entity_id,
            reviewer = %reviewer,
            reason = rejected.resolution_note.as_deref().unwrap_or(""),
            "Pending change rejected"
        );
        self.publish_resolved(&rejected);
        Ok(rejected)
    }

    pub async fn list_pending(
        &self,
        filter: &PendingFilter,
        window: QueryWindow,
    ) -> WorkflowResult<Vec<PendingChange>> {
        Ok(self.store.list_pending(filter, window).await?)
    }

    pub async fn get(&self, id: &PendingChangeId) -> WorkflowResult<Option<PendingChange>> {
        Ok(self.store.get_pending(id).await?)
    }

    /// Whether the control has at least one change awaiting review.
    pub async fn has_pending(&self, control_id: &ControlId) -> WorkflowResult<bool> {
        let open = self
            .store
            .list_pending(
                &PendingFilter::open().for_entity(control_id.clone()),
                QueryWindow { limit: 1, offset: 0 },
            )
            .await?;
        Ok(!open.is_empty())
    }

    async fn open_change(
        &self,
        id: &PendingChangeId,
        reviewer: &Actor,
    ) -> WorkflowResult<PendingChange> {
        if !reviewer.role.is_manager() {
            return Err(WorkflowError::Forbidden(format!(
                "{reviewer} cannot resolve pending changes"
            )));
        }
        let change = self
            .store
            .get_pending(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("pending change", id))?;
        if !change.is_pending() {
            return Err(WorkflowError::AlreadyResolved {
                id: id.clone(),
                status: change.status,
            });
        }
        Ok(change)
    }

    async fn stale_fields(&self, change: &PendingChange) -> WorkflowResult<Vec<String>> {
        let located = self
            .store
            .get_control(&change.entity_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("control", &change.entity_id))?;
        let link = match &change.current_values.link {
            Some(baseline) => self.store.get_link(&baseline.link_id).await?,
            None => None,
        };
        Ok(baseline_mismatches(&change.current_values, &located.control, link.as_ref()))
    }

    fn publish_resolved(&self, change: &PendingChange) {
        self.bus.publish(RegisterEvent::PendingResolved {
            change_id: change.id.clone(),
            control_id: change.entity_id.clone(),
            status: change.status,
        });
    }
}

fn resolution(status: PendingStatus, reviewer: &Actor, note: Option<String>) -> Resolution {
    Resolution {
        status,
        resolved_by: reviewer.user_id.clone(),
        resolved_at: Utc::now(),
        note,
    }
}

/// Keys of baseline fields whose live value differs. A link that no longer
/// exists makes all of its fields stale.
fn baseline_mismatches(
    baseline: &ChangeSet,
    control: &Control,
    link: Option<&ControlLink>,
) -> Vec<String> {
    let mut stale: Vec<String> = baseline
        .control
        .iter()
        .filter(|recorded| recorded.field().current(control) != **recorded)
        .map(|recorded| recorded.field().key().to_string())
        .collect();
    if let Some(recorded_link) = &baseline.link {
        for recorded in &recorded_link.edits {
            let live = link.map(|l| recorded.field().current(l));
            if live.as_ref() != Some(recorded) {
                stale.push(recorded.field().key().to_string());
            }
        }
    }
    stale
}
