//! Commit-on-blur editing of one control.
//!
//! Keystrokes stay in a [`FieldBuffer`]; a value is committed exactly once,
//! when focus leaves the field, and only if it differs from what the field
//! showed on focus. The committed edit goes through the [`MutationRouter`].
//!
//! Closing an [`EditSession`] blurs the active field before the draft is
//! submitted or discarded, so the last typed value is never lost.

use std::collections::HashMap;
use std::sync::Arc;

use riskreg_storage::{EntityStore, LinkFilter, RegisterStore};
use riskreg_types::{
    Actor, Control, ControlField, ControlId, ControlLink, LinkField, LinkId, ModelResult,
    PendingChange,
};
use serde_json::Value;
use tracing::debug;

use crate::draft::{DraftAccumulator, FieldEdit};
use crate::error::{WorkflowError, WorkflowResult};
use crate::queue::PendingChangeQueue;
use crate::router::{MutationRouter, RouteOutcome};

/// An editable input in the control panel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldTarget {
    Control(ControlField),
    Link { link_id: LinkId, field: LinkField },
}

impl FieldTarget {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Control(field) => field.key(),
            Self::Link { field, .. } => field.key(),
        }
    }

    pub fn parse(&self, text: &str) -> ModelResult<FieldEdit> {
        Ok(match self {
            Self::Control(field) => FieldEdit::Control(field.parse_edit(text)?),
            Self::Link { link_id, field } => FieldEdit::Link {
                link_id: link_id.clone(),
                edit: field.parse_edit(text)?,
            },
        })
    }
}

#[derive(Debug)]
struct ActiveField {
    target: FieldTarget,
    original: String,
    text: String,
}

/// Keystroke buffer for the focused field.
#[derive(Debug, Default)]
pub struct FieldBuffer {
    active: Option<ActiveField>,
}

impl FieldBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start editing `target`, which currently shows `original`.
    ///
    /// Any field still focused is dropped without committing; blur it
    /// first.
    pub fn focus(&mut self, target: FieldTarget, original: impl Into<String>) {
        let original = original.into();
        self.active = Some(ActiveField {
            target,
            text: original.clone(),
            original,
        });
    }

    /// Replace the buffered text. Ignored when nothing is focused.
    pub fn input(&mut self, text: impl Into<String>) {
        if let Some(active) = self.active.as_mut() {
            active.text = text.into();
        }
    }

    /// The text currently shown in the focused field.
    pub fn text(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.text.as_str())
    }

    pub fn focused(&self) -> Option<&FieldTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    /// Leave the field. Yields an edit only if the text changed.
    ///
    /// Text that does not parse is an error: nothing is committed and the
    /// field stays focused with the typed text so it can be corrected.
    pub fn blur(&mut self) -> ModelResult<Option<FieldEdit>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        if active.text == active.original {
            return Ok(None);
        }
        match active.target.parse(&active.text) {
            Ok(edit) => Ok(Some(edit)),
            Err(e) => {
                self.active = Some(active);
                Err(e)
            }
        }
    }
}

/// What closing the panel does with the draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseDisposition {
    Submit,
    Discard,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CloseOutcome {
    /// `None` when there was nothing to submit.
    Submitted(Option<PendingChange>),
    Discarded { had_draft: bool },
}

/// One open control panel.
///
/// The local view echoes every committed edit immediately. A direct write
/// that fails rolls the view back; a deferred edit stays visible and is
/// flagged unsaved until the draft is submitted or discarded.
pub struct EditSession {
    router: Arc<MutationRouter>,
    queue: Arc<PendingChangeQueue>,
    actor: Actor,
    entity_name: String,
    control: Control,
    links: HashMap<LinkId, ControlLink>,
    buffer: FieldBuffer,
}

impl EditSession {
    /// Load the control and its links and open a panel on it.
    pub async fn open(
        store: &dyn RegisterStore,
        router: Arc<MutationRouter>,
        queue: Arc<PendingChangeQueue>,
        control_id: &ControlId,
        actor: Actor,
    ) -> WorkflowResult<Self> {
        let located = store
            .get_control(control_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("control", control_id))?;
        let links = store
            .list_links(&LinkFilter::control(control_id.clone()))
            .await?
            .into_iter()
            .map(|l| (l.id.clone(), l))
            .collect();
        debug!(control = %control_id, actor = %actor, "Edit session opened");
        Ok(Self {
            router,
            queue,
            actor,
            entity_name: located.control.name.clone(),
            control: located.control,
            links,
            buffer: FieldBuffer::new(),
        })
    }

    pub fn control_id(&self) -> &ControlId {
        &self.control.id
    }

    /// The control as this session shows it.
    pub fn view(&self) -> &Control {
        &self.control
    }

    pub fn link(&self, link_id: &LinkId) -> Option<&ControlLink> {
        self.links.get(link_id)
    }

    /// Whether editing this control needs approval for the session's actor.
    pub fn is_gated(&self) -> bool {
        self.router.requires_approval(&self.control.id, &self.actor)
    }

    /// Focus `target`, blurring the previously focused field first.
    pub async fn focus(
        &mut self,
        drafts: &mut DraftAccumulator,
        target: FieldTarget,
    ) -> WorkflowResult<Option<RouteOutcome>> {
        let committed = self.blur(drafts).await?;
        let original = self.display_text(&target)?;
        self.buffer.focus(target, original);
        Ok(committed)
    }

    pub fn input(&mut self, text: impl Into<String>) {
        self.buffer.input(text);
    }

    pub fn buffer(&self) -> &FieldBuffer {
        &self.buffer
    }

    /// Commit the focused field, if it changed.
    pub async fn blur(&mut self, drafts: &mut DraftAccumulator) -> WorkflowResult<Option<RouteOutcome>> {
        let Some(edit) = self.buffer.blur()? else {
            return Ok(None);
        };
        // Parsed values are normalised; compare against the view, not the text.
        if self.is_current(&edit) {
            debug!(control = %self.control.id, field = edit.key(), "Blurred value unchanged");
            return Ok(None);
        }

        let previous_control = self.control.clone();
        let previous_link = self.echo(&edit);

        match self
            .router
            .apply_or_defer(drafts, &self.control.id, edit, &self.actor)
            .await
        {
            Ok(RouteOutcome::Applied(applied)) => {
                self.control = applied.control.clone();
                if let Some(link) = &applied.link {
                    self.links.insert(link.id.clone(), link.clone());
                }
                Ok(Some(RouteOutcome::Applied(applied)))
            }
            Ok(RouteOutcome::Deferred) => Ok(Some(RouteOutcome::Deferred)),
            Err(e) => {
                self.control = previous_control;
                if let Some(link) = previous_link {
                    self.links.insert(link.id.clone(), link);
                }
                debug!(control = %self.control.id, error = %e, "Rolled back local echo");
                Err(e)
            }
        }
    }

    pub fn is_unsaved(&self, drafts: &DraftAccumulator, target: &FieldTarget) -> bool {
        match target {
            FieldTarget::Control(field) => drafts.is_control_field_unsaved(&self.control.id, *field),
            FieldTarget::Link { link_id, field } => {
                drafts.get(&self.control.id).map_or(false, |d| {
                    d.link_id() == Some(link_id) && d.has_link_field(*field)
                })
            }
        }
    }

    /// Close the panel: flush the focused field, then submit or discard
    /// the draft. On error the session stays usable and the draft intact.
    pub async fn close(
        &mut self,
        drafts: &mut DraftAccumulator,
        disposition: CloseDisposition,
    ) -> WorkflowResult<CloseOutcome> {
        self.blur(drafts).await?;
        match disposition {
            CloseDisposition::Submit => {
                let submitted = self
                    .queue
                    .submit(drafts, &self.control.id, &self.entity_name, &self.actor)
                    .await?;
                Ok(CloseOutcome::Submitted(submitted))
            }
            CloseDisposition::Discard => {
                let had_draft = drafts.discard(&self.control.id);
                if had_draft {
                    debug!(control = %self.control.id, "Draft discarded on close");
                }
                Ok(CloseOutcome::Discarded { had_draft })
            }
        }
    }

    fn is_current(&self, edit: &FieldEdit) -> bool {
        match edit {
            FieldEdit::Control(edit) => edit.field().current(&self.control) == *edit,
            FieldEdit::Link { link_id, edit } => self
                .links
                .get(link_id)
                .map_or(false, |link| edit.field().current(link) == *edit),
        }
    }

    /// Apply `edit` to the local view, returning the link as it was before
    /// when a link was touched.
    fn echo(&mut self, edit: &FieldEdit) -> Option<ControlLink> {
        match edit {
            FieldEdit::Control(edit) => {
                edit.apply(&mut self.control);
                None
            }
            FieldEdit::Link { link_id, edit } => self.links.get_mut(link_id).map(|link| {
                let before = link.clone();
                edit.apply(link);
                before
            }),
        }
    }

    fn display_text(&self, target: &FieldTarget) -> WorkflowResult<String> {
        let value = match target {
            FieldTarget::Control(field) => field.current(&self.control).value(),
            FieldTarget::Link { link_id, field } => {
                let link = self
                    .links
                    .get(link_id)
                    .ok_or_else(|| WorkflowError::not_found("link", link_id))?;
                field.current(link).value()
            }
        };
        Ok(match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}
