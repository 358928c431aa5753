//! Session-local drafts of gated edits.
//!
//! A draft collects every deferred edit to one control until it is
//! submitted or discarded. Re-editing a field replaces its earlier value,
//! so a draft holds at most one edit per field. Link override edits are
//! kept apart from control edits together with the link they target.

use std::collections::HashMap;

use riskreg_types::{
    ChangeSet, ControlEdit, ControlField, ControlId, LinkChange, LinkEdit, LinkField, LinkId,
};

use crate::error::{WorkflowError, WorkflowResult};

/// One edit as it leaves the editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldEdit {
    Control(ControlEdit),
    /// Override on the link between the edited control and one row.
    Link { link_id: LinkId, edit: LinkEdit },
}

impl FieldEdit {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Control(edit) => edit.field().key(),
            Self::Link { edit, .. } => edit.field().key(),
        }
    }

    /// Single-edit change set for a direct write.
    pub fn into_change_set(self) -> ChangeSet {
        match self {
            Self::Control(edit) => ChangeSet::control_only(vec![edit]),
            Self::Link { link_id, edit } => ChangeSet {
                control: Vec::new(),
                link: Some(LinkChange {
                    link_id,
                    edits: vec![edit],
                }),
            },
        }
    }
}

/// Proposed edits for one control.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Draft {
    control: Vec<ControlEdit>,
    link: Option<LinkChange>,
}

impl Draft {
    pub fn is_empty(&self) -> bool {
        self.control.is_empty() && self.link.as_ref().map_or(true, |l| l.edits.is_empty())
    }

    pub fn len(&self) -> usize {
        self.control.len() + self.link.as_ref().map_or(0, |l| l.edits.len())
    }

    pub fn record_control(&mut self, edit: ControlEdit) {
        match self.control.iter_mut().find(|e| e.field() == edit.field()) {
            Some(slot) => *slot = edit,
            None => self.control.push(edit),
        }
    }

    /// Record a link override. A draft targets at most one link.
    pub fn record_link(&mut self, link_id: LinkId, edit: LinkEdit) -> Result<(), LinkId> {
        let change = self.link.get_or_insert_with(|| LinkChange {
            link_id: link_id.clone(),
            edits: Vec::new(),
        });
        if change.link_id != link_id {
            return Err(change.link_id.clone());
        }
        match change.edits.iter_mut().find(|e| e.field() == edit.field()) {
            Some(slot) => *slot = edit,
            None => change.edits.push(edit),
        }
        Ok(())
    }

    pub fn has_control_field(&self, field: ControlField) -> bool {
        self.control.iter().any(|e| e.field() == field)
    }

    pub fn has_link_field(&self, field: LinkField) -> bool {
        self.link
            .as_ref()
            .map_or(false, |l| l.edits.iter().any(|e| e.field() == field))
    }

    pub fn link_id(&self) -> Option<&LinkId> {
        self.link.as_ref().map(|l| &l.link_id)
    }

    pub fn control_edits(&self) -> &[ControlEdit] {
        &self.control
    }

    pub fn to_change_set(&self) -> ChangeSet {
        ChangeSet {
            control: self.control.clone(),
            link: self.link.clone(),
        }
    }
}

/// Drafts of one editing session, keyed by control.
#[derive(Debug, Default)]
pub struct DraftAccumulator {
    drafts: HashMap<ControlId, Draft>,
}

impl DraftAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, control_id: &ControlId, edit: FieldEdit) -> WorkflowResult<()> {
        let draft = self.drafts.entry(control_id.clone()).or_default();
        match edit {
            FieldEdit::Control(edit) => {
                draft.record_control(edit);
                Ok(())
            }
            FieldEdit::Link { link_id, edit } => draft
                .record_link(link_id.clone(), edit)
                .map_err(|existing| WorkflowError::DraftLinkMismatch {
                    control_id: control_id.clone(),
                    existing,
                    requested: link_id,
                }),
        }
    }

    pub fn get(&self, control_id: &ControlId) -> Option<&Draft> {
        self.drafts.get(control_id).filter(|d| !d.is_empty())
    }

    /// Whether the control carries any unsubmitted edit.
    pub fn has_unsaved(&self, control_id: &ControlId) -> bool {
        self.get(control_id).is_some()
    }

    pub fn is_control_field_unsaved(&self, control_id: &ControlId, field: ControlField) -> bool {
        self.get(control_id)
            .map_or(false, |d| d.has_control_field(field))
    }

    pub fn is_link_field_unsaved(&self, control_id: &ControlId, field: LinkField) -> bool {
        self.get(control_id).map_or(false, |d| d.has_link_field(field))
    }

    /// Drop the control's draft. Returns whether one existed.
    pub fn discard(&mut self, control_id: &ControlId) -> bool {
        self.drafts
            .remove(control_id)
            .map_or(false, |d| !d.is_empty())
    }

    /// Controls with unsaved edits.
    pub fn controls(&self) -> impl Iterator<Item = &ControlId> {
        self.drafts
            .iter()
            .filter(|(_, d)| !d.is_empty())
            .map(|(id, _)| id)
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.values().all(Draft::is_empty)
    }
}
