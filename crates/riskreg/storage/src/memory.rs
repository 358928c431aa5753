//! In-memory reference implementation of the register storage traits.
//!
//! Deterministic and test-friendly. All state sits behind one lock, so every
//! write (including [`RegisterStore::approve_pending`]) is atomic.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use riskreg_types::{
    ChangeSet, Control, ControlId, ControlLink, ControlPlacement, LinkId, PendingChange,
    PendingChangeId, Resolution, Row, RowId,
};
use tracing::debug;

use crate::filter::{LinkFilter, PendingFilter, QueryWindow, RowFilter};
use crate::traits::{
    AppliedChange, EntityStore, LocatedControl, PendingChangeStore, RegisterStore, Snapshot,
};
use crate::{StorageError, StorageResult};

#[derive(Default)]
struct RegisterState {
    rows: Vec<Row>,
    hub_controls: Vec<Control>,
    links: Vec<ControlLink>,
    pending: Vec<PendingChange>,
}

impl RegisterState {
    fn locate(&self, id: &ControlId) -> Option<LocatedControl> {
        for row in &self.rows {
            if let Some(control) = row.find_control(id) {
                return Some(LocatedControl {
                    control: control.clone(),
                    placement: ControlPlacement::Embedded {
                        row_id: row.id.clone(),
                    },
                });
            }
        }
        self.hub_controls
            .iter()
            .find(|c| c.id == *id)
            .map(|control| LocatedControl {
                control: control.clone(),
                placement: ControlPlacement::Hub,
            })
    }

    fn control_mut(&mut self, id: &ControlId) -> Option<&mut Control> {
        if let Some(row) = self.rows.iter_mut().find(|r| r.find_control(id).is_some()) {
            return row.find_control_mut(id);
        }
        self.hub_controls.iter_mut().find(|c| c.id == *id)
    }

    fn control_exists(&self, id: &ControlId) -> bool {
        self.rows.iter().any(|r| r.find_control(id).is_some())
            || self.hub_controls.iter().any(|c| c.id == *id)
    }

    fn apply_change_set(
        &mut self,
        control_id: &ControlId,
        change: &ChangeSet,
    ) -> StorageResult<AppliedChange> {
        // Validate everything before the first write.
        if !self.control_exists(control_id) {
            return Err(StorageError::not_found("control", control_id));
        }
        if let Some(link_change) = &change.link {
            let link = self
                .links
                .iter()
                .find(|l| l.id == link_change.link_id)
                .ok_or_else(|| StorageError::not_found("link", &link_change.link_id))?;
            if link.control_id != *control_id {
                return Err(StorageError::ForeignLink {
                    link_id: link.id.clone(),
                    owner: link.control_id.clone(),
                    control_id: control_id.clone(),
                });
            }
        }

        let control = {
            let control = self
                .control_mut(control_id)
                .ok_or_else(|| StorageError::not_found("control", control_id))?;
            change.apply_to_control(control);
            control.clone()
        };

        let link = match &change.link {
            Some(link_change) => {
                let link = self
                    .links
                    .iter_mut()
                    .find(|l| l.id == link_change.link_id)
                    .ok_or_else(|| StorageError::not_found("link", &link_change.link_id))?;
                link_change.apply(link);
                Some(link.clone())
            }
            None => None,
        };

        Ok(AppliedChange { control, link })
    }
}

/// In-memory register storage adapter.
#[derive(Default)]
pub struct InMemoryRegisterStore {
    state: RwLock<RegisterState>,
}

impl InMemoryRegisterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(RegisterState {
                rows: snapshot.rows,
                hub_controls: snapshot.hub_controls,
                links: snapshot.links,
                pending: Vec::new(),
            }),
        }
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, RegisterState>> {
        self.state
            .read()
            .map_err(|_| StorageError::Backend("register lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, RegisterState>> {
        self.state
            .write()
            .map_err(|_| StorageError::Backend("register lock poisoned".to_string()))
    }
}

#[async_trait]
impl EntityStore for InMemoryRegisterStore {
    async fn get_row(&self, id: &RowId) -> StorageResult<Option<Row>> {
        let guard = self.read()?;
        Ok(guard.rows.iter().find(|r| r.id == *id).cloned())
    }

    async fn list_rows(&self, filter: &RowFilter) -> StorageResult<Vec<Row>> {
        let guard = self.read()?;
        Ok(guard
            .rows
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn put_row(&self, row: Row) -> StorageResult<()> {
        let mut guard = self.write()?;
        // Control ids are unique across all rows and the hub.
        for (index, control) in row.controls.iter().enumerate() {
            let repeated = row.controls[..index].iter().any(|c| c.id == control.id);
            let elsewhere = guard.hub_controls.iter().any(|h| h.id == control.id)
                || guard
                    .rows
                    .iter()
                    .any(|r| r.id != row.id && r.find_control(&control.id).is_some());
            if repeated || elsewhere {
                return Err(StorageError::ControlExists(control.id.clone()));
            }
        }
        match guard.rows.iter().position(|r| r.id == row.id) {
            Some(index) => guard.rows[index] = row,
            None => guard.rows.push(row),
        }
        Ok(())
    }

    async fn replace_rows(&self, rows: Vec<Row>) -> StorageResult<()> {
        let mut guard = self.write()?;
        let before = guard.links.len();
        guard
            .links
            .retain(|link| rows.iter().any(|r| r.id == link.row_id));
        debug!(
            rows = rows.len(),
            dropped_links = before - guard.links.len(),
            "Replaced register rows"
        );
        guard.rows = rows;
        Ok(())
    }

    async fn get_control(&self, id: &ControlId) -> StorageResult<Option<LocatedControl>> {
        Ok(self.read()?.locate(id))
    }

    async fn list_hub_controls(&self) -> StorageResult<Vec<Control>> {
        Ok(self.read()?.hub_controls.clone())
    }

    async fn insert_control(
        &self,
        control: Control,
        placement: ControlPlacement,
    ) -> StorageResult<()> {
        let mut guard = self.write()?;
        if guard.control_exists(&control.id) {
            return Err(StorageError::ControlExists(control.id));
        }
        match placement {
            ControlPlacement::Embedded { row_id } => {
                let row = guard
                    .rows
                    .iter_mut()
                    .find(|r| r.id == row_id)
                    .ok_or_else(|| StorageError::not_found("row", &row_id))?;
                row.controls.push(control);
            }
            ControlPlacement::Hub => guard.hub_controls.push(control),
        }
        Ok(())
    }

    async fn get_link(&self, id: &LinkId) -> StorageResult<Option<ControlLink>> {
        Ok(self.read()?.links.iter().find(|l| l.id == *id).cloned())
    }

    async fn list_links(&self, filter: &LinkFilter) -> StorageResult<Vec<ControlLink>> {
        let guard = self.read()?;
        Ok(guard
            .links
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect())
    }

    async fn insert_link(&self, link: ControlLink) -> StorageResult<()> {
        let mut guard = self.write()?;
        if guard
            .links
            .iter()
            .any(|l| l.row_id == link.row_id && l.control_id == link.control_id)
        {
            return Err(StorageError::DuplicateLink {
                row_id: link.row_id,
                control_id: link.control_id,
            });
        }
        if guard.links.iter().any(|l| l.id == link.id) {
            return Err(StorageError::already_exists("link", &link.id));
        }
        guard.links.push(link);
        Ok(())
    }

    async fn delete_link(&self, id: &LinkId) -> StorageResult<ControlLink> {
        let mut guard = self.write()?;
        let index = guard
            .links
            .iter()
            .position(|l| l.id == *id)
            .ok_or_else(|| StorageError::not_found("link", id))?;
        Ok(guard.links.remove(index))
    }

    async fn apply_change_set(
        &self,
        control_id: &ControlId,
        change: &ChangeSet,
    ) -> StorageResult<AppliedChange> {
        self.write()?.apply_change_set(control_id, change)
    }

    async fn snapshot(&self) -> StorageResult<Snapshot> {
        let guard = self.read()?;
        Ok(Snapshot {
            rows: guard.rows.clone(),
            hub_controls: guard.hub_controls.clone(),
            links: guard.links.clone(),
        })
    }
}

#[async_trait]
impl PendingChangeStore for InMemoryRegisterStore {
    async fn insert_pending(&self, change: PendingChange) -> StorageResult<()> {
        let mut guard = self.write()?;
        if guard.pending.iter().any(|p| p.id == change.id) {
            return Err(StorageError::already_exists("pending change", &change.id));
        }
        guard.pending.push(change);
        Ok(())
    }

    async fn get_pending(&self, id: &PendingChangeId) -> StorageResult<Option<PendingChange>> {
        Ok(self.read()?.pending.iter().find(|p| p.id == *id).cloned())
    }

    async fn list_pending(
        &self,
        filter: &PendingFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<PendingChange>> {
        let guard = self.read()?;
        // Insertion order breaks timestamp ties, newest first.
        let mut values = guard
            .pending
            .iter()
            .rev()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(window.apply(values))
    }

    async fn resolve_pending(
        &self,
        id: &PendingChangeId,
        resolution: Resolution,
    ) -> StorageResult<PendingChange> {
        let mut guard = self.write()?;
        let change = guard
            .pending
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or_else(|| StorageError::not_found("pending change", id))?;
        if !change.is_pending() {
            return Err(StorageError::AlreadyResolved {
                id: id.clone(),
                status: change.status,
            });
        }
        change.resolve(resolution);
        Ok(change.clone())
    }
}

#[async_trait]
impl RegisterStore for InMemoryRegisterStore {
    async fn approve_pending(
        &self,
        id: &PendingChangeId,
        resolution: Resolution,
    ) -> StorageResult<(PendingChange, AppliedChange)> {
        let mut guard = self.write()?;
        let change = guard
            .pending
            .iter()
            .find(|p| p.id == *id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("pending change", id))?;
        if !change.is_pending() {
            return Err(StorageError::AlreadyResolved {
                id: id.clone(),
                status: change.status,
            });
        }

        let applied = guard.apply_change_set(&change.entity_id, &change.proposed_values)?;

        let stored = guard
            .pending
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or_else(|| StorageError::not_found("pending change", id))?;
        stored.resolve(resolution);
        Ok((stored.clone(), applied))
    }
}
