//! Control creation, linking and row regeneration.

use std::collections::HashMap;
use std::sync::Arc;

use riskreg_scoring::{effective_controls, EffectiveControl, LinkIndex};
use riskreg_storage::{EntityStore, LinkFilter, RowFilter};
use riskreg_types::{
    Actor, Control, ControlId, ControlLink, ControlPlacement, LinkId, NewControl, ProcessId,
    RiskId, Row, RowId,
};
use serde::Serialize;
use tracing::info;

use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{EventBus, RegisterEvent};
use crate::regenerate::regenerate_rows;

/// Shown before editing a hub control's own fields when more than one row
/// would see the change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedEditWarning {
    pub link_count: usize,
}

pub struct ControlCatalog {
    store: Arc<dyn EntityStore>,
    bus: EventBus,
}

impl ControlCatalog {
    pub fn new(store: Arc<dyn EntityStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Create a control owned by `row_id`.
    pub async fn create_embedded(
        &self,
        actor: &Actor,
        row_id: &RowId,
        new: NewControl,
    ) -> WorkflowResult<Control> {
        ensure_manager(actor, "create controls")?;
        new.validate()?;
        if self.store.get_row(row_id).await?.is_none() {
            return Err(WorkflowError::not_found("row", row_id));
        }
        let control = new.into_control();
        self.store
            .insert_control(
                control.clone(),
                ControlPlacement::Embedded {
                    row_id: row_id.clone(),
                },
            )
            .await?;
        info!(control = %control.id, row = %row_id, actor = %actor, "Embedded control created");
        self.bus.publish(RegisterEvent::ControlChanged {
            control_id: control.id.clone(),
        });
        Ok(control)
    }

    /// Create a hub control, reachable by rows only through links.
    pub async fn create_hub(&self, actor: &Actor, new: NewControl) -> WorkflowResult<Control> {
        ensure_manager(actor, "create controls")?;
        new.validate()?;
        let control = new.into_control();
        self.store
            .insert_control(control.clone(), ControlPlacement::Hub)
            .await?;
        info!(control = %control.id, actor = %actor, "Hub control created");
        self.bus.publish(RegisterEvent::ControlChanged {
            control_id: control.id.clone(),
        });
        Ok(control)
    }

    /// Link an existing hub control to a row.
    pub async fn link_existing(
        &self,
        row_id: &RowId,
        control_id: &ControlId,
    ) -> WorkflowResult<ControlLink> {
        let located = self
            .store
            .get_control(control_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("control", control_id))?;
        if located.placement.is_embedded() {
            return Err(WorkflowError::NotHubControl(control_id.clone()));
        }
        if self.store.get_row(row_id).await?.is_none() {
            return Err(WorkflowError::not_found("row", row_id));
        }

        let link = ControlLink::new(row_id.clone(), control_id.clone());
        self.store.insert_link(link.clone()).await?;
        info!(link = %link.id, row = %row_id, control = %control_id, "Control linked");
        self.bus.publish(RegisterEvent::LinkChanged {
            row_id: row_id.clone(),
            control_id: control_id.clone(),
        });
        Ok(link)
    }

    pub async fn unlink(&self, link_id: &LinkId) -> WorkflowResult<ControlLink> {
        let link = self.store.delete_link(link_id).await?;
        info!(link = %link_id, row = %link.row_id, control = %link.control_id, "Control unlinked");
        self.bus.publish(RegisterEvent::LinkChanged {
            row_id: link.row_id.clone(),
            control_id: link.control_id.clone(),
        });
        Ok(link)
    }

    /// Number of rows `control_id` is linked to.
    pub async fn link_count(&self, control_id: &ControlId) -> WorkflowResult<usize> {
        Ok(self
            .store
            .list_links(&LinkFilter::control(control_id.clone()))
            .await?
            .len())
    }

    /// A warning when editing the control's own fields affects more than
    /// one row.
    pub async fn edit_warning(
        &self,
        control_id: &ControlId,
    ) -> WorkflowResult<Option<SharedEditWarning>> {
        let link_count = self.link_count(control_id).await?;
        Ok((link_count > 1).then_some(SharedEditWarning { link_count }))
    }

    /// Embedded controls of the row followed by linked hub controls, with
    /// link overrides already resolved.
    pub async fn effective_controls(&self, row_id: &RowId) -> WorkflowResult<Vec<EffectiveControl>> {
        let row = self
            .store
            .get_row(row_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("row", row_id))?;
        let links = self.store.list_links(&LinkFilter::all()).await?;
        let hub = self.store.list_hub_controls().await?;

        let mut counts: HashMap<&ControlId, usize> = HashMap::new();
        for link in &links {
            *counts.entry(&link.control_id).or_default() += 1;
        }
        let index = LinkIndex::build(&links, &hub);
        Ok(effective_controls(&row, &index, |id| {
            counts.get(id).copied().unwrap_or(0)
        }))
    }

    /// Insert or replace one row, embedded controls included.
    pub async fn put_row(&self, row: Row) -> WorkflowResult<()> {
        let row_id = row.id.clone();
        let controls = row.controls.len();
        self.store.put_row(row).await?;
        info!(row = %row_id, controls, "Row written");
        self.bus.publish(RegisterEvent::RowChanged { row_id });
        Ok(())
    }

    /// Rebuild the row set from taxonomy leaves, keeping rows for pairs
    /// that still exist. Links to dropped rows go with them.
    pub async fn regenerate(
        &self,
        risk_ids: &[RiskId],
        process_ids: &[ProcessId],
        default_appetite: u8,
    ) -> WorkflowResult<Vec<Row>> {
        let existing = self.store.list_rows(&RowFilter::all()).await?;
        let rows = regenerate_rows(risk_ids, process_ids, &existing, default_appetite);
        self.store.replace_rows(rows.clone()).await?;
        info!(
            before = existing.len(),
            after = rows.len(),
            "Register rows regenerated"
        );
        self.bus.publish(RegisterEvent::RowsChanged { count: rows.len() });
        Ok(rows)
    }
}

fn ensure_manager(actor: &Actor, action: &str) -> WorkflowResult<()> {
    if actor.role.is_manager() {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(format!("{actor} cannot {action}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskreg_scoring::ControlSource;
    use riskreg_storage::{InMemoryRegisterStore, StorageError};
    use riskreg_types::{ControlType, Role, Score};

    fn s(v: u8) -> Option<Score> {
        Some(Score::new(v).unwrap())
    }

    fn new_control(name: &str) -> NewControl {
        NewControl {
            name: name.into(),
            description: String::new(),
            control_type: ControlType::Preventive,
            net_probability: s(3),
            net_impact: s(3),
            assigned_tester_id: None,
            test_frequency: None,
        }
    }

    async fn catalog_with_rows() -> (ControlCatalog, Vec<Row>) {
        let store = Arc::new(InMemoryRegisterStore::new());
        let catalog = ControlCatalog::new(store, EventBus::default());
        let rows = catalog
            .regenerate(
                &[RiskId::new("r1"), RiskId::new("r2")],
                &[ProcessId::new("p1")],
                6,
            )
            .await
            .unwrap();
        (catalog, rows)
    }

    #[tokio::test]
    async fn only_managers_create_controls() {
        let (catalog, rows) = catalog_with_rows().await;
        let owner = Actor::new("user-2", Role::RiskOwner);

        let err = catalog
            .create_embedded(&owner, &rows[0].id, new_control("Dual sign-off"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let err = catalog.create_hub(&owner, new_control("Shared")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (catalog, _) = catalog_with_rows().await;
        let err = catalog
            .create_hub(&Actor::manager("user-1"), new_control("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Model(_)));
    }

    #[tokio::test]
    async fn row_write_is_announced() {
        let store = Arc::new(InMemoryRegisterStore::new());
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let catalog = ControlCatalog::new(store.clone(), bus.clone());
        let row = Row::new(RiskId::new("r1"), ProcessId::new("p1"), 6).with_gross(s(3), s(4));

        catalog.put_row(row.clone()).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            RegisterEvent::RowChanged {
                row_id: row.id.clone()
            }
        );
        let stored = store.get_row(&row.id).await.unwrap().unwrap();
        assert_eq!(stored.gross_impact, s(4));
    }

    #[tokio::test]
    async fn rejected_row_write_is_not_announced() {
        let (catalog, rows) = catalog_with_rows().await;
        let manager = Actor::manager("user-1");
        let embedded = catalog
            .create_embedded(&manager, &rows[0].id, new_control("Own"))
            .await
            .unwrap();
        let published = catalog.bus.published();

        let thief = rows[1].clone().with_control(embedded.clone());
        let err = catalog.put_row(thief).await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Storage(StorageError::ControlExists(ref id)) if *id == embedded.id
        ));
        assert_eq!(catalog.bus.published(), published);
    }

    #[tokio::test]
    async fn linking_rules() {
        let (catalog, rows) = catalog_with_rows().await;
        let manager = Actor::manager("user-1");
        let hub = catalog.create_hub(&manager, new_control("Shared")).await.unwrap();
        let embedded = catalog
            .create_embedded(&manager, &rows[0].id, new_control("Own"))
            .await
            .unwrap();

        catalog.link_existing(&rows[0].id, &hub.id).await.unwrap();
        let dup = catalog.link_existing(&rows[0].id, &hub.id).await.unwrap_err();
        assert!(matches!(dup, WorkflowError::Storage(StorageError::DuplicateLink { .. })));

        let err = catalog.link_existing(&rows[1].id, &embedded.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotHubControl(_)));
    }

    #[tokio::test]
    async fn shared_edit_warning_needs_two_links() {
        let (catalog, rows) = catalog_with_rows().await;
        let hub = catalog
            .create_hub(&Actor::manager("user-1"), new_control("Shared"))
            .await
            .unwrap();

        catalog.link_existing(&rows[0].id, &hub.id).await.unwrap();
        assert_eq!(catalog.edit_warning(&hub.id).await.unwrap(), None);

        let second = catalog.link_existing(&rows[1].id, &hub.id).await.unwrap();
        assert_eq!(
            catalog.edit_warning(&hub.id).await.unwrap(),
            Some(SharedEditWarning { link_count: 2 })
        );

        catalog.unlink(&second.id).await.unwrap();
        assert_eq!(catalog.link_count(&hub.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn effective_controls_resolve_links() {
        let (catalog, rows) = catalog_with_rows().await;
        let manager = Actor::manager("user-1");
        let own = catalog
            .create_embedded(&manager, &rows[0].id, new_control("Own"))
            .await
            .unwrap();
        let hub = catalog.create_hub(&manager, new_control("Shared")).await.unwrap();
        catalog.link_existing(&rows[0].id, &hub.id).await.unwrap();
        catalog.link_existing(&rows[1].id, &hub.id).await.unwrap();

        let controls = catalog.effective_controls(&rows[0].id).await.unwrap();

        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0].control_id, own.id);
        assert_eq!(controls[1].control_id, hub.id);
        assert!(matches!(
            controls[1].source,
            ControlSource::Linked { link_count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn regeneration_keeps_controls_and_drops_orphan_links() {
        let (catalog, rows) = catalog_with_rows().await;
        let manager = Actor::manager("user-1");
        catalog
            .create_embedded(&manager, &rows[0].id, new_control("Own"))
            .await
            .unwrap();
        let hub = catalog.create_hub(&manager, new_control("Shared")).await.unwrap();
        catalog.link_existing(&rows[1].id, &hub.id).await.unwrap();

        let regenerated = catalog
            .regenerate(&[RiskId::new("r1")], &[ProcessId::new("p1"), ProcessId::new("p2")], 6)
            .await
            .unwrap();

        assert_eq!(regenerated.len(), 2);
        assert_eq!(regenerated[0].id, rows[0].id);
        assert_eq!(regenerated[0].controls.len(), 1);
        assert_eq!(catalog.link_count(&hub.id).await.unwrap(), 0);
    }
}
