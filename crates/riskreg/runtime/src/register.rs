//! Composition root: one store, one bus, and the workflow components wired
//! around them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use riskreg_scoring::RowScore;
use riskreg_storage::{InMemoryRegisterStore, LocatedControl, RegisterStore, Snapshot};
use riskreg_types::{Actor, ControlId, ControlPlacement, Row, RowId};
use riskreg_workflow::{
    ConfiguredApprovalPolicy, ControlCatalog, EditSession, EventBus, MutationRouter,
    NotificationSink, PendingChangeQueue, RegisterEvent, ScoreBoard, TracingNotificationSink,
    WorkflowResult,
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{RegisterConfig, StorageConfig};
use crate::error::RuntimeResult;

/// A fully wired register.
///
/// Construct it inside a Tokio runtime: the score board follows the event
/// bus from a background task, which is aborted on drop.
pub struct RiskRegister {
    store: Arc<dyn RegisterStore>,
    bus: EventBus,
    router: Arc<MutationRouter>,
    queue: Arc<PendingChangeQueue>,
    catalog: ControlCatalog,
    board: Arc<ScoreBoard>,
    follower: JoinHandle<()>,
    /// `bus.published()` as of the last `scores()` call.
    seen_events: AtomicU64,
}

impl RiskRegister {
    /// Open the configured backend and wire everything to it.
    pub async fn from_config(config: &RegisterConfig) -> RuntimeResult<Self> {
        let store = open_store(&config.storage).await?;
        Ok(Self::with_store(store, config, Arc::new(TracingNotificationSink)))
    }

    /// In-memory register preloaded with `snapshot`.
    pub fn from_snapshot(snapshot: Snapshot, config: &RegisterConfig) -> Self {
        Self::with_store(
            Arc::new(InMemoryRegisterStore::from_snapshot(snapshot)),
            config,
            Arc::new(TracingNotificationSink),
        )
    }

    pub fn with_store(
        store: Arc<dyn RegisterStore>,
        config: &RegisterConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let bus = EventBus::new(config.workflow.event_capacity);
        let policy = Arc::new(ConfiguredApprovalPolicy::new(&config.approval));

        let router = Arc::new(MutationRouter::new(
            store.clone(),
            policy,
            sink.clone(),
            bus.clone(),
        ));
        let queue = Arc::new(
            PendingChangeQueue::new(store.clone(), sink, bus.clone())
                .with_baseline_validation(config.workflow.validate_baseline_on_approval),
        );
        let catalog = ControlCatalog::new(store.clone(), bus.clone());

        let board = Arc::new(ScoreBoard::new(store.clone()));
        let follower = {
            let board = board.clone();
            let receiver = bus.subscribe();
            tokio::spawn(async move { board.follow(receiver).await })
        };

        info!(
            approval = ?config.approval.mode,
            validate_baseline = config.workflow.validate_baseline_on_approval,
            "Risk register assembled"
        );

        Self {
            store,
            bus,
            router,
            queue,
            catalog,
            board,
            follower,
            seen_events: AtomicU64::new(0),
        }
    }

    /// Write rows, hub controls and links from `snapshot` into the store.
    pub async fn seed(&self, snapshot: Snapshot) -> RuntimeResult<()> {
        let (rows, hub, links) = (
            snapshot.rows.len(),
            snapshot.hub_controls.len(),
            snapshot.links.len(),
        );
        for row in snapshot.rows {
            self.store.put_row(row).await?;
        }
        for control in snapshot.hub_controls {
            self.store
                .insert_control(control, ControlPlacement::Hub)
                .await?;
        }
        for link in snapshot.links {
            self.store.insert_link(link).await?;
        }
        info!(rows, hub_controls = hub, links, "Register seeded");
        self.bus.publish(RegisterEvent::RowsChanged { count: rows });
        Ok(())
    }

    pub async fn open_session(&self, control_id: &ControlId, actor: Actor) -> WorkflowResult<EditSession> {
        EditSession::open(
            self.store.as_ref(),
            self.router.clone(),
            self.queue.clone(),
            control_id,
            actor,
        )
        .await
    }

    /// Current scores. Events published since the previous call force a
    /// refresh even when the follower task has not seen them yet.
    pub async fn scores(&self) -> WorkflowResult<Vec<RowScore>> {
        let published = self.bus.published();
        if self.seen_events.swap(published, Ordering::AcqRel) != published {
            self.board.invalidate();
        }
        self.board.scores().await
    }

    pub async fn row(&self, id: &RowId) -> WorkflowResult<Option<Row>> {
        Ok(self.store.get_row(id).await?)
    }

    /// A control wherever it lives, as currently stored.
    pub async fn control(&self, id: &ControlId) -> WorkflowResult<Option<LocatedControl>> {
        Ok(self.store.get_control(id).await?)
    }

    pub async fn snapshot(&self) -> WorkflowResult<Snapshot> {
        Ok(self.store.snapshot().await?)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn router(&self) -> &Arc<MutationRouter> {
        &self.router
    }

    pub fn queue(&self) -> &Arc<PendingChangeQueue> {
        &self.queue
    }

    pub fn catalog(&self) -> &ControlCatalog {
        &self.catalog
    }

    pub fn board(&self) -> &Arc<ScoreBoard> {
        &self.board
    }
}

impl Drop for RiskRegister {
    fn drop(&mut self) {
        self.follower.abort();
    }
}

async fn open_store(config: &StorageConfig) -> RuntimeResult<Arc<dyn RegisterStore>> {
    match config {
        StorageConfig::Memory => {
            info!("Using in-memory storage");
            Ok(Arc::new(InMemoryRegisterStore::new()))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            info!(max_connections, "Using PostgreSQL storage");
            let store = riskreg_storage::postgres::PostgresRegisterStore::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(crate::error::RuntimeError::Config(
            "postgres storage requires the `postgres` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskreg_types::{Control, ControlField, ControlLink, ControlType, ProcessId, RiskId, Row, Score};
    use riskreg_workflow::{ApprovalMode, CloseDisposition, DraftAccumulator, FieldTarget};

    fn s(v: u8) -> Option<Score> {
        Some(Score::new(v).unwrap())
    }

    fn snapshot() -> (Snapshot, Control) {
        let hub = Control::new("Shared reconciliation", ControlType::Detective).with_scores(s(2), s(3));
        let row = Row::new(RiskId::new("risk-1"), ProcessId::new("proc-1"), 6).with_gross(s(4), s(5));
        let link = ControlLink::new(row.id.clone(), hub.id.clone());
        (
            Snapshot {
                rows: vec![row],
                hub_controls: vec![hub.clone()],
                links: vec![link],
            },
            hub,
        )
    }

    #[tokio::test]
    async fn seeded_memory_register_scores_links() {
        let register = RiskRegister::from_config(&RegisterConfig::default()).await.unwrap();
        let (snapshot, _) = snapshot();
        register.seed(snapshot).await.unwrap();

        let scores = register.scores().await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].net.score, Some(6));
        assert_eq!(scores[0].link_count, 1);
    }

    #[tokio::test]
    async fn gated_edit_reaches_the_queue() {
        let mut config = RegisterConfig::default();
        config.approval.mode = ApprovalMode::AllControls;
        let (snapshot, hub) = snapshot();
        let register = RiskRegister::from_snapshot(snapshot, &config);

        let mut drafts = DraftAccumulator::new();
        let mut session = register
            .open_session(&hub.id, Actor::new("user-2", riskreg_types::Role::RiskOwner))
            .await
            .unwrap();
        assert!(session.is_gated());

        session
            .focus(&mut drafts, FieldTarget::Control(ControlField::NetImpact))
            .await
            .unwrap();
        session.input("1");
        session.close(&mut drafts, CloseDisposition::Submit).await.unwrap();

        assert!(register.queue().has_pending(&hub.id).await.unwrap());
        assert_eq!(register.scores().await.unwrap()[0].net.score, Some(6));
    }

    #[tokio::test]
    async fn row_write_refreshes_scores() {
        let (snapshot, _) = snapshot();
        let row = snapshot.rows[0].clone();
        let register = RiskRegister::from_snapshot(snapshot, &RegisterConfig::default());
        assert_eq!(register.scores().await.unwrap()[0].gross.score, Some(20));

        let own = Control::new("Maker-checker", ControlType::Preventive).with_scores(s(1), s(2));
        register
            .catalog()
            .put_row(row.with_gross(s(2), s(2)).with_control(own))
            .await
            .unwrap();

        let scores = register.scores().await.unwrap();
        assert_eq!(scores[0].gross.score, Some(4));
        assert_eq!(scores[0].net.score, Some(2));
        assert_eq!(scores[0].embedded_count, 1);
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn postgres_without_feature_is_a_config_error() {
        let config: RegisterConfig = serde_json::from_str(
            r#"{"storage": {"type": "postgres", "url": "postgres://localhost/riskreg"}}"#,
        )
        .unwrap();
        let err = RiskRegister::from_config(&config).await.err().unwrap();
        assert!(matches!(err, crate::error::RuntimeError::Config(_)));
    }
}
