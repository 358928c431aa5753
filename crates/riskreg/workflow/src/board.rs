//! Event-driven score recompute.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use riskreg_scoring::{LinkIndex, RowScore, ScoreCache};
use riskreg_storage::EntityStore;
use riskreg_types::RowId;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::error::WorkflowResult;
use crate::events::RegisterEvent;

#[derive(Default)]
struct BoardState {
    cache: ScoreCache,
    scores: Vec<RowScore>,
}

/// Net scores for every row, recomputed on demand.
///
/// Score-affecting events mark the board stale; the next [`scores`] call
/// reads a fresh snapshot and re-aggregates only the rows whose inputs
/// hash changed.
///
/// [`scores`]: ScoreBoard::scores
pub struct ScoreBoard {
    store: Arc<dyn EntityStore>,
    stale: AtomicBool,
    state: Mutex<BoardState>,
}

impl ScoreBoard {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            stale: AtomicBool::new(true),
            state: Mutex::new(BoardState::default()),
        }
    }

    pub fn observe(&self, event: &RegisterEvent) {
        if event.affects_scores() {
            self.stale.store(true, Ordering::Release);
        }
    }

    /// Force the next [`scores`] call to re-read the store.
    ///
    /// [`scores`]: ScoreBoard::scores
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub async fn scores(&self) -> WorkflowResult<Vec<RowScore>> {
        let mut state = self.state.lock().await;
        if self.stale.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.refresh(&mut state).await {
                self.stale.store(true, Ordering::Release);
                return Err(e);
            }
        }
        Ok(state.scores.clone())
    }

    pub async fn row_score(&self, row_id: &RowId) -> WorkflowResult<Option<RowScore>> {
        Ok(self
            .scores()
            .await?
            .into_iter()
            .find(|score| score.row_id == *row_id))
    }

    /// `(hits, misses)` of the underlying cache.
    pub async fn cache_stats(&self) -> (u64, u64) {
        self.state.lock().await.cache.stats()
    }

    /// Feed events from `receiver` into [`observe`] until the bus closes.
    /// A lagging receiver marks the board stale.
    ///
    /// [`observe`]: ScoreBoard::observe
    pub async fn follow(&self, mut receiver: broadcast::Receiver<RegisterEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.observe(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Score board lagged behind register events");
                    self.stale.store(true, Ordering::Release);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn refresh(&self, state: &mut BoardState) -> WorkflowResult<()> {
        let snapshot = self.store.snapshot().await?;
        let index = LinkIndex::build(&snapshot.links, &snapshot.hub_controls);
        state.scores = state.cache.score_all(&snapshot.rows, &index);
        debug!(rows = snapshot.rows.len(), links = snapshot.links.len(), "Scores refreshed");
        Ok(())
    }
}
