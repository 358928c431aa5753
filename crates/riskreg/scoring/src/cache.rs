use std::collections::{HashMap, HashSet};

use riskreg_types::{Row, RowId, Score};
use tracing::trace;

use crate::aggregate::RowScore;
use crate::index::LinkIndex;

/// Digest of everything `aggregate` reads for one row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputsHash(pub [u8; 32]);

impl std::fmt::Display for InputsHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Hash the aggregation inputs of `row`: appetite, gross pair, embedded
/// control pairs and the override-resolved pair of each link.
pub fn inputs_hash(row: &Row, index: &LinkIndex<'_>) -> InputsHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"riskreg-score-inputs-v1:");
    hasher.update(&[row.risk_appetite]);
    hash_pair(&mut hasher, row.gross_probability, row.gross_impact);

    hasher.update(&(row.controls.len() as u64).to_le_bytes());
    for control in &row.controls {
        hash_pair(&mut hasher, control.net_probability, control.net_impact);
    }

    let links = index.links_for(&row.id);
    hasher.update(&(links.len() as u64).to_le_bytes());
    for link in links {
        let control = index.hub_control(&link.control_id);
        hash_pair(
            &mut hasher,
            link.resolve_probability(control),
            link.resolve_impact(control),
        );
    }

    InputsHash(*hasher.finalize().as_bytes())
}

fn hash_pair(hasher: &mut blake3::Hasher, probability: Option<Score>, impact: Option<Score>) {
    // 0 never occurs as a score, so it stands for null.
    hasher.update(&[
        probability.map_or(0, Score::value),
        impact.map_or(0, Score::value),
    ]);
}

/// Pull-based recompute cache keyed by `(rowId, inputs-hash)`.
///
/// A row is re-aggregated only when its inputs hash changes; the cache
/// holds no reference to the store and is safe to drop at any time.
#[derive(Debug, Default)]
pub struct ScoreCache {
    entries: HashMap<RowId, (InputsHash, RowScore)>,
    hits: u64,
    misses: u64,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&mut self, row: &Row, index: &LinkIndex<'_>) -> RowScore {
        let hash = inputs_hash(row, index);
        if let Some((cached, score)) = self.entries.get(&row.id) {
            if *cached == hash {
                self.hits += 1;
                return score.clone();
            }
        }
        self.misses += 1;
        trace!(row = %row.id, inputs = %hash, "Recomputing row score");
        let score = RowScore::compute(row, index);
        self.entries.insert(row.id.clone(), (hash, score.clone()));
        score
    }

    /// Score `rows` in order and evict entries for rows not in the batch.
    pub fn score_all(&mut self, rows: &[Row], index: &LinkIndex<'_>) -> Vec<RowScore> {
        let live: HashSet<&RowId> = rows.iter().map(|r| &r.id).collect();
        self.entries.retain(|id, _| live.contains(id));
        rows.iter().map(|row| self.score(row, index)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
