use riskreg_types::{Control, ControlLink, Row, RowId, Score, ScoreTriple};
use serde::Serialize;

use crate::index::LinkIndex;

/// Net triple for one row.
///
/// - no embedded controls and no links: net equals gross
/// - at least one scored probability and one scored impact: the minimum of
///   each, multiplied
/// - controls present but nothing scored: the all-null triple
///
/// Linked values resolve override first, then the hub control's own value.
pub fn aggregate(row: &Row, index: &LinkIndex<'_>) -> ScoreTriple {
    let links = index.links_for(&row.id);
    if row.controls.is_empty() && links.is_empty() {
        return row.gross();
    }

    let mut probability: Option<Score> = None;
    let mut impact: Option<Score> = None;
    let mut take = |p: Option<Score>, i: Option<Score>| {
        probability = min_present(probability, p);
        impact = min_present(impact, i);
    };

    for control in &row.controls {
        take(control.net_probability, control.net_impact);
    }
    for link in links {
        let control = index.hub_control(&link.control_id);
        take(link.resolve_probability(control), link.resolve_impact(control));
    }

    match (probability, impact) {
        (Some(_), Some(_)) => ScoreTriple::from_pair(probability, impact),
        _ => ScoreTriple::unscored(),
    }
}

fn min_present(acc: Option<Score>, next: Option<Score>) -> Option<Score> {
    match (acc, next) {
        (Some(a), Some(n)) => Some(a.min(n)),
        (a, n) => a.or(n),
    }
}

/// Where a row's net score sits against its appetite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppetiteStatus {
    WithinAppetite,
    ExceedsAppetite,
    Unscored,
}

/// Aggregation result for one row.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowScore {
    pub row_id: RowId,
    pub gross: ScoreTriple,
    pub net: ScoreTriple,
    pub risk_appetite: u8,
    pub embedded_count: usize,
    pub link_count: usize,
}

impl RowScore {
    pub fn compute(row: &Row, index: &LinkIndex<'_>) -> Self {
        Self {
            row_id: row.id.clone(),
            gross: row.gross(),
            net: aggregate(row, index),
            risk_appetite: row.risk_appetite,
            embedded_count: row.controls.len(),
            link_count: index.link_count(&row.id),
        }
    }

    pub fn has_controls(&self) -> bool {
        self.embedded_count > 0 || self.link_count > 0
    }

    pub fn appetite_status(&self) -> AppetiteStatus {
        match self.net.score {
            None => AppetiteStatus::Unscored,
            Some(score) if score > self.risk_appetite => AppetiteStatus::ExceedsAppetite,
            Some(_) => AppetiteStatus::WithinAppetite,
        }
    }
}

/// Score every row in one pass, building the link index once.
pub fn score_rows(rows: &[Row], links: &[ControlLink], hub_controls: &[Control]) -> Vec<RowScore> {
    let index = LinkIndex::build(links, hub_controls);
    rows.iter().map(|row| RowScore::compute(row, &index)).collect()
}
