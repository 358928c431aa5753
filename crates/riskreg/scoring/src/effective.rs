use riskreg_types::{ControlId, LinkId, Row, Score, ScoreTriple};
use serde::Serialize;

use crate::index::LinkIndex;

/// How a control reaches a row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ControlSource {
    Embedded,
    Linked {
        link_id: LinkId,
        /// Whether the link overrides at least one of the control's scores.
        overridden: bool,
        /// Number of rows the hub control is linked to.
        link_count: usize,
    },
}

/// A control as it applies to one row.
///
/// For linked controls the probability and impact are already resolved
/// through the link: override first, the control's own value second.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveControl {
    pub control_id: ControlId,
    /// `None` when the link points at a control that no longer exists.
    pub name: Option<String>,
    pub source: ControlSource,
    pub probability: Option<Score>,
    pub impact: Option<Score>,
}

impl EffectiveControl {
    pub fn net(&self) -> ScoreTriple {
        ScoreTriple::from_pair(self.probability, self.impact)
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.source, ControlSource::Linked { .. })
    }
}

/// Embedded controls followed by linked hub controls for `row`.
///
/// `link_counts` reports, per hub control, how many rows link to it; it
/// feeds the shared-edit warning and may be `|_| 0` when not needed.
pub fn effective_controls(
    row: &Row,
    index: &LinkIndex<'_>,
    link_counts: impl Fn(&ControlId) -> usize,
) -> Vec<EffectiveControl> {
    let embedded = row.controls.iter().map(|control| EffectiveControl {
        control_id: control.id.clone(),
        name: Some(control.name.clone()),
        source: ControlSource::Embedded,
        probability: control.net_probability,
        impact: control.net_impact,
    });

    let linked = index.links_for(&row.id).iter().map(|link| {
        let control = index.hub_control(&link.control_id);
        EffectiveControl {
            control_id: link.control_id.clone(),
            name: control.map(|c| c.name.clone()),
            source: ControlSource::Linked {
                link_id: link.id.clone(),
                overridden: link.has_override(),
                link_count: link_counts(&link.control_id),
            },
            probability: link.resolve_probability(control),
            impact: link.resolve_impact(control),
        }
    });

    embedded.chain(linked).collect()
}
