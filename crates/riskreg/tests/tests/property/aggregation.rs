//! Property tests: net scores are the minimum over every effective control,
//! fall back to gross without controls, and are all-null when no control
//! carries a usable pair.

use proptest::prelude::*;
use riskreg_scoring::{aggregate, LinkIndex};
use riskreg_types::{Control, ControlLink, ControlType, ProcessId, RiskId, Row, Score, ScoreTriple};

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_score() -> impl Strategy<Value = Option<Score>> {
    prop_oneof![
        1 => Just(None),
        3 => (1u8..=5).prop_map(|v| Score::new(v).ok()),
    ]
}

fn arb_control() -> impl Strategy<Value = Control> {
    (arb_score(), arb_score())
        .prop_map(|(p, i)| Control::new("control", ControlType::Preventive).with_scores(p, i))
}

/// Hub control plus the override pair its link to the row carries.
fn arb_linked() -> impl Strategy<Value = (Control, Option<Score>, Option<Score>)> {
    (arb_control(), arb_score(), arb_score())
}

fn arb_row(embedded: Vec<Control>) -> impl Strategy<Value = Row> {
    (arb_score(), arb_score()).prop_map(move |(p, i)| {
        let mut row = Row::new(RiskId::new("risk"), ProcessId::new("proc"), 9).with_gross(p, i);
        row.controls = embedded.clone();
        row
    })
}

fn arb_case() -> impl Strategy<Value = (Row, Vec<(Control, Option<Score>, Option<Score>)>)> {
    (
        prop::collection::vec(arb_control(), 0..4),
        prop::collection::vec(arb_linked(), 0..4),
    )
        .prop_flat_map(|(embedded, linked)| (arb_row(embedded), Just(linked)))
}

fn links_for(row: &Row, linked: &[(Control, Option<Score>, Option<Score>)]) -> Vec<ControlLink> {
    linked
        .iter()
        .map(|(control, p, i)| {
            ControlLink::new(row.id.clone(), control.id.clone()).with_overrides(*p, *i)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn net_is_gross_without_controls(row in arb_row(Vec::new())) {
        let index = LinkIndex::build(&[], &[]);
        prop_assert_eq!(aggregate(&row, &index), row.gross());
    }

    #[test]
    fn net_is_min_over_effective_controls((row, linked) in arb_case()) {
        let links = links_for(&row, &linked);
        let hub: Vec<Control> = linked.iter().map(|(c, _, _)| c.clone()).collect();
        let index = LinkIndex::build(&links, &hub);

        let mut probabilities: Vec<Score> = row.controls.iter().filter_map(|c| c.net_probability).collect();
        let mut impacts: Vec<Score> = row.controls.iter().filter_map(|c| c.net_impact).collect();
        for (control, p, i) in &linked {
            probabilities.extend(p.or(control.net_probability));
            impacts.extend(i.or(control.net_impact));
        }

        let net = aggregate(&row, &index);
        if row.controls.is_empty() && linked.is_empty() {
            prop_assert_eq!(net, row.gross());
        } else if probabilities.is_empty() || impacts.is_empty() {
            prop_assert_eq!(net, ScoreTriple::unscored());
        } else {
            let p = probabilities.iter().copied().min();
            let i = impacts.iter().copied().min();
            prop_assert_eq!(net.probability, p);
            prop_assert_eq!(net.impact, i);
            prop_assert_eq!(net.score, Score::product(p, i));
        }
    }

    #[test]
    fn unscored_controls_never_fall_back_to_gross(
        count in 1usize..4,
        gp in 1u8..=5,
        gi in 1u8..=5,
    ) {
        let mut row = Row::new(RiskId::new("risk"), ProcessId::new("proc"), 9)
            .with_gross(Score::new(gp).ok(), Score::new(gi).ok());
        row.controls = (0..count)
            .map(|_| Control::new("unscored", ControlType::Detective))
            .collect();
        let index = LinkIndex::build(&[], &[]);

        let net = aggregate(&row, &index);
        prop_assert!(net.is_unscored());
        prop_assert_ne!(net, row.gross());
    }
}
