//! Property tests: a link override on one row never leaks into another row
//! linked to the same hub control.

use proptest::prelude::*;
use riskreg_scoring::{aggregate, LinkIndex};
use riskreg_types::{Control, ControlLink, ControlType, ProcessId, RiskId, Row, Score, ScoreTriple};

fn arb_pair() -> impl Strategy<Value = (Option<Score>, Option<Score>)> {
    ((1u8..=5), (1u8..=5)).prop_map(|(p, i)| (Score::new(p).ok(), Score::new(i).ok()))
}

proptest! {
    #[test]
    fn override_changes_only_its_own_row(
        own in arb_pair(),
        override_pair in arb_pair(),
    ) {
        let hub = Control::new("Shared", ControlType::Detective).with_scores(own.0, own.1);
        let row_a = Row::new(RiskId::new("risk-a"), ProcessId::new("proc"), 9);
        let row_b = Row::new(RiskId::new("risk-b"), ProcessId::new("proc"), 9);
        let hubs = [hub.clone()];

        let plain = [
            ControlLink::new(row_a.id.clone(), hub.id.clone()),
            ControlLink::new(row_b.id.clone(), hub.id.clone()),
        ];
        let mut overridden = plain.clone();
        overridden[0] = overridden[0].clone().with_overrides(override_pair.0, override_pair.1);

        let before = LinkIndex::build(&plain, &hubs);
        let after = LinkIndex::build(&overridden, &hubs);

        prop_assert_eq!(aggregate(&row_b, &after), aggregate(&row_b, &before));
        prop_assert_eq!(aggregate(&row_b, &after), ScoreTriple::from_pair(own.0, own.1));
        prop_assert_eq!(
            aggregate(&row_a, &after),
            ScoreTriple::from_pair(override_pair.0, override_pair.1)
        );
    }
}
