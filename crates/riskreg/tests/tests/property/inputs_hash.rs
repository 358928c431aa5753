//! Property tests: the recompute cache key tracks exactly the aggregation
//! inputs.

use proptest::prelude::*;
use riskreg_scoring::{inputs_hash, LinkIndex};
use riskreg_types::{Control, ControlType, ProcessId, RiskId, Row, Score};

proptest! {
    #[test]
    fn hash_follows_control_scores(p in 1u8..=5, i in 1u8..=5, bumped in 1u8..=5) {
        let control = Control::new("Own", ControlType::Preventive)
            .with_scores(Score::new(p).ok(), Score::new(i).ok());
        let row = Row::new(RiskId::new("risk"), ProcessId::new("proc"), 9).with_control(control);
        let index = LinkIndex::build(&[], &[]);

        let mut renamed = row.clone();
        renamed.controls[0].name = "Renamed".into();
        prop_assert_eq!(inputs_hash(&row, &index), inputs_hash(&renamed, &index));

        let mut rescored = row.clone();
        rescored.controls[0].net_probability = Score::new(bumped).ok();
        if bumped == p {
            prop_assert_eq!(inputs_hash(&row, &index), inputs_hash(&rescored, &index));
        } else {
            prop_assert_ne!(inputs_hash(&row, &index), inputs_hash(&rescored, &index));
        }
    }
}
