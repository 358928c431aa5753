//! Property tests: a draft keeps one value per field, the last one typed.

use std::collections::HashMap;

use proptest::prelude::*;
use riskreg_types::{ControlEdit, ControlField, ControlId};
use riskreg_workflow::{DraftAccumulator, FieldEdit};

fn arb_edit() -> impl Strategy<Value = ControlEdit> {
    prop_oneof![
        "[A-Za-z ]{1,12}".prop_map(ControlEdit::Name),
        "[a-z ]{0,20}".prop_map(ControlEdit::Comment),
        "[a-z ]{0,20}".prop_map(ControlEdit::TestProcedure),
    ]
}

proptest! {
    #[test]
    fn last_edit_per_field_wins(edits in prop::collection::vec(arb_edit(), 1..20)) {
        let control_id = ControlId::new("control-1");
        let mut drafts = DraftAccumulator::new();
        let mut expected: HashMap<ControlField, ControlEdit> = HashMap::new();

        for edit in &edits {
            drafts
                .record(&control_id, FieldEdit::Control(edit.clone()))
                .unwrap();
            expected.insert(edit.field(), edit.clone());
        }

        let draft = drafts.get(&control_id).unwrap();
        prop_assert_eq!(draft.len(), expected.len());
        for recorded in draft.control_edits() {
            prop_assert_eq!(Some(recorded), expected.get(&recorded.field()));
            prop_assert!(drafts.is_control_field_unsaved(&control_id, recorded.field()));
        }

        prop_assert!(drafts.discard(&control_id));
        prop_assert!(!drafts.has_unsaved(&control_id));
    }
}
