use std::collections::HashMap;

use riskreg_types::{Control, ControlId, ControlLink, RowId};

/// Per-batch lookup tables: links grouped by row, hub controls by id.
///
/// Built once before a scoring pass so each row reads its links without
/// rescanning the global link set.
#[derive(Debug, Default)]
pub struct LinkIndex<'a> {
    by_row: HashMap<&'a RowId, Vec<&'a ControlLink>>,
    hub: HashMap<&'a ControlId, &'a Control>,
}

impl<'a> LinkIndex<'a> {
    pub fn build(links: &'a [ControlLink], hub_controls: &'a [Control]) -> Self {
        let mut by_row: HashMap<&'a RowId, Vec<&'a ControlLink>> = HashMap::new();
        for link in links {
            by_row.entry(&link.row_id).or_default().push(link);
        }
        let hub = hub_controls.iter().map(|c| (&c.id, c)).collect();
        Self { by_row, hub }
    }

    /// Links whose `rowId` is `row_id`, in link-set order.
    pub fn links_for(&self, row_id: &RowId) -> &[&'a ControlLink] {
        self.by_row.get(row_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn link_count(&self, row_id: &RowId) -> usize {
        self.links_for(row_id).len()
    }

    /// The hub control a link points at, if it still exists.
    pub fn hub_control(&self, id: &ControlId) -> Option<&'a Control> {
        self.hub.get(id).copied()
    }
}
