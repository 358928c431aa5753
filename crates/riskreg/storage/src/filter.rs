use riskreg_types::{
    ControlId, ControlLink, PendingChange, PendingStatus, ProcessId, RiskId, Row, RowId, UserId,
};

/// Generic query window for paged reads. `limit == 0` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub(crate) fn apply<T>(self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit).collect()
        }
    }
}

/// Row selection. Empty filter selects every row.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub risk_id: Option<RiskId>,
    pub process_id: Option<ProcessId>,
    pub row_ids: Option<Vec<RowId>>,
}

impl RowFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids(ids: Vec<RowId>) -> Self {
        Self {
            row_ids: Some(ids),
            ..Self::default()
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.risk_id.as_ref().map_or(true, |r| *r == row.risk_id)
            && self.process_id.as_ref().map_or(true, |p| *p == row.process_id)
            && self.row_ids.as_ref().map_or(true, |ids| ids.contains(&row.id))
    }
}

/// Link selection by row and/or control.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub row_id: Option<RowId>,
    pub control_id: Option<ControlId>,
}

impl LinkFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn row(row_id: RowId) -> Self {
        Self {
            row_id: Some(row_id),
            control_id: None,
        }
    }

    pub fn control(control_id: ControlId) -> Self {
        Self {
            row_id: None,
            control_id: Some(control_id),
        }
    }

    pub fn matches(&self, link: &ControlLink) -> bool {
        self.row_id.as_ref().map_or(true, |r| *r == link.row_id)
            && self.control_id.as_ref().map_or(true, |c| *c == link.control_id)
    }
}

/// Pending change selection.
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    pub status: Option<PendingStatus>,
    pub entity_id: Option<ControlId>,
    pub submitted_by: Option<UserId>,
}

impl PendingFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Only changes still awaiting review.
    pub fn open() -> Self {
        Self {
            status: Some(PendingStatus::Pending),
            ..Self::default()
        }
    }

    pub fn for_entity(mut self, entity_id: ControlId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn matches(&self, change: &PendingChange) -> bool {
        self.status.map_or(true, |s| s == change.status)
            && self.entity_id.as_ref().map_or(true, |e| *e == change.entity_id)
            && self
                .submitted_by
                .as_ref()
                .map_or(true, |u| *u == change.submitted_by.user_id)
    }
}
