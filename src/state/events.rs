//! Events emitted by the query result model

/// Published once per fetch that completes without being superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// A fetch was applied; readers now reflect the new page.
    DataChanged { total: u64, page: u64, page_count: u64 },
    /// A fetch failed; the previous page is still shown.
    Failed { message: String },
}

impl ModelEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self, ModelEvent::Failed { .. })
    }
}
