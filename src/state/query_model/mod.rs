mod model;
mod pagination;
mod query_ops;
mod refresh;

pub use model::{Listener, ListenerId, PageSnapshot, QueryResultModel};
pub use pagination::{DEFAULT_PAGE_SIZE, PageRange, PageSize, clamp_page, compute_page_count};
pub use refresh::RefreshOutcome;
