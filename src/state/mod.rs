// Application state management

pub mod config;
pub mod events;
pub mod query_model;
pub mod settings;

pub use config::ConfigManager;
pub use events::ModelEvent;
pub use query_model::{
    ListenerId, PageRange, PageSize, PageSnapshot, QueryResultModel, RefreshOutcome, clamp_page,
    compute_page_count,
};
pub use settings::{Settings, expand_filename_template};
