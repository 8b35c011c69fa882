//! Shared state of a paged, filterable view over one collection.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mongodb::bson::Document;
use parking_lot::{Mutex, MutexGuard};

use super::pagination::{PageRange, PageSize, clamp_page, compute_page_count};
use crate::connection::DocumentGateway;
use crate::state::events::ModelEvent;

pub type Listener = Arc<dyn Fn(&ModelEvent) + Send + Sync>;

/// Handle returned by [`QueryResultModel::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Paged, filterable view over a collection.
///
/// Cloning yields another handle to the same model. The state lock is never
/// held across a gateway call, so readers stay responsive while a fetch is in
/// flight. Every fetch and every criteria or page change takes a new request
/// id; a fetch that is no longer the latest request when it completes is
/// dropped without touching state or notifying listeners.
#[derive(Clone)]
pub struct QueryResultModel {
    pub(super) inner: Arc<ModelInner>,
}

pub(super) struct ModelInner {
    pub(super) state: Mutex<ModelState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

pub(super) struct ModelState {
    pub(super) gateway: Arc<dyn DocumentGateway>,
    pub(super) collection: String,
    pub(super) filter: Option<Document>,
    pub(super) projection: Option<Document>,
    pub(super) sort: Option<Document>,
    pub(super) page_size: PageSize,
    pub(super) current_page: u64,
    pub(super) total_count: u64,
    pub(super) documents: Arc<Vec<Document>>,
    pub(super) stale: bool,
    pub(super) request_id: u64,
}

impl ModelState {
    pub(super) fn page_count(&self) -> u64 {
        compute_page_count(self.total_count, self.page_size)
    }

    /// Mark the cached page out of date and supersede any fetch in flight.
    pub(super) fn invalidate(&mut self) {
        self.stale = true;
        self.request_id += 1;
    }

    pub(super) fn reclamp(&mut self) {
        self.current_page = clamp_page(self.current_page, self.page_count());
    }
}

/// Consistent copy of every reader at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct PageSnapshot {
    pub database: String,
    pub collection: String,
    pub filter: Option<Document>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub page_size: PageSize,
    pub current_page: u64,
    pub page_count: u64,
    pub total_count: u64,
    pub documents: Arc<Vec<Document>>,
    pub stale: bool,
}

impl PageSnapshot {
    pub fn page_range(&self) -> PageRange {
        PageRange::new(self.current_page, self.page_size, self.documents.len(), self.total_count)
    }
}

impl QueryResultModel {
    pub fn new(gateway: Arc<dyn DocumentGateway>, collection: impl Into<String>) -> Self {
        Self::with_page_size(gateway, collection, PageSize::default())
    }

    pub fn with_page_size(
        gateway: Arc<dyn DocumentGateway>,
        collection: impl Into<String>,
        page_size: PageSize,
    ) -> Self {
        let state = ModelState {
            gateway,
            collection: collection.into(),
            filter: None,
            projection: None,
            sort: None,
            page_size,
            current_page: 1,
            total_count: 0,
            documents: Arc::new(Vec::new()),
            stale: true,
            request_id: 0,
        };
        Self {
            inner: Arc::new(ModelInner {
                state: Mutex::new(state),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.inner.state.lock()
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Documents of the last applied fetch.
    pub fn current_page_documents(&self) -> Arc<Vec<Document>> {
        self.lock().documents.clone()
    }

    pub fn total_count(&self) -> u64 {
        self.lock().total_count
    }

    pub fn current_page(&self) -> u64 {
        self.lock().current_page
    }

    pub fn page_count(&self) -> u64 {
        self.lock().page_count()
    }

    pub fn page_size(&self) -> PageSize {
        self.lock().page_size
    }

    pub fn filter(&self) -> Option<Document> {
        self.lock().filter.clone()
    }

    pub fn projection(&self) -> Option<Document> {
        self.lock().projection.clone()
    }

    pub fn sort(&self) -> Option<Document> {
        self.lock().sort.clone()
    }

    pub fn collection(&self) -> String {
        self.lock().collection.clone()
    }

    pub fn gateway(&self) -> Arc<dyn DocumentGateway> {
        self.lock().gateway.clone()
    }

    /// True until a fetch is applied after the last criteria or page change.
    pub fn is_stale(&self) -> bool {
        self.lock().stale
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let state = self.lock();
        PageSnapshot {
            database: state.gateway.database().to_string(),
            collection: state.collection.clone(),
            filter: state.filter.clone(),
            projection: state.projection.clone(),
            sort: state.sort.clone(),
            page_size: state.page_size,
            current_page: state.current_page,
            page_count: state.page_count(),
            total_count: state.total_count,
            documents: state.documents.clone(),
            stale: state.stale,
        }
    }

    pub fn page_range(&self) -> PageRange {
        self.snapshot().page_range()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn subscribe(&self, listener: impl Fn(&ModelEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Deliver `event` with no model lock held, so listeners may read the model.
    pub(super) fn emit(&self, event: ModelEvent) {
        let listeners: Vec<Listener> =
            self.inner.listeners.lock().iter().map(|(_, listener)| listener.clone()).collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for QueryResultModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("QueryResultModel")
            .field("database", &state.gateway.database())
            .field("collection", &state.collection)
            .field("page_size", &state.page_size)
            .field("current_page", &state.current_page)
            .field("total_count", &state.total_count)
            .field("stale", &state.stale)
            .finish_non_exhaustive()
    }
}
