//! Fetching pages from the gateway and publishing them.

use std::sync::Arc;

use mongodb::bson::Document;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::model::QueryResultModel;
use super::pagination::{PageSize, clamp_page, compute_page_count};
use crate::connection::{DocumentGateway, FindDocumentsOptions};
use crate::error::Result;
use crate::state::events::ModelEvent;

/// What became of a completed fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetch was the latest request and its page is now visible.
    Applied,
    /// A newer request started before this one finished; nothing changed.
    Superseded,
}

/// Everything a fetch needs, captured under the lock.
struct FetchRequest {
    id: u64,
    gateway: Arc<dyn DocumentGateway>,
    collection: String,
    filter: Option<Document>,
    projection: Option<Document>,
    sort: Option<Document>,
    page_size: PageSize,
    page: u64,
    /// Gateway and collection differ from the bound ones and are committed with the page.
    rebinding: bool,
}

struct FetchedPage {
    total: u64,
    page: u64,
    documents: Vec<Document>,
}

impl FetchRequest {
    fn run(&self) -> Result<FetchedPage> {
        let total = self.gateway.count(&self.collection, self.filter.as_ref())?;
        let page = clamp_page(self.page, compute_page_count(total, self.page_size));
        if page != self.page {
            log::debug!(
                "Result count for {} shrank to {}, moving from page {} to {}",
                self.collection,
                total,
                self.page,
                page
            );
        }

        let documents = if total == 0 {
            Vec::new()
        } else {
            self.gateway.find(
                &self.collection,
                FindDocumentsOptions {
                    filter: self.filter.clone(),
                    sort: self.sort.clone(),
                    projection: self.projection.clone(),
                    skip: self.page_size.skip(page),
                    limit: self.page_size.limit(),
                },
            )?
        };

        Ok(FetchedPage { total, page, documents })
    }
}

impl QueryResultModel {
    /// Count and fetch the current page, then publish it.
    ///
    /// On failure the previously visible page stays untouched and listeners
    /// get a single `Failed` event. A fetch overtaken by a newer request
    /// returns [`RefreshOutcome::Superseded`] whether it succeeded or not.
    pub fn refresh(&self) -> Result<RefreshOutcome> {
        let request = self.begin_request();
        self.complete(request)
    }

    fn complete(&self, request: FetchRequest) -> Result<RefreshOutcome> {
        let result = request.run();

        let event = {
            let mut state = self.lock();
            if state.request_id != request.id {
                log::debug!(
                    "Discarding superseded fetch {} for {} (latest is {})",
                    request.id,
                    request.collection,
                    state.request_id
                );
                return Ok(RefreshOutcome::Superseded);
            }

            match result {
                Ok(fetched) => {
                    if request.rebinding {
                        state.gateway = request.gateway.clone();
                        state.collection = request.collection.clone();
                    }
                    state.total_count = fetched.total;
                    state.current_page = fetched.page;
                    state.documents = Arc::new(fetched.documents);
                    state.stale = false;
                    Ok(ModelEvent::DataChanged {
                        total: fetched.total,
                        page: fetched.page,
                        page_count: state.page_count(),
                    })
                }
                Err(err) => Err(err),
            }
        };

        match event {
            Ok(event) => {
                self.emit(event);
                Ok(RefreshOutcome::Applied)
            }
            Err(err) => {
                log::error!("Failed to load documents from {}: {}", request.collection, err);
                self.emit(ModelEvent::Failed { message: err.to_string() });
                Err(err)
            }
        }
    }

    fn begin_request(&self) -> FetchRequest {
        let mut state = self.lock();
        state.request_id += 1;
        FetchRequest {
            id: state.request_id,
            gateway: state.gateway.clone(),
            collection: state.collection.clone(),
            filter: state.filter.clone(),
            projection: state.projection.clone(),
            sort: state.sort.clone(),
            page_size: state.page_size,
            page: state.current_page,
            rebinding: false,
        }
    }

    /// Fetch `page` directly, clamping it against the count taken by this fetch
    /// rather than the cached one. Lets a caller open a result on any page with
    /// a single count and find.
    pub fn fetch_page(&self, page: i64) -> Result<RefreshOutcome> {
        let mut request = self.begin_request();
        request.page = page.max(1) as u64;
        self.complete(request)
    }

    /// Run [`refresh`](Self::refresh) on a blocking worker of `handle`.
    pub fn spawn_refresh(&self, handle: &Handle) -> JoinHandle<Result<RefreshOutcome>> {
        let model = self.clone();
        handle.spawn_blocking(move || model.refresh())
    }

    /// Point the model at another collection, keeping its criteria and page size.
    ///
    /// The new binding starts on page 1 and only replaces the old one once its
    /// first page is fetched; a failed rebind keeps the previous collection and page.
    pub fn rebind(
        &self,
        gateway: Arc<dyn DocumentGateway>,
        collection: impl Into<String>,
    ) -> Result<RefreshOutcome> {
        let request = {
            let mut state = self.lock();
            state.request_id += 1;
            FetchRequest {
                id: state.request_id,
                gateway,
                collection: collection.into(),
                filter: state.filter.clone(),
                projection: state.projection.clone(),
                sort: state.sort.clone(),
                page_size: state.page_size,
                page: 1,
                rebinding: true,
            }
        };
        self.complete(request)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// `None` when already on the first page.
    pub fn first_page(&self) -> Result<Option<RefreshOutcome>> {
        self.navigate(|_, _| 1)
    }

    /// `None` when already on the last known page.
    pub fn last_page(&self) -> Result<Option<RefreshOutcome>> {
        self.navigate(|_, page_count| page_count)
    }

    pub fn next_page(&self) -> Result<Option<RefreshOutcome>> {
        self.navigate(|page, _| page.saturating_add(1))
    }

    pub fn previous_page(&self) -> Result<Option<RefreshOutcome>> {
        self.navigate(|page, _| page.saturating_sub(1))
    }

    fn navigate(&self, target: impl FnOnce(u64, u64) -> u64) -> Result<Option<RefreshOutcome>> {
        {
            let mut state = self.lock();
            let page_count = state.page_count();
            let page = clamp_page(target(state.current_page, page_count), page_count);
            if page == state.current_page {
                return Ok(None);
            }
            state.current_page = page;
            state.invalidate();
        }
        self.refresh().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;

    use mongodb::bson::{Document, doc};
    use parking_lot::Mutex;

    use super::RefreshOutcome;
    use crate::connection::{DocumentGateway, FindDocumentsOptions, MemoryGateway};
    use crate::error::Error;
    use crate::state::events::ModelEvent;
    use crate::state::query_model::{PageSize, QueryResultModel};

    fn numbered(count: i32) -> Vec<Document> {
        (1..=count).map(|n| doc! { "n": n, "even": n % 2 == 0 }).collect()
    }

    fn seeded(count: i32) -> (Arc<MemoryGateway>, QueryResultModel) {
        let gateway = Arc::new(MemoryGateway::new("shop").with_documents("orders", numbered(count)));
        let model = QueryResultModel::new(gateway.clone(), "orders");
        model.set_sort(Some(doc! { "n": 1 }));
        (gateway, model)
    }

    fn page_numbers(model: &QueryResultModel) -> Vec<i32> {
        model.current_page_documents().iter().filter_map(|doc| doc.get_i32("n").ok()).collect()
    }

    fn record_events(model: &QueryResultModel) -> Arc<Mutex<Vec<ModelEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        model.subscribe(move |event| sink.lock().push(event.clone()));
        events
    }

    #[test]
    fn refresh_loads_first_page() {
        let (_, model) = seeded(25);
        assert!(model.is_stale());

        assert_eq!(model.refresh().unwrap(), RefreshOutcome::Applied);
        assert_eq!(model.total_count(), 25);
        assert_eq!(model.page_count(), 3);
        assert_eq!(model.current_page(), 1);
        assert_eq!(page_numbers(&model), (1..=10).collect::<Vec<_>>());
        assert!(!model.is_stale());
    }

    #[test]
    fn refresh_applies_filter_and_projection() {
        let (_, model) = seeded(25);
        model.set_query(
            Some(doc! { "even": true }),
            Some(doc! { "n": 1, "_id": 0 }),
            Some(doc! { "n": -1 }),
        );
        model.refresh().unwrap();

        assert_eq!(model.total_count(), 12);
        assert_eq!(page_numbers(&model), vec![24, 22, 20, 18, 16, 14, 12, 10, 8, 6]);
        assert!(model.current_page_documents().iter().all(|doc| doc.keys().eq(["n"])));
    }

    #[test]
    fn empty_result_is_one_page_without_find() {
        let (gateway, model) = seeded(5);
        model.set_filter(Some(doc! { "n": { "$gt": 100 } }));
        model.refresh().unwrap();

        assert_eq!(model.total_count(), 0);
        assert_eq!(model.page_count(), 1);
        assert_eq!(model.current_page(), 1);
        assert!(model.current_page_documents().is_empty());
        assert_eq!(gateway.find_calls(), 0);
    }

    #[test]
    fn unpaged_returns_everything() {
        let (_, model) = seeded(37);
        model.set_unpaged();
        model.refresh().unwrap();

        assert_eq!(model.page_count(), 1);
        assert_eq!(model.current_page_documents().len(), 37);
    }

    #[test]
    fn shrinking_total_clamps_page_before_publishing() {
        let (gateway, model) = seeded(30);
        model.refresh().unwrap();
        model.set_page(3);
        model.refresh().unwrap();
        assert_eq!(page_numbers(&model), (21..=30).collect::<Vec<_>>());

        for doc in gateway.documents("orders").iter().filter(|doc| doc.get_i32("n").unwrap() > 12) {
            gateway.remove("orders", doc).unwrap();
        }

        let events = record_events(&model);
        model.refresh().unwrap();
        assert_eq!(model.total_count(), 12);
        assert_eq!(model.current_page(), 2);
        assert_eq!(page_numbers(&model), vec![11, 12]);
        assert_eq!(
            *events.lock(),
            vec![ModelEvent::DataChanged { total: 12, page: 2, page_count: 2 }]
        );
    }

    #[test]
    fn failed_refresh_leaves_state_identical() {
        let (gateway, model) = seeded(25);
        model.refresh().unwrap();
        model.set_page(2);
        model.refresh().unwrap();
        let before = model.snapshot();

        let events = record_events(&model);
        gateway.fail_with("connection reset by peer");
        let err = model.refresh().unwrap_err();
        assert!(err.is_gateway());
        assert!(err.to_string().contains("connection reset by peer"));

        let after = model.snapshot();
        assert_eq!(after.total_count, before.total_count);
        assert_eq!(after.current_page, before.current_page);
        assert_eq!(after.page_count, before.page_count);
        assert_eq!(after.documents, before.documents);
        assert_eq!(after.filter, before.filter);
        assert_eq!(after.stale, before.stale);
        assert_eq!(
            *events.lock(),
            vec![ModelEvent::Failed { message: err.to_string() }]
        );
    }

    #[test]
    fn listeners_receive_one_event_per_fetch() {
        let (_, model) = seeded(15);
        let events = record_events(&model);
        let quiet = Arc::new(Mutex::new(0));
        let counter = quiet.clone();
        let id = model.subscribe(move |_| *counter.lock() += 1);

        model.refresh().unwrap();
        assert!(model.unsubscribe(id));
        assert!(!model.unsubscribe(id));
        model.next_page().unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                ModelEvent::DataChanged { total: 15, page: 1, page_count: 2 },
                ModelEvent::DataChanged { total: 15, page: 2, page_count: 2 },
            ]
        );
        assert_eq!(*quiet.lock(), 1);
    }

    #[test]
    fn navigation_is_a_no_op_at_the_edges() {
        let (gateway, model) = seeded(25);
        model.refresh().unwrap();
        let finds = gateway.find_calls();

        assert_eq!(model.first_page().unwrap(), None);
        assert_eq!(model.previous_page().unwrap(), None);
        assert_eq!(gateway.find_calls(), finds);

        assert_eq!(model.last_page().unwrap(), Some(RefreshOutcome::Applied));
        assert_eq!(model.current_page(), 3);
        assert_eq!(page_numbers(&model), (21..=25).collect::<Vec<_>>());

        let finds = gateway.find_calls();
        assert_eq!(model.next_page().unwrap(), None);
        assert_eq!(model.last_page().unwrap(), None);
        assert_eq!(gateway.find_calls(), finds);

        assert_eq!(model.previous_page().unwrap(), Some(RefreshOutcome::Applied));
        assert_eq!(model.current_page(), 2);
        assert_eq!(model.first_page().unwrap(), Some(RefreshOutcome::Applied));
        assert_eq!(page_numbers(&model), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn fetch_page_clamps_against_fresh_count() {
        let (gateway, model) = seeded(25);

        assert_eq!(model.fetch_page(3).unwrap(), RefreshOutcome::Applied);
        assert_eq!(model.current_page(), 3);
        assert_eq!(page_numbers(&model), (21..=25).collect::<Vec<_>>());
        assert_eq!((gateway.count_calls(), gateway.find_calls()), (1, 1));

        model.fetch_page(99).unwrap();
        assert_eq!(model.current_page(), 3);
        model.fetch_page(-4).unwrap();
        assert_eq!(model.current_page(), 1);
        assert_eq!(page_numbers(&model), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn rebind_keeps_criteria_and_refetches() {
        let (_, model) = seeded(25);
        model.set_page_size(5).unwrap();
        model.set_filter(Some(doc! { "even": true }));
        model.refresh().unwrap();
        model.next_page().unwrap();

        let other = Arc::new(
            MemoryGateway::new("archive")
                .with_documents("orders_2020", numbered(8))
                .with_documents("orders", numbered(3)),
        );
        assert_eq!(model.rebind(other.clone(), "orders_2020").unwrap(), RefreshOutcome::Applied);

        let snapshot = model.snapshot();
        assert_eq!(snapshot.database, "archive");
        assert_eq!(snapshot.collection, "orders_2020");
        assert_eq!(snapshot.page_size, PageSize::Limited(5));
        assert_eq!(snapshot.filter, Some(doc! { "even": true }));
        assert_eq!(snapshot.current_page, 1);
        assert_eq!(snapshot.total_count, 4);
        assert_eq!(other.count_calls(), 1);
    }

    #[test]
    fn rebind_failure_keeps_previous_binding_and_page() {
        let (_, model) = seeded(5);
        model.refresh().unwrap();
        let before = model.snapshot();
        let events = record_events(&model);

        let broken = Arc::new(MemoryGateway::new("archive"));
        broken.fail_with("not authorized");
        let err = model.rebind(broken, "other").unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));

        assert_eq!(model.snapshot(), before);
        assert_eq!(model.collection(), "orders");
        assert_eq!(model.total_count(), 5);
        assert_eq!(page_numbers(&model), vec![1, 2, 3, 4, 5]);
        assert!(matches!(events.lock().as_slice(), [ModelEvent::Failed { .. }]));

        model.refresh().unwrap();
        assert_eq!(model.snapshot().database, "shop");
    }

    #[test]
    fn second_refresh_wins_when_first_finishes_late() {
        let (gateway, model) = seeded(30);
        model.refresh().unwrap();

        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let first = AtomicBool::new(true);
        gateway.set_find_hook(Some(Arc::new(move |_: &FindDocumentsOptions| {
            if first.swap(false, Ordering::SeqCst) {
                let _ = entered_tx.lock().send(());
                let _ = release_rx.lock().recv();
            }
        })));

        let events = record_events(&model);
        let slow = {
            let model = model.clone();
            thread::spawn(move || model.refresh())
        };
        entered_rx.recv().unwrap();

        assert_eq!(model.refresh().unwrap(), RefreshOutcome::Applied);
        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap().unwrap(), RefreshOutcome::Superseded);

        assert_eq!(events.lock().len(), 1);
        assert!(!model.is_stale());
    }

    #[test]
    fn page_change_during_fetch_wins_over_stale_result() {
        let (gateway, model) = seeded(30);
        model.refresh().unwrap();

        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        gateway.set_find_hook(Some(Arc::new(move |options: &FindDocumentsOptions| {
            if options.skip == 0 {
                let _ = entered_tx.lock().send(());
                let _ = release_rx.lock().recv();
            }
        })));

        let events = record_events(&model);
        let slow = {
            let model = model.clone();
            thread::spawn(move || model.refresh())
        };
        entered_rx.recv().unwrap();

        model.set_page(2);
        assert_eq!(model.refresh().unwrap(), RefreshOutcome::Applied);
        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap().unwrap(), RefreshOutcome::Superseded);

        assert_eq!(model.current_page(), 2);
        assert_eq!(page_numbers(&model), (11..=20).collect::<Vec<_>>());
        assert_eq!(
            *events.lock(),
            vec![ModelEvent::DataChanged { total: 30, page: 2, page_count: 3 }]
        );
    }

    #[test]
    fn spawn_refresh_runs_on_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (_, model) = seeded(12);

        let outcome = runtime.block_on(model.spawn_refresh(runtime.handle())).unwrap().unwrap();
        assert_eq!(outcome, RefreshOutcome::Applied);
        assert_eq!(model.total_count(), 12);
    }
}
