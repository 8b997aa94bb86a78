use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use listing_pager_core::{Footer, PageStatus, PageView, PagerConfig, PagerError, Result, Snapshot};
use tokio::sync::{Notify, Semaphore};

use super::{PaginationController, UpdateOptions};
use crate::cancel::CancelToken;
use crate::source::PageSource;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Car {
    id: u32,
}

/// In-memory source serving `total` cars in pages of `page_size`.
struct FakeSource {
    total: u32,
    page_size: u32,
    initial_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    load_more_calls: Mutex<Vec<u32>>,
    fail_initial: AtomicUsize,
    fail_pages: Mutex<Vec<u32>>,
    gate: Option<Semaphore>,
    started: Notify,
}

impl FakeSource {
    fn new(total: u32, page_size: u32) -> Self {
        Self {
            total,
            page_size,
            initial_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            load_more_calls: Mutex::new(Vec::new()),
            fail_initial: AtomicUsize::new(0),
            fail_pages: Mutex::new(Vec::new()),
            gate: None,
            started: Notify::new(),
        }
    }

    /// Load-more fetches block until [`release`](Self::release) is called.
    fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    fn failing_initial(self, times: usize) -> Self {
        self.fail_initial.store(times, Ordering::SeqCst);
        self
    }

    fn failing_page(self, page: u32) -> Self {
        self.fail_pages.lock().unwrap().push(page);
        self
    }

    fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    fn page_count(&self) -> u32 {
        self.total.div_ceil(self.page_size).max(1)
    }

    fn page(&self, page: u32) -> Vec<Car> {
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.total);
        (start..end).map(|id| Car { id }).collect()
    }

    fn load_more_calls(&self) -> Vec<u32> {
        self.load_more_calls.lock().unwrap().clone()
    }

    fn first_page(&self) -> Snapshot<Car> {
        let total = u64::from(self.total);
        Snapshot::first_page(self.page(1), self.page_size, self.page_count(), total)
    }
}

#[async_trait]
impl PageSource<Car> for FakeSource {
    async fn fetch_initial(&self, _cancel: CancelToken) -> Result<Snapshot<Car>> {
        self.initial_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let should_fail = self
            .fail_initial
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PagerError::Fetch("offline".to_owned()));
        }
        Ok(self.first_page())
    }

    async fn fetch_refresh(&self, cancel: CancelToken) -> Result<Snapshot<Car>> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_initial(cancel).await
    }

    async fn fetch_load_more(
        &self,
        previous: Snapshot<Car>,
        next_page: u32,
        _cancel: CancelToken,
    ) -> Result<Snapshot<Car>> {
        self.load_more_calls.lock().unwrap().push(next_page);
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let should_fail = {
            let mut failing = self.fail_pages.lock().unwrap();
            let position = failing.iter().position(|page| *page == next_page);
            position.map(|at| failing.remove(at)).is_some()
        };
        if should_fail {
            return Err(PagerError::Fetch("network".to_owned()));
        }
        Ok(previous.append_page(
            next_page,
            self.page(next_page),
            self.page_count(),
            u64::from(self.total),
        ))
    }

    fn item_key(&self, item: &Car) -> String {
        format!("car-{}", item.id)
    }
}

type Controller = PaginationController<Car, FakeSource>;

fn controller(source: FakeSource) -> (Arc<Controller>, Arc<FakeSource>) {
    let source = Arc::new(source);
    let controller =
        Arc::new(PaginationController::new(Arc::clone(&source), PagerConfig::default()));
    (controller, source)
}

/// Waits until `status` is published.
async fn settle(controller: &Controller, status: PageStatus) {
    let mut changes = controller.subscribe();
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|change| change.status == status))
        .await
        .expect("status not reached in time")
        .expect("controller dropped");
}

fn listing(ids: std::ops::Range<u32>, page_count: u32, total: u64) -> Snapshot<Car> {
    let items: Vec<Car> = ids.map(|id| Car { id }).collect();
    Snapshot::first_page(items, 10, page_count, total)
}

#[tokio::test]
async fn starts_initial_with_empty_snapshot() {
    let (controller, _) = controller(FakeSource::new(25, 10));
    assert_eq!(controller.status(), PageStatus::Initial);
    assert_eq!(*controller.snapshot(), Snapshot::empty());
    assert_eq!(controller.view(), PageView::Idle);
}

#[tokio::test]
async fn initial_loads_first_page() {
    let (controller, source) = controller(FakeSource::new(25, 10));

    assert_eq!(controller.initial().await, PageStatus::Ongoing);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.items.len(), 10);
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.page_count, 3);
    assert_eq!(controller.trigger_index(), 7);
    assert_eq!(source.initial_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn initial_is_noop_once_loaded() {
    let (controller, source) = controller(FakeSource::new(25, 10));
    controller.initial().await;
    assert_eq!(controller.initial().await, PageStatus::Ongoing);
    assert_eq!(source.initial_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_initial_calls_fetch_once() {
    let (controller, source) = controller(FakeSource::new(25, 10));

    let (first, second) = tokio::join!(controller.initial(), controller.initial());

    assert_eq!(first, PageStatus::Ongoing);
    assert_eq!(second, PageStatus::LoadingFirstPage);
    assert_eq!(source.initial_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn seeded_controller_skips_initial_fetch() {
    let source = Arc::new(FakeSource::new(25, 10));
    let seeded = source.first_page();
    let controller =
        PaginationController::with_snapshot(Arc::clone(&source), PagerConfig::default(), seeded);

    assert_eq!(controller.status(), PageStatus::Ongoing);
    assert_eq!(controller.initial().await, PageStatus::Ongoing);
    assert_eq!(source.initial_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn first_page_failure_is_captured_and_retryable() {
    let (controller, source) = controller(FakeSource::new(25, 10).failing_initial(1));

    assert_eq!(controller.initial().await, PageStatus::FirstPageError);
    let failed = controller.snapshot();
    assert_eq!(failed.page, 0);
    assert_eq!(failed.error.as_deref(), Some("Fetch failed: offline"));
    assert_eq!(
        controller.view(),
        PageView::FirstPageError { message: "Fetch failed: offline".to_owned() }
    );

    assert_eq!(controller.trigger_initial().await, PageStatus::Ongoing);
    assert_eq!(controller.snapshot().error, None);
    assert_eq!(source.initial_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn only_trigger_index_requests_next_page() {
    let (controller, source) = controller(FakeSource::new(25, 10));
    controller.initial().await;

    assert!(!controller.on_item_visible(6).await);
    assert!(!controller.on_item_visible(9).await);
    assert!(source.load_more_calls().is_empty());

    assert!(controller.on_item_visible(7).await);
    assert_eq!(source.load_more_calls(), vec![2]);
    assert_eq!(controller.status(), PageStatus::Ongoing);
    assert_eq!(controller.snapshot().items.len(), 20);
    assert_eq!(controller.trigger_index(), 17);
}

#[tokio::test]
async fn back_to_back_triggers_fetch_once() {
    let (controller, source) = controller(FakeSource::new(25, 10).gated());
    controller.initial().await;

    let (first, second, ()) = tokio::join!(
        controller.on_item_visible(7),
        controller.on_item_visible(7),
        async {
            source.started.notified().await;
            assert_eq!(controller.status(), PageStatus::LoadingMore);
            source.release(1);
        }
    );

    assert!(first);
    assert!(!second);
    assert_eq!(source.load_more_calls(), vec![2]);
    assert_eq!(controller.snapshot().page, 2);
}

#[tokio::test]
async fn overlapping_load_more_calls_join_one_fetch() {
    let (controller, source) = controller(FakeSource::new(25, 10).gated());
    controller.initial().await;

    let (first, second, ()) = tokio::join!(controller.load_more(), controller.load_more(), async {
        source.started.notified().await;
        source.release(1);
    });

    assert_eq!(first, PageStatus::Ongoing);
    assert_eq!(second, PageStatus::Ongoing);
    assert_eq!(source.load_more_calls(), vec![2]);
    assert_eq!(controller.snapshot().items.len(), 20);
}

#[tokio::test]
async fn loads_until_completed() {
    let (controller, source) = controller(FakeSource::new(25, 10));
    controller.initial().await;

    while controller.status() == PageStatus::Ongoing {
        let trigger = controller.trigger_index();
        assert!(controller.on_item_visible(trigger).await);
    }

    assert_eq!(controller.status(), PageStatus::Completed);
    assert_eq!(controller.snapshot().items.len(), 25);
    assert_eq!(source.load_more_calls(), vec![2, 3]);
    assert_eq!(controller.view().footer(), Some(&Footer::End));
    assert!(!controller.on_item_visible(controller.trigger_index()).await);
}

#[tokio::test]
async fn single_page_listing_completes_without_load_more() {
    let (controller, source) = controller(FakeSource::new(5, 10));

    assert_eq!(controller.initial().await, PageStatus::Completed);
    assert!(!controller.on_item_visible(2).await);
    assert_eq!(controller.load_more().await, PageStatus::Completed);
    assert!(source.load_more_calls().is_empty());
}

#[tokio::test]
async fn empty_listing_is_no_items_found() {
    let (controller, _) = controller(FakeSource::new(0, 10));

    assert_eq!(controller.initial().await, PageStatus::NoItemsFound);
    assert_eq!(controller.view(), PageView::NoItemsFound);
    assert!(!controller.on_item_visible(0).await);
}

#[tokio::test]
async fn subsequent_failure_keeps_items_and_retries_same_page() {
    let (controller, source) = controller(FakeSource::new(25, 10).failing_page(2));
    controller.initial().await;

    assert!(controller.on_item_visible(7).await);
    assert_eq!(controller.status(), PageStatus::SubsequentPageError);
    let failed = controller.snapshot();
    assert_eq!(failed.items.len(), 10);
    assert_eq!(failed.page, 1);
    assert!(failed.error.is_some());
    assert!(matches!(controller.view().footer(), Some(Footer::Error { .. })));

    // No automatic retry from visibility.
    assert!(!controller.on_item_visible(7).await);

    assert_eq!(controller.trigger_load_more().await, PageStatus::Ongoing);
    assert_eq!(source.load_more_calls(), vec![2, 2]);
    assert_eq!(controller.snapshot().items.len(), 20);
    assert_eq!(controller.snapshot().error, None);
}

#[tokio::test]
async fn update_pagination_discards_inflight_load_more() {
    let (controller, source) = controller(FakeSource::new(25, 10).gated());
    controller.initial().await;

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.load_more().await }
    });
    source.started.notified().await;

    let replacement = listing(100..102, 5, 100);
    let status = controller.update_pagination(replacement.clone(), UpdateOptions::default()).await;
    assert_eq!(status, PageStatus::Ongoing);
    assert!(!controller.is_loading_more());

    source.release(1);
    pending.await.unwrap();

    assert_eq!(*controller.snapshot(), replacement);
    assert_eq!(controller.status(), PageStatus::Ongoing);
}

#[tokio::test]
async fn update_pagination_always_resets_trackers_and_republishes() {
    let (controller, _) = controller(FakeSource::new(25, 10));
    let replacement = listing(0..10, 3, 25);
    let tracker = controller.track(3);
    let mut changes = controller.subscribe();

    let first = controller.update_pagination(replacement.clone(), UpdateOptions::default()).await;
    let revision = changes.borrow_and_update().revision;
    assert_eq!(tracker.observe(true), Some(3));
    assert_eq!(tracker.observe(true), None);

    let second = controller.update_pagination(replacement, UpdateOptions::default()).await;
    assert_eq!(first, second);
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().revision, revision + 1);
    assert_eq!(tracker.observe(true), Some(3));
}

#[tokio::test]
async fn update_pagination_allows_next_batch_trigger() {
    let (controller, source) = controller(FakeSource::new(25, 10));
    controller.initial().await;
    let tracker = controller.track(7);
    assert!(controller.report_visibility(&tracker, true).await);
    assert!(!controller.report_visibility(&tracker, true).await);

    controller.update_pagination(source.first_page(), UpdateOptions::default()).await;
    assert_eq!(controller.tracker_count(), 1);
    assert!(controller.report_visibility(&tracker, true).await);
    assert_eq!(source.load_more_calls(), vec![2, 2]);
}

#[tokio::test(start_paused = true)]
async fn delayed_update_is_superseded_by_newer_one() {
    let (controller, _) = controller(FakeSource::new(25, 10));
    let stale = listing(0..10, 3, 25);
    let fresh = listing(50..52, 1, 2);

    let (stale_status, fresh_status) = tokio::join!(
        controller.update_pagination(
            stale,
            UpdateOptions::default().delayed(Duration::from_millis(50))
        ),
        async {
            tokio::task::yield_now().await;
            controller.update_pagination(fresh.clone(), UpdateOptions::default()).await
        }
    );

    assert_eq!(fresh_status, PageStatus::Completed);
    assert_eq!(stale_status, PageStatus::Completed);
    assert_eq!(*controller.snapshot(), fresh);
}

#[tokio::test(start_paused = true)]
async fn forced_loading_is_shown_until_update_applies() {
    let (controller, _) = controller(FakeSource::new(25, 10));
    controller.initial().await;
    let replacement = listing(0..4, 1, 4);

    let (status, ()) = tokio::join!(
        controller.update_pagination(
            replacement,
            UpdateOptions::default().loading().delayed(Duration::from_millis(20))
        ),
        async {
            tokio::task::yield_now().await;
            assert_eq!(controller.status(), PageStatus::LoadingFirstPage);
            assert_eq!(controller.view(), PageView::LoadingFirstPage);
        }
    );

    assert_eq!(status, PageStatus::Completed);
}

#[tokio::test]
async fn refresh_cancels_inflight_load_more() {
    let (controller, source) = controller(FakeSource::new(25, 10).gated());
    controller.initial().await;

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.load_more().await }
    });
    source.started.notified().await;

    assert_eq!(controller.refresh().await, PageStatus::Ongoing);
    source.release(1);
    pending.await.unwrap();

    assert_eq!(controller.snapshot().items.len(), 10);
    assert_eq!(controller.snapshot().page, 1);
    assert_eq!(source.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_discards_accumulated_items() {
    let (controller, _) = controller(FakeSource::new(25, 10));
    controller.initial().await;
    controller.on_item_visible(7).await;
    assert_eq!(controller.snapshot().items.len(), 20);

    assert_eq!(controller.trigger_refresh().await, PageStatus::Ongoing);
    assert_eq!(controller.snapshot().items.len(), 10);
}

#[tokio::test]
async fn view_marks_loading_footer_while_fetching() {
    let (controller, source) = controller(FakeSource::new(25, 10).gated());
    controller.initial().await;

    let ((), ()) = tokio::join!(
        async {
            controller.load_more().await;
        },
        async {
            source.started.notified().await;
            let view = controller.view();
            assert_eq!(view.footer(), Some(&Footer::LoadingMore));
            source.release(1);
        }
    );

    let PageView::Items { items, status } = controller.view() else {
        panic!("expected items");
    };
    assert_eq!(status, PageStatus::Ongoing);
    assert_eq!(items.len(), 20);
    assert_eq!(items[19].key, "car-19");
    assert!(items[19].footer.is_none());
}

#[tokio::test]
async fn item_keys_follow_list_order() {
    let (controller, _) = controller(FakeSource::new(25, 10));
    controller.initial().await;
    let keys = controller.item_keys();
    assert_eq!(keys.len(), 10);
    assert_eq!(keys[0], "car-0");
    assert_eq!(keys[9], "car-9");
}

#[tokio::test]
async fn duplicate_items_are_kept() {
    let (controller, _) = controller(FakeSource::new(25, 10));
    let duplicated = Snapshot::first_page(vec![Car { id: 1 }, Car { id: 1 }], 2, 2, 4);
    controller.replace_snapshot(duplicated);
    assert_eq!(controller.item_keys(), vec!["car-1".to_owned(), "car-1".to_owned()]);
}

#[tokio::test]
async fn short_listing_triggers_from_first_item() {
    let (controller, source) = controller(FakeSource::new(6, 2));
    controller.initial().await;
    assert_eq!(controller.snapshot().items.len(), 2);
    assert_eq!(controller.snapshot().page_count, 3);

    assert_eq!(controller.trigger_index(), 0);
    assert!(!controller.on_item_visible(1).await);
    assert!(source.load_more_calls().is_empty());

    assert!(controller.on_item_visible(0).await);
    assert_eq!(source.load_more_calls(), vec![2]);
    assert_eq!(controller.snapshot().items.len(), 4);
}

#[tokio::test]
async fn aborted_trigger_still_installs_next_page() {
    let (controller, source) = controller(FakeSource::new(25, 10).gated());
    controller.initial().await;

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.on_item_visible(7).await }
    });
    source.started.notified().await;
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());
    assert_eq!(controller.status(), PageStatus::LoadingMore);

    source.release(1);
    settle(&controller, PageStatus::Ongoing).await;
    assert_eq!(controller.snapshot().items.len(), 20);
    assert!(!controller.is_loading_more());

    source.release(1);
    assert!(controller.on_item_visible(17).await);
    assert_eq!(source.load_more_calls(), vec![2, 3]);
    assert_eq!(controller.status(), PageStatus::Completed);
}

#[tokio::test]
async fn dropped_initial_still_loads_first_page() {
    let (controller, source) = controller(FakeSource::new(25, 10));

    let abandoned = tokio::time::timeout(Duration::ZERO, controller.initial()).await;
    assert!(abandoned.is_err());
    assert_eq!(controller.status(), PageStatus::LoadingFirstPage);

    settle(&controller, PageStatus::Ongoing).await;
    assert_eq!(controller.snapshot().items.len(), 10);
    assert_eq!(controller.initial().await, PageStatus::Ongoing);
    assert_eq!(source.initial_calls.load(Ordering::SeqCst), 1);
}
