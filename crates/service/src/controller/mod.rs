//! Pagination controller: owns the snapshot of one listing and drives it
//! through initial load, refresh, load-more and external replacement.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use listing_pager_core::{PageStatus, PageView, PagerConfig, PagerError, Result, Snapshot};
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::cancel::CancelToken;
use crate::dedup::Deduplicator;
use crate::source::PageSource;
use crate::visibility::{TrackerRegistry, VisibilityTracker};

#[cfg(test)]
mod tests;

/// Published on every status recomputation, including ones that leave the
/// status unchanged. `revision` always increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: PageStatus,
    pub revision: u64,
}

/// Options for [`PaginationController::update_pagination`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Show the first-page loading state until the update is applied.
    pub force_loading_first_page: bool,
    /// Wait before applying; a newer update arriving meanwhile wins.
    pub delay: Option<Duration>,
}

impl UpdateOptions {
    /// Options carrying the configured update delay.
    #[must_use]
    pub const fn from_config(config: &PagerConfig) -> Self {
        Self { force_loading_first_page: false, delay: config.update_delay() }
    }

    #[must_use]
    pub const fn loading(mut self) -> Self {
        self.force_loading_first_page = true;
        self
    }

    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct ControllerState<T> {
    snapshot: Arc<Snapshot<T>>,
    status: PageStatus,
    /// Bumped by every first-page fetch and external replacement. Results
    /// fetched under an older generation are discarded.
    generation: u64,
    revision: u64,
    /// Set once the trigger item asked for the next page; cleared when a
    /// new snapshot is installed.
    load_more_requested: bool,
    first_page_token: Option<CancelToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirstPage {
    Initial,
    Refresh,
}

impl FirstPage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Refresh => "refresh",
        }
    }
}

/// State shared between the controller and the fetch tasks it spawns.
struct Inner<T, S> {
    source: Arc<S>,
    config: PagerConfig,
    state: Mutex<ControllerState<T>>,
    load_more: Deduplicator<PageStatus>,
    trackers: Arc<TrackerRegistry>,
    status_tx: watch::Sender<StatusChange>,
}

/// Drives one listing through initial load, refresh, load-more and external
/// replacement.
///
/// Fetches run on spawned tasks and install their own results, so dropping
/// the future of any operation never leaves the listing in a loading status.
pub struct PaginationController<T, S> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> fmt::Debug for PaginationController<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("PaginationController")
            .field("status", &state.status)
            .field("page", &state.snapshot.page)
            .field("items", &state.snapshot.items.len())
            .field("generation", &state.generation)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<T, S> Inner<T, S> {
    fn lock(&self) -> MutexGuard<'_, ControllerState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut ControllerState<T>, status: PageStatus) {
        let from = state.status;
        state.status = status;
        state.revision = state.revision.wrapping_add(1);
        tracing::debug!(from = %from, to = %status, revision = state.revision, "status published");
        self.status_tx.send_replace(StatusChange { status, revision: state.revision });
    }

    /// Cancels every pending fetch whose result would overwrite the snapshot.
    fn cancel_pending(&self, state: &mut ControllerState<T>) {
        if let Some(token) = state.first_page_token.take() {
            token.cancel();
        }
        self.load_more.cancel();
    }

    fn install(&self, state: &mut ControllerState<T>, snapshot: Snapshot<T>) {
        if let Err(e) = snapshot.validate() {
            tracing::warn!(error = %e, "installing inconsistent snapshot");
        }
        tracing::info!(
            page = snapshot.page,
            page_count = snapshot.page_count,
            items = snapshot.items.len(),
            total = snapshot.total,
            failed = snapshot.error.is_some(),
            "snapshot installed"
        );
        let status = snapshot.status();
        state.snapshot = Arc::new(snapshot);
        state.load_more_requested = false;
        self.publish(state, status);
    }

    /// Cancels pending fetches, resets trackers and installs `snapshot`.
    fn replace(&self, state: &mut ControllerState<T>, snapshot: Snapshot<T>) {
        self.cancel_pending(state);
        let reset = self.trackers.reset_all();
        tracing::debug!(trackers = reset, "visibility trackers reset");
        self.install(state, snapshot);
    }

    /// Begins a first-page fetch: cancels pending work and shows loading.
    fn begin_first_page(&self, state: &mut ControllerState<T>) -> (u64, CancelToken) {
        self.cancel_pending(state);
        state.generation = state.generation.wrapping_add(1);
        let token = CancelToken::new();
        state.first_page_token = Some(token.clone());
        self.publish(state, PageStatus::LoadingFirstPage);
        (state.generation, token)
    }

    fn finish_first_page(
        &self,
        generation: u64,
        fetched: Option<Result<Snapshot<T>>>,
        kind: FirstPage,
    ) -> PageStatus {
        let kind = kind.as_str();
        let mut state = self.lock();
        let Some(fetched) = fetched else {
            tracing::debug!(kind, "first page fetch cancelled");
            return state.status;
        };
        if state.generation != generation {
            tracing::debug!(
                kind,
                generation,
                current = state.generation,
                "discarding stale first page"
            );
            return state.status;
        }
        state.first_page_token = None;
        let snapshot = fetched.unwrap_or_else(|e| {
            tracing::warn!(
                kind,
                error = %e,
                transient = e.is_transient(),
                "first page fetch failed"
            );
            Snapshot::first_page_failed(e.to_string())
        });
        self.replace(&mut state, snapshot);
        state.status
    }

    /// Installs a load-more result unless the listing moved on meanwhile.
    fn finish_load_more(
        &self,
        generation: u64,
        previous: &Snapshot<T>,
        next_page: u32,
        fetched: Result<Snapshot<T>>,
    ) -> PageStatus
    where
        T: Clone,
    {
        let mut state = self.lock();
        if state.generation != generation || state.status != PageStatus::LoadingMore {
            tracing::debug!(next_page, "discarding stale load-more result");
            return state.status;
        }
        let snapshot = fetched.unwrap_or_else(|e| {
            tracing::warn!(
                next_page,
                error = %e,
                transient = e.is_transient(),
                "load-more fetch failed"
            );
            previous.clone().with_error(e.to_string())
        });
        self.install(&mut state, snapshot);
        state.status
    }

    /// Applies an external update unless a newer one superseded it.
    fn apply_update(&self, generation: u64, snapshot: Snapshot<T>) -> PageStatus {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(generation, current = state.generation, "update superseded");
            return state.status;
        }
        self.replace(&mut state, snapshot);
        state.status
    }

    /// Settles a loading status whose fetch task died without installing.
    fn recover(&self, generation: u64, error: &PagerError, fallback: Snapshot<T>) -> PageStatus {
        let mut state = self.lock();
        if state.generation == generation && state.status.is_loading() {
            tracing::warn!(error = %error, "fetch task failed, installing error snapshot");
            state.first_page_token = None;
            self.install(&mut state, fallback);
        }
        state.status
    }
}

fn task_failed(operation: &str, e: &JoinError) -> PagerError {
    PagerError::Fetch(format!("{operation} task failed: {e}"))
}

impl<T, S> PaginationController<T, S> {
    #[must_use]
    pub fn status(&self) -> PageStatus {
        self.inner.lock().status
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        Arc::clone(&self.inner.lock().snapshot)
    }

    /// Index whose becoming visible requests the next page.
    #[must_use]
    pub fn trigger_index(&self) -> usize {
        let len = self.inner.lock().snapshot.items.len();
        len.saturating_sub(self.inner.config.invisible_items_threshold)
    }

    /// Receiver notified on every status publish.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusChange> {
        self.inner.status_tx.subscribe()
    }

    /// Mounts a visibility tracker for the item at `index`.
    #[must_use]
    pub fn track(&self, index: usize) -> VisibilityTracker {
        self.inner.trackers.register(index)
    }

    #[must_use]
    pub fn tracker_count(&self) -> usize {
        self.inner.trackers.len()
    }

    #[must_use]
    pub fn is_loading_more(&self) -> bool {
        self.inner.load_more.is_in_flight()
    }

    /// Applies `snapshot` immediately. Equivalent to
    /// [`update_pagination`](Self::update_pagination) without options.
    pub fn replace_snapshot(&self, snapshot: Snapshot<T>) -> PageStatus {
        let mut state = self.inner.lock();
        state.generation = state.generation.wrapping_add(1);
        self.inner.replace(&mut state, snapshot);
        state.status
    }
}

impl<T, S> PaginationController<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: PageSource<T> + 'static,
{
    /// Creates a controller starting from the empty snapshot.
    #[must_use]
    pub fn new(source: Arc<S>, config: PagerConfig) -> Self {
        Self::with_snapshot(source, config, Snapshot::empty())
    }

    /// Creates a controller seeded with `snapshot`, e.g. a pre-rendered first page.
    #[must_use]
    pub fn with_snapshot(source: Arc<S>, config: PagerConfig, snapshot: Snapshot<T>) -> Self {
        let status = snapshot.status();
        let (status_tx, _) = watch::channel(StatusChange { status, revision: 0 });
        let inner = Inner {
            source,
            config,
            state: Mutex::new(ControllerState {
                snapshot: Arc::new(snapshot),
                status,
                generation: 0,
                revision: 0,
                load_more_requested: false,
                first_page_token: None,
            }),
            load_more: Deduplicator::new(),
            trackers: TrackerRegistry::new(),
            status_tx,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Fetches the first page. Runs only from `Initial`, or from
    /// `FirstPageError` as a retry; otherwise returns the current status.
    pub async fn initial(&self) -> PageStatus {
        let (generation, token) = {
            let mut state = self.inner.lock();
            if !matches!(state.status, PageStatus::Initial | PageStatus::FirstPageError) {
                tracing::debug!(status = %state.status, "initial fetch skipped");
                return state.status;
            }
            self.inner.begin_first_page(&mut state)
        };
        self.fetch_first_page(generation, token, FirstPage::Initial).await
    }

    /// Re-fetches the first page from any status, discarding loaded items.
    ///
    /// Pending load-more and first-page fetches are cancelled first, so a
    /// stale result can never land after the refresh.
    pub async fn refresh(&self) -> PageStatus {
        let (generation, token) = {
            let mut state = self.inner.lock();
            self.inner.begin_first_page(&mut state)
        };
        self.fetch_first_page(generation, token, FirstPage::Refresh).await
    }

    async fn fetch_first_page(
        &self,
        generation: u64,
        token: CancelToken,
        kind: FirstPage,
    ) -> PageStatus {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let request = match kind {
                FirstPage::Initial => inner.source.fetch_initial(token.clone()),
                FirstPage::Refresh => inner.source.fetch_refresh(token.clone()),
            };
            let fetched = tokio::select! {
                biased;
                () = token.cancelled() => None,
                result = request => Some(result),
            };
            inner.finish_first_page(generation, fetched, kind)
        });
        match task.await {
            Ok(status) => status,
            Err(e) => {
                let error = task_failed(kind.as_str(), &e);
                let fallback = Snapshot::first_page_failed(error.to_string());
                self.inner.recover(generation, &error, fallback)
            },
        }
    }

    /// Fetches the page after the current one and installs the accumulated
    /// snapshot the source returns.
    ///
    /// Runs from `Ongoing`, or from `SubsequentPageError` as a retry of the
    /// same page. A call made while a load-more is running joins it.
    pub async fn load_more(&self) -> PageStatus {
        let (generation, previous) = {
            let mut state = self.inner.lock();
            match state.status {
                PageStatus::Ongoing | PageStatus::SubsequentPageError => {
                    self.inner.publish(&mut state, PageStatus::LoadingMore);
                },
                PageStatus::LoadingMore => {
                    tracing::trace!("joining running load-more");
                },
                other => {
                    tracing::debug!(status = %other, "load-more skipped");
                    return other;
                },
            }
            (state.generation, Arc::clone(&state.snapshot))
        };

        let next_page = previous.next_page();
        let inner = Arc::clone(&self.inner);
        let requested = Arc::clone(&previous);
        let outcome = self
            .inner
            .load_more
            .run(move |token| async move {
                let fetched =
                    inner.source.fetch_load_more((*requested).clone(), next_page, token).await;
                inner.finish_load_more(generation, &requested, next_page, fetched)
            })
            .await;

        match outcome {
            Ok(status) => status,
            Err(e) if e.is_cancelled() => {
                tracing::debug!(next_page, "load-more cancelled");
                self.status()
            },
            Err(e) => {
                let fallback = (*previous).clone().with_error(e.to_string());
                self.inner.recover(generation, &e, fallback)
            },
        }
    }

    /// Externally forced replacement, e.g. after filters changed upstream.
    ///
    /// Cancels pending fetches, resets every tracker and installs
    /// `snapshot`. The status is republished even when unchanged.
    pub async fn update_pagination(
        &self,
        snapshot: Snapshot<T>,
        options: UpdateOptions,
    ) -> PageStatus {
        let generation = {
            let mut state = self.inner.lock();
            state.generation = state.generation.wrapping_add(1);
            if options.force_loading_first_page {
                self.inner.cancel_pending(&mut state);
                self.inner.publish(&mut state, PageStatus::LoadingFirstPage);
            }
            state.generation
        };

        let Some(delay) = options.delay.filter(|delay| !delay.is_zero()) else {
            return self.inner.apply_update(generation, snapshot);
        };
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.apply_update(generation, snapshot)
        });
        match task.await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "delayed update task failed");
                self.status()
            },
        }
    }

    /// Load-more trigger policy. Requests the next page when `index` is
    /// the trigger index, the listing is `Ongoing` and not on its last
    /// page, and this batch has not requested one yet.
    pub async fn on_item_visible(&self, index: usize) -> bool {
        {
            let mut state = self.inner.lock();
            let trigger = state
                .snapshot
                .items
                .len()
                .saturating_sub(self.inner.config.invisible_items_threshold);
            if index != trigger
                || state.status != PageStatus::Ongoing
                || state.load_more_requested
                || state.snapshot.is_last()
            {
                return false;
            }
            state.load_more_requested = true;
        }
        tracing::debug!(index, "trigger item visible, requesting next page");
        self.load_more().await;
        true
    }

    /// Feeds a tracker observation into the trigger policy.
    pub async fn report_visibility(&self, tracker: &VisibilityTracker, visible: bool) -> bool {
        match tracker.observe(visible) {
            Some(index) => self.on_item_visible(index).await,
            None => false,
        }
    }

    /// Retry hook for the first-page error view.
    pub async fn trigger_initial(&self) -> PageStatus {
        self.initial().await
    }

    pub async fn trigger_refresh(&self) -> PageStatus {
        self.refresh().await
    }

    /// Retry hook for the subsequent-page error footer.
    pub async fn trigger_load_more(&self) -> PageStatus {
        self.load_more().await
    }

    /// View descriptor for the current snapshot and status.
    #[must_use]
    pub fn view(&self) -> PageView<T> {
        let (snapshot, status) = {
            let state = self.inner.lock();
            (Arc::clone(&state.snapshot), state.status)
        };
        PageView::build(&snapshot, status, |item| self.inner.source.item_key(item))
    }

    /// Reconciliation keys in list order. Duplicates are kept and logged.
    #[must_use]
    pub fn item_keys(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let keys: Vec<String> =
            snapshot.items.iter().map(|item| self.inner.source.item_key(item)).collect();
        let mut seen = HashSet::with_capacity(keys.len());
        let duplicates = keys.iter().filter(|key| !seen.insert(key.as_str())).count();
        if duplicates > 0 {
            tracing::debug!(duplicates, "listing contains duplicate item keys");
        }
        keys
    }
}
