//! Single-flight wrapper for asynchronous operations.
//!
//! At most one wrapped operation runs per [`Deduplicator`]. Callers that
//! arrive while it runs join it and receive the same result. The operation
//! runs on its own task, so it completes even when every caller stops
//! waiting for it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use listing_pager_core::{PagerError, Result};

use crate::cancel::CancelToken;

struct InFlight<R> {
    id: u64,
    token: CancelToken,
    future: Shared<BoxFuture<'static, Result<R>>>,
}

type Slot<R> = Mutex<Option<InFlight<R>>>;

fn lock_slot<R>(slot: &Slot<R>) -> MutexGuard<'_, Option<InFlight<R>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties `slot` if it still holds operation `id`.
fn clear_slot<R>(slot: &Slot<R>, id: u64) {
    let mut slot = lock_slot(slot);
    if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
        *slot = None;
    }
}

pub struct Deduplicator<R> {
    slot: Arc<Slot<R>>,
    next_id: AtomicU64,
}

impl<R> Default for Deduplicator<R> {
    fn default() -> Self {
        Self { slot: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(1) }
    }
}

impl<R> std::fmt::Debug for Deduplicator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator").field("in_flight", &self.lock().is_some()).finish()
    }
}

impl<R> Deduplicator<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<InFlight<R>>> {
        lock_slot(&self.slot)
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.lock().is_some()
    }

    /// Fires the in-flight token and forgets the operation.
    ///
    /// Returns `true` if something was in flight. Callers still waiting on
    /// it receive [`PagerError::Cancelled`].
    pub fn cancel(&self) -> bool {
        let Some(in_flight) = self.lock().take() else {
            return false;
        };
        in_flight.token.cancel();
        tracing::debug!(operation = in_flight.id, "cancelled in-flight operation");
        true
    }

    /// Forgets the in-flight operation without cancelling it.
    ///
    /// The next [`run`](Self::run) starts fresh; callers already waiting on
    /// the old operation still receive its result.
    pub fn invalidate(&self) -> bool {
        let Some(in_flight) = self.lock().take() else {
            return false;
        };
        tracing::debug!(operation = in_flight.id, "invalidated in-flight operation");
        true
    }
}

impl<R> Deduplicator<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Runs `op`, or joins the operation already in flight.
    ///
    /// `op` is only invoked when nothing is in flight. It receives the token
    /// that [`cancel`](Self::cancel) fires, and the future it returns is
    /// spawned onto the runtime. Dropping the returned future detaches the
    /// caller without stopping the operation.
    ///
    /// # Errors
    /// Returns [`PagerError::Cancelled`] if the operation was cancelled
    /// before its result was delivered, or [`PagerError::Fetch`] if its task
    /// panicked.
    pub async fn run<F, Fut>(&self, op: F) -> Result<R>
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (token, future) = {
            let mut slot = self.lock();
            if let Some(in_flight) = slot.as_ref() {
                tracing::trace!(operation = in_flight.id, "joining in-flight operation");
                (in_flight.token.clone(), in_flight.future.clone())
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let token = CancelToken::new();
                let future = self.spawn(id, token.clone(), op(token.clone()));
                *slot = Some(InFlight { id, token: token.clone(), future: future.clone() });
                tracing::trace!(operation = id, "started operation");
                (token, future)
            }
        };

        let outcome = future.await;
        if token.is_cancelled() {
            return Err(PagerError::Cancelled);
        }
        outcome
    }

    fn spawn<Fut>(
        &self,
        id: u64,
        token: CancelToken,
        operation: Fut,
    ) -> Shared<BoxFuture<'static, Result<R>>>
    where
        Fut: Future<Output = R> + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => Err(PagerError::Cancelled),
                value = operation => Ok(value),
            };
            clear_slot(&slot, id);
            outcome
        });
        async move {
            handle.await.unwrap_or_else(|e| {
                tracing::warn!(operation = id, error = %e, "operation task failed");
                Err(PagerError::Fetch(format!("operation task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }
}
