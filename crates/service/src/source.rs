//! Page source trait implemented by callers of the controller.
//!
//! The controller owns no transport: every page comes from a
//! [`PageSource`].

use async_trait::async_trait;
use listing_pager_core::{Result, Snapshot};

use crate::cancel::CancelToken;

/// Supplies pages of `T` to a [`PaginationController`](crate::PaginationController).
///
/// Fetches may fail either by returning `Err` or by returning a snapshot
/// with `error` set; the controller turns both into an error-bearing
/// snapshot and never propagates the failure further.
#[async_trait]
pub trait PageSource<T: Send>: Send + Sync {
    /// Fetches page 1. A failure leaves `page` at 0.
    async fn fetch_initial(&self, cancel: CancelToken) -> Result<Snapshot<T>>;

    /// Re-fetches page 1. Defaults to [`fetch_initial`](Self::fetch_initial).
    async fn fetch_refresh(&self, cancel: CancelToken) -> Result<Snapshot<T>> {
        self.fetch_initial(cancel).await
    }

    /// Fetches `next_page` and returns the full accumulated snapshot:
    /// `previous.items` followed by the new page.
    async fn fetch_load_more(
        &self,
        previous: Snapshot<T>,
        next_page: u32,
        cancel: CancelToken,
    ) -> Result<Snapshot<T>>;

    /// Stable unique key of an item, used for list reconciliation.
    fn item_key(&self, item: &T) -> String;
}
