//! Pagination snapshot: accumulated items plus paging metadata.

use serde::{Deserialize, Serialize};

use crate::error::{PagerError, Result};
use crate::status::PageStatus;

/// Immutable pagination state of one listing.
///
/// `page == 0` means no page has been loaded yet. Snapshots are replaced
/// wholesale on every fetch and never mutated in place by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    /// Items accumulated across pages, in fetch order.
    pub items: Vec<T>,
    /// Highest page successfully loaded.
    pub page: u32,
    /// Page size of the most recent fetch (informational).
    pub page_size: u32,
    /// Total number of pages reported by the source.
    pub page_count: u32,
    /// Total number of items reported by the source.
    pub total: u64,
    /// Last failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Snapshot<T> {
    /// The canonical starting/reset value.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            page: 0,
            page_size: 0,
            page_count: 0,
            total: 0,
            error: None,
        }
    }

    /// A successfully loaded first page.
    #[must_use]
    pub const fn first_page(items: Vec<T>, page_size: u32, page_count: u32, total: u64) -> Self {
        Self { items, page: 1, page_size, page_count, total, error: None }
    }

    /// A first page that failed to load.
    #[must_use]
    pub fn first_page_failed(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::empty() }
    }

    /// Same shape with `error` set. Items and `page` are preserved.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Appends a freshly fetched page to the accumulated items.
    ///
    /// Clears any previous error. Items are not deduplicated.
    #[must_use]
    pub fn append_page(mut self, page: u32, items: Vec<T>, page_count: u32, total: u64) -> Self {
        if self.page_size == 0 {
            self.page_size = u32::try_from(items.len()).unwrap_or(u32::MAX);
        }
        self.items.extend(items);
        self.page = page;
        self.page_count = page_count;
        self.total = total;
        self.error = None;
        self
    }

    /// Whether the last available page has been reached.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.page >= self.page_count
    }

    /// Page number a load-more would request.
    #[must_use]
    pub const fn next_page(&self) -> u32 {
        self.page.saturating_add(1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Status derived from this snapshot alone.
    #[must_use]
    pub fn status(&self) -> PageStatus {
        PageStatus::derive(self)
    }

    /// Checks the paging invariants a well-behaved source upholds.
    ///
    /// # Errors
    /// Returns [`PagerError::InvalidSnapshot`] if `page` exceeds a known
    /// `page_count`, or if a snapshot claims a page but holds more items
    /// than its reported total.
    pub fn validate(&self) -> Result<()> {
        if self.page_count > 0 && self.page > self.page_count {
            return Err(PagerError::InvalidSnapshot(format!(
                "page {} exceeds page count {}",
                self.page, self.page_count
            )));
        }
        let len = u64::try_from(self.items.len()).unwrap_or(u64::MAX);
        if self.page > 0 && self.total > 0 && len > self.total {
            return Err(PagerError::InvalidSnapshot(format!(
                "{len} items exceed reported total {}",
                self.total
            )));
        }
        Ok(())
    }
}
