//! Listing status: a closed set of states derived from a snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PagerError;
use crate::snapshot::Snapshot;

/// Status a view renders against.
///
/// Everything except `LoadingFirstPage` and `LoadingMore` is a pure function
/// of the snapshot (see [`PageStatus::derive`]). The two loading states are
/// set by the controller while a fetch is running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Nothing fetched yet.
    Initial,
    /// First page is being fetched.
    LoadingFirstPage,
    /// First page failed; nothing to show.
    FirstPageError,
    /// At least one page shown, more available.
    Ongoing,
    /// Next page is being fetched.
    LoadingMore,
    /// Next page failed; loaded items stay visible.
    SubsequentPageError,
    /// Every page loaded.
    Completed,
    /// Source reported nothing.
    NoItemsFound,
}

impl PageStatus {
    pub const ALL_VARIANTS: &'static [Self] = &[
        Self::Initial,
        Self::LoadingFirstPage,
        Self::FirstPageError,
        Self::Ongoing,
        Self::LoadingMore,
        Self::SubsequentPageError,
        Self::Completed,
        Self::NoItemsFound,
    ];

    /// Derives the status of a snapshot. Rule order matters.
    #[must_use]
    pub fn derive<T>(snapshot: &Snapshot<T>) -> Self {
        if snapshot.page == 0 {
            return if snapshot.error.is_some() { Self::FirstPageError } else { Self::Initial };
        }
        if !snapshot.items.is_empty() && snapshot.page >= snapshot.page_count {
            return Self::Completed;
        }
        if snapshot.total < 1 || snapshot.items.is_empty() {
            return Self::NoItemsFound;
        }
        if snapshot.error.is_some() {
            return Self::SubsequentPageError;
        }
        Self::Ongoing
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Initial => "initial",
            Self::LoadingFirstPage => "loading_first_page",
            Self::FirstPageError => "first_page_error",
            Self::Ongoing => "ongoing",
            Self::LoadingMore => "loading_more",
            Self::SubsequentPageError => "subsequent_page_error",
            Self::Completed => "completed",
            Self::NoItemsFound => "no_items_found",
        }
    }

    /// Whether a fetch is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::LoadingFirstPage | Self::LoadingMore)
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageStatus {
    type Err = PagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL_VARIANTS
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| PagerError::InvalidInput(format!("unknown page status: {s}")))
    }
}
