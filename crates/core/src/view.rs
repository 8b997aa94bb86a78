//! View descriptors the rendering layer pattern-matches on.

use serde::Serialize;

use crate::snapshot::Snapshot;
use crate::status::PageStatus;

/// Indicator rendered after the last item of the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Footer {
    /// Next page is on its way.
    LoadingMore,
    /// Next page failed; render a retry affordance.
    Error { message: String },
    /// Nothing more to load.
    End,
}

impl Footer {
    /// Footer for the last item given the current status.
    #[must_use]
    pub fn for_status(status: PageStatus, error: Option<&str>) -> Option<Self> {
        match status {
            PageStatus::LoadingMore => Some(Self::LoadingMore),
            PageStatus::SubsequentPageError => Some(Self::Error {
                message: error.unwrap_or("failed to load more items").to_owned(),
            }),
            PageStatus::Completed => Some(Self::End),
            PageStatus::Initial
            | PageStatus::LoadingFirstPage
            | PageStatus::FirstPageError
            | PageStatus::Ongoing
            | PageStatus::NoItemsFound => None,
        }
    }
}

/// One rendered list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView<T> {
    pub index: usize,
    /// Stable reconciliation key.
    pub key: String,
    pub item: T,
    /// Whether a separator follows this item.
    pub separator: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
}

/// Whole-list descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageView<T> {
    Idle,
    LoadingFirstPage,
    FirstPageError { message: String },
    NoItemsFound,
    Items { status: PageStatus, items: Vec<ItemView<T>> },
}

impl<T: Clone> PageView<T> {
    /// Builds the descriptor for `snapshot` rendered in `status`.
    pub fn build<K>(snapshot: &Snapshot<T>, status: PageStatus, key: K) -> Self
    where
        K: Fn(&T) -> String,
    {
        match status {
            PageStatus::Initial => Self::Idle,
            PageStatus::LoadingFirstPage => Self::LoadingFirstPage,
            PageStatus::FirstPageError => Self::FirstPageError {
                message: snapshot.error.clone().unwrap_or_else(|| "failed to load".to_owned()),
            },
            PageStatus::NoItemsFound => Self::NoItemsFound,
            PageStatus::Ongoing
            | PageStatus::LoadingMore
            | PageStatus::SubsequentPageError
            | PageStatus::Completed => {
                let last = snapshot.items.len().saturating_sub(1);
                let items = snapshot
                    .items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| ItemView {
                        index,
                        key: key(item),
                        item: item.clone(),
                        separator: index != last,
                        footer: if index == last {
                            Footer::for_status(status, snapshot.error.as_deref())
                        } else {
                            None
                        },
                    })
                    .collect();
                Self::Items { status, items }
            },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match *self {
            Self::Idle => "idle",
            Self::LoadingFirstPage => "loading_first_page",
            Self::FirstPageError { .. } => "first_page_error",
            Self::NoItemsFound => "no_items_found",
            Self::Items { .. } => "items",
        }
    }

    /// Footer of the last item, if any.
    #[must_use]
    pub fn footer(&self) -> Option<&Footer> {
        match self {
            Self::Items { items, .. } => items.last().and_then(|item| item.footer.as_ref()),
            _ => None,
        }
    }
}
