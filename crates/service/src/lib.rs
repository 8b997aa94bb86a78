//! Pagination engine for listing-pager
//!
//! Drives incremental loading of a listing: first page, visibility-triggered
//! load-more with single-flight deduplication, refresh and external
//! replacement.

#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::min_ident_chars, reason = "Short error vars are idiomatic")]
#![allow(clippy::module_name_repetitions, reason = "Types are re-exported at the crate root")]

mod cancel;
mod controller;
mod dedup;
mod source;
mod visibility;

pub use cancel::CancelToken;
pub use controller::{PaginationController, StatusChange, UpdateOptions};
pub use dedup::Deduplicator;
pub use source::PageSource;
pub use visibility::{TrackerRegistry, VisibilityTracker};

pub use listing_pager_core::{
    Footer, ItemView, PageStatus, PageView, PagerConfig, PagerError, Snapshot,
};
