//! Shared constants for listing-pager.

/// Number of trailing items that may still be off-screen when the next page
/// is requested. The item at `len - threshold` is the trigger item.
pub const DEFAULT_INVISIBLE_ITEMS_THRESHOLD: usize = 3;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default artificial delay before an external update is applied (disabled).
pub const DEFAULT_UPDATE_DELAY_MS: u64 = 0;

/// Upper bound for a configured page size.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Env var overriding [`DEFAULT_INVISIBLE_ITEMS_THRESHOLD`].
pub const ENV_INVISIBLE_THRESHOLD: &str = "LISTING_PAGER_INVISIBLE_THRESHOLD";

/// Env var overriding [`DEFAULT_PAGE_SIZE`].
pub const ENV_PAGE_SIZE: &str = "LISTING_PAGER_PAGE_SIZE";

/// Env var overriding [`DEFAULT_UPDATE_DELAY_MS`].
pub const ENV_UPDATE_DELAY_MS: &str = "LISTING_PAGER_UPDATE_DELAY_MS";
