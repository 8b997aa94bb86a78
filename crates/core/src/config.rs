//! Pager configuration with env var overrides.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INVISIBLE_ITEMS_THRESHOLD, DEFAULT_PAGE_SIZE, DEFAULT_UPDATE_DELAY_MS,
    ENV_INVISIBLE_THRESHOLD, ENV_PAGE_SIZE, ENV_UPDATE_DELAY_MS, MAX_PAGE_SIZE,
};

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently.
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn env_parse_with_default<T: FromStr + std::fmt::Display>(var: &str, default: T) -> T {
    let Ok(raw) = std::env::var(var) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                var,
                value = %raw,
                default = %default,
                "invalid env var value, using default"
            );
            default
        },
    }
}

/// Tunables shared by every controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PagerConfig {
    /// How many trailing items may be unseen when the next page is requested.
    pub invisible_items_threshold: usize,
    /// Page size handed to sources that let the caller pick one.
    pub page_size: u32,
    /// Artificial delay before an external update is applied, in milliseconds.
    pub update_delay_ms: u64,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            invisible_items_threshold: DEFAULT_INVISIBLE_ITEMS_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            update_delay_ms: DEFAULT_UPDATE_DELAY_MS,
        }
    }
}

impl PagerConfig {
    /// Builds a config from `LISTING_PAGER_*` env vars, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            invisible_items_threshold: env_parse_with_default(
                ENV_INVISIBLE_THRESHOLD,
                DEFAULT_INVISIBLE_ITEMS_THRESHOLD,
            ),
            page_size: env_parse_with_default(ENV_PAGE_SIZE, DEFAULT_PAGE_SIZE),
            update_delay_ms: env_parse_with_default(ENV_UPDATE_DELAY_MS, DEFAULT_UPDATE_DELAY_MS),
        }
        .normalized()
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.invisible_items_threshold = threshold;
        self.normalized()
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self.normalized()
    }

    #[must_use]
    pub const fn with_update_delay_ms(mut self, delay_ms: u64) -> Self {
        self.update_delay_ms = delay_ms;
        self
    }

    /// Delay before external updates, `None` when disabled.
    #[must_use]
    pub const fn update_delay(&self) -> Option<Duration> {
        if self.update_delay_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.update_delay_ms))
        }
    }

    /// Clamps the page size into `1..=MAX_PAGE_SIZE` and the threshold to at
    /// least 1, so the trigger index always names a loaded item.
    fn normalized(mut self) -> Self {
        if self.invisible_items_threshold == 0 {
            tracing::warn!("invisible items threshold of 0 raised to 1");
            self.invisible_items_threshold = 1;
        }
        let clamped = self.page_size.clamp(1, MAX_PAGE_SIZE);
        if clamped != self.page_size {
            tracing::warn!(requested = self.page_size, clamped, "page size out of range");
            self.page_size = clamped;
        }
        self
    }
}
