//! In-memory vehicle inventory served page by page.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use listing_pager_core::{PagerError, Result, Snapshot};
use listing_pager_service::{CancelToken, PageSource};
use serde::Serialize;

const MAKES: &[(&str, &[&str])] = &[
    ("Toyota", &["Corolla", "Camry", "RAV4", "Prius"]),
    ("Honda", &["Civic", "Accord", "CR-V"]),
    ("Ford", &["Focus", "Mustang", "F-150", "Escape"]),
    ("BMW", &["320i", "X3", "M4"]),
    ("Tesla", &["Model 3", "Model Y"]),
    ("Lada", &["Niva"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Vehicle {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub price_usd: u32,
}

/// Deterministic stock of `size` vehicles.
pub(crate) fn generate(size: u32) -> Vec<Vehicle> {
    (0..size)
        .filter_map(|n| {
            let (make, models) = MAKES.get(n as usize % MAKES.len())?;
            let model = models.get((n as usize / MAKES.len()) % models.len())?;
            Some(Vehicle {
                id: format!("veh-{n:04}"),
                make: (*make).to_owned(),
                model: (*model).to_owned(),
                year: 2010 + u16::try_from(n.wrapping_mul(7) % 15).unwrap_or(0),
                price_usd: 8_000 + n.wrapping_mul(1_373) % 62_000,
            })
        })
        .collect()
}

/// Serves the inventory filtered by make.
pub(crate) struct InventorySource {
    stock: Vec<Vehicle>,
    make: RwLock<Option<String>>,
    page_size: u32,
    latency: Duration,
    failing_pages: Mutex<HashSet<u32>>,
}

impl InventorySource {
    pub(crate) fn new(stock: Vec<Vehicle>, make: Option<String>, page_size: u32) -> Self {
        Self {
            stock,
            make: RwLock::new(make),
            page_size: page_size.max(1),
            latency: Duration::ZERO,
            failing_pages: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The first fetch of `page` fails; a retry succeeds.
    pub(crate) fn failing_page(self, page: u32) -> Self {
        self.failing_pages.lock().unwrap_or_else(PoisonError::into_inner).insert(page);
        self
    }

    /// Switches the make filter used by subsequent fetches.
    pub(crate) fn set_make(&self, make: Option<String>) {
        *self.make.write().unwrap_or_else(PoisonError::into_inner) = make;
    }

    fn matching(&self) -> Vec<&Vehicle> {
        let make = self.make.read().unwrap_or_else(PoisonError::into_inner);
        self.stock
            .iter()
            .filter(|v| make.as_deref().is_none_or(|m| v.make.eq_ignore_ascii_case(m)))
            .collect()
    }

    fn page_items(&self, page: u32) -> (Vec<Vehicle>, u32, u64) {
        let matching = self.matching();
        let total = matching.len();
        let size = self.page_size as usize;
        let page_count = u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX).max(1);
        let start = (page.saturating_sub(1) as usize).saturating_mul(size);
        let items = matching.into_iter().skip(start).take(size).cloned().collect();
        (items, page_count, total as u64)
    }

    /// First page computed without latency, for pushing into a controller.
    pub(crate) fn first_page_now(&self) -> Snapshot<Vehicle> {
        let (items, page_count, total) = self.page_items(1);
        Snapshot::first_page(items, self.page_size, page_count, total)
    }

    async fn simulate(&self, page: u32, cancel: &CancelToken) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if cancel.is_cancelled() {
            return Err(PagerError::Cancelled);
        }
        let failed =
            self.failing_pages.lock().unwrap_or_else(PoisonError::into_inner).remove(&page);
        if failed {
            return Err(PagerError::Source {
                context: format!("inventory page {page}"),
                message: "upstream timed out".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PageSource<Vehicle> for InventorySource {
    async fn fetch_initial(&self, cancel: CancelToken) -> Result<Snapshot<Vehicle>> {
        self.simulate(1, &cancel).await?;
        tracing::debug!(page = 1, "inventory page served");
        Ok(self.first_page_now())
    }

    async fn fetch_load_more(
        &self,
        previous: Snapshot<Vehicle>,
        next_page: u32,
        cancel: CancelToken,
    ) -> Result<Snapshot<Vehicle>> {
        self.simulate(next_page, &cancel).await?;
        let (items, page_count, total) = self.page_items(next_page);
        tracing::debug!(page = next_page, items = items.len(), "inventory page served");
        Ok(previous.append_page(next_page, items, page_count, total))
    }

    fn item_key(&self, item: &Vehicle) -> String {
        item.id.clone()
    }
}
