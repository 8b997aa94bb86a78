use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use listing_pager_core::{PageStatus, PageView, PagerConfig};
use listing_pager_service::{PaginationController, UpdateOptions};
use serde::Serialize;

use crate::inventory::{self, InventorySource, Vehicle};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwitchReport {
    from: String,
    to: String,
    status_before_switch: PageStatus,
    load_more_result: PageStatus,
    status: PageStatus,
    view: PageView<Vehicle>,
}

/// Loads `from`, starts a load-more and swaps the listing to `to` while the
/// fetch is still running. The stale page must never appear.
pub(crate) async fn run(
    from: String,
    to: String,
    stock: u32,
    latency_ms: u64,
    config: PagerConfig,
) -> Result<()> {
    let source = Arc::new(
        InventorySource::new(inventory::generate(stock), Some(from.clone()), config.page_size)
            .with_latency(Duration::from_millis(latency_ms.max(1))),
    );
    let controller = PaginationController::new(Arc::clone(&source), config);
    let status_before_switch = controller.initial().await;

    let (load_more_result, status) = tokio::join!(controller.load_more(), async {
        tokio::task::yield_now().await;
        source.set_make(Some(to.clone()));
        let replacement = source.first_page_now();
        tracing::info!(make = %to, total = replacement.total, "filters changed");
        controller.update_pagination(replacement, UpdateOptions::from_config(&config)).await
    });

    let report = SwitchReport {
        from,
        to,
        status_before_switch,
        load_more_result,
        status,
        view: controller.view(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
