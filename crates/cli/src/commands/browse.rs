use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use listing_pager_core::{Footer, PageStatus, PagerConfig};
use listing_pager_service::PaginationController;
use serde::Serialize;

use crate::inventory::{self, InventorySource, Vehicle};

/// Upper bound on simulated scroll steps, in case a source never completes.
const MAX_STEPS: usize = 1_000;

#[derive(Debug, Clone)]
pub(crate) struct BrowseArgs {
    pub make: Option<String>,
    pub stock: u32,
    pub fail_page: Option<u32>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
struct Step {
    action: &'static str,
    status: PageStatus,
    page: u32,
    items: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrowseReport {
    make: Option<String>,
    config: PagerConfig,
    steps: Vec<Step>,
    status: PageStatus,
    page: u32,
    page_count: u32,
    total: u64,
    loaded: usize,
    footer: Option<Footer>,
}

type Controller = PaginationController<Vehicle, InventorySource>;

fn record(steps: &mut Vec<Step>, action: &'static str, controller: &Controller) {
    let snapshot = controller.snapshot();
    steps.push(Step {
        action,
        status: controller.status(),
        page: snapshot.page,
        items: snapshot.items.len(),
    });
}

pub(crate) async fn run(args: BrowseArgs, config: PagerConfig) -> Result<()> {
    let mut source = InventorySource::new(
        inventory::generate(args.stock),
        args.make.clone(),
        config.page_size,
    )
    .with_latency(Duration::from_millis(args.latency_ms));
    if let Some(page) = args.fail_page {
        source = source.failing_page(page);
    }
    let controller = PaginationController::new(Arc::new(source), config);

    let mut steps = Vec::new();
    controller.initial().await;
    record(&mut steps, "initial", &controller);

    let mut retried = false;
    for _ in 0..MAX_STEPS {
        match controller.status() {
            PageStatus::Ongoing => {
                let tracker = controller.track(controller.trigger_index());
                if !controller.report_visibility(&tracker, true).await {
                    tracing::warn!(index = tracker.index(), "trigger item did not request a page");
                    break;
                }
                record(&mut steps, "scroll", &controller);
            },
            PageStatus::FirstPageError if !retried => {
                retried = true;
                controller.trigger_initial().await;
                record(&mut steps, "retry_first_page", &controller);
            },
            PageStatus::SubsequentPageError if !retried => {
                retried = true;
                controller.trigger_load_more().await;
                record(&mut steps, "retry_load_more", &controller);
            },
            _ => break,
        }
    }

    let snapshot = controller.snapshot();
    let report = BrowseReport {
        make: args.make,
        config,
        steps,
        status: controller.status(),
        page: snapshot.page,
        page_count: snapshot.page_count,
        total: snapshot.total,
        loaded: snapshot.items.len(),
        footer: controller.view().footer().cloned(),
    };
    tracing::info!(status = %report.status, loaded = report.loaded, "browse finished");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
