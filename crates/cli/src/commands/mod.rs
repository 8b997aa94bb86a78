pub(crate) mod browse;
pub(crate) mod switch;

use anyhow::Result;
use listing_pager_core::PageStatus;

pub(crate) fn run_statuses() -> Result<()> {
    let names: Vec<&str> = PageStatus::ALL_VARIANTS.iter().map(PageStatus::as_str).collect();
    println!("{}", serde_json::to_string_pretty(&names)?);
    Ok(())
}
