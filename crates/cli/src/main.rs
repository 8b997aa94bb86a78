use anyhow::Result;
use clap::{Parser, Subcommand};
use listing_pager_core::PagerConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod inventory;

use commands::browse::BrowseArgs;

#[derive(Parser)]
#[command(name = "listing-pager")]
#[command(about = "Browse a paginated vehicle listing", long_about = None)]
struct Cli {
    /// Trailing items that may stay unseen before the next page is requested
    #[arg(long, global = true)]
    threshold: Option<usize>,
    /// Items per page
    #[arg(long, global = true)]
    page_size: Option<u32>,
    /// Size of the generated inventory
    #[arg(long, global = true, default_value = "120")]
    stock: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll through a listing until it completes
    Browse {
        #[arg(short, long)]
        make: Option<String>,
        /// Fail the first fetch of this page once
        #[arg(long)]
        fail_page: Option<u32>,
        #[arg(long, default_value = "0")]
        latency_ms: u64,
    },
    /// Change the make filter while a page is loading
    Switch {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "20")]
        latency_ms: u64,
    },
    /// List every listing status
    Statuses,
}

impl Cli {
    fn config(&self) -> PagerConfig {
        let mut config = PagerConfig::from_env();
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Commands::Browse { make, fail_page, latency_ms } => {
            let args = BrowseArgs { make, stock: cli.stock, fail_page, latency_ms };
            commands::browse::run(args, config).await?;
        },
        Commands::Switch { from, to, latency_ms } => {
            commands::switch::run(from, to, cli.stock, latency_ms, config).await?;
        },
        Commands::Statuses => commands::run_statuses()?,
    }

    Ok(())
}
