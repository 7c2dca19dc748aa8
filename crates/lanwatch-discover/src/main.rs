//! CLI entry point for the lanwatch LAN scanner.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use lanwatch_core::Starter;
use lanwatch_store::{FileScanStore, ScanQuery, ScanStore, DEFAULT_PAGE_SIZE};

use lanwatch_discover::config::DiscoverConfig;
use lanwatch_discover::scheduler::{run_single_scan, ScanScheduler};
use lanwatch_discover::session::Pipeline;
use lanwatch_discover::targets::SystemInterfaces;

#[derive(Parser)]
#[command(name = "lanwatch")]
#[command(about = "Discover live hosts on the local networks and record each scan")]
struct Cli {
    /// Run a single scan and exit.
    #[arg(long)]
    once: bool,

    /// Run as daemon with scheduled scans.
    #[arg(long)]
    daemon: bool,

    /// Print stored scans as JSON, newest first.
    #[arg(long)]
    list: bool,

    /// Scans to skip when listing.
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Maximum number of scans to list.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    limit: usize,

    /// Interfaces to leave out (comma-separated or repeated).
    #[arg(short, long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Custom ranges to scan: CIDR, dotted ranges like 10.0.1-2.1-50, or bare addresses.
    #[arg(short, long, value_delimiter = ',')]
    subs: Vec<String>,

    /// Addresses probed per batch.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Starter recorded for a --once scan: manual, scheduler, api.
    #[arg(long, default_value = "manual")]
    starter: Starter,

    /// Config file prefix (default: lanwatch).
    #[arg(short, long, default_value = "lanwatch")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let mut discover_config = load_discover_config(&cli.config)?;
    apply_overrides(&mut discover_config, &cli);
    discover_config.validate()?;

    let store = FileScanStore::new(&discover_config.store_dir)?;
    tracing::info!(path = %store.root().display(), "Scan store ready");

    if cli.list {
        let query = ScanQuery {
            offset: cli.offset,
            limit: cli.limit,
            starter: None,
        };
        let scans = store.list_scans(&query)?;
        println!("{}", serde_json::to_string_pretty(&scans)?);
    } else if cli.once {
        let pipeline = Pipeline::system(&discover_config)?;
        let summary = run_single_scan(
            &discover_config,
            &SystemInterfaces,
            &pipeline,
            &store,
            cli.starter,
        )
        .await?;
        if summary.failed_batches > 0 {
            tracing::warn!(
                scan_id = %summary.scan_id,
                failed_batches = summary.failed_batches,
                "Some batches were not stored"
            );
        }
    } else if cli.daemon {
        let pipeline = Pipeline::system(&discover_config)?;
        let sched = ScanScheduler::new(
            discover_config,
            pipeline,
            Arc::new(store),
            Arc::new(SystemInterfaces),
        );
        sched.run().await?;
    } else {
        anyhow::bail!("Specify --once (one scan), --daemon (scheduled scanning) or --list");
    }

    Ok(())
}

fn apply_overrides(config: &mut DiscoverConfig, cli: &Cli) {
    if !cli.exclude.is_empty() {
        config.exclude = Some(cli.exclude.clone());
    }
    if !cli.subs.is_empty() {
        config.subs = Some(cli.subs.clone());
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("LANWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("discover.exclude")
                .with_list_parse_key("discover.subs"),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(DiscoverConfig::default()),
        Err(e) => Err(e.into()),
    }
}
