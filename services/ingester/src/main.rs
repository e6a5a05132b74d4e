//! Energy feed ingester service.
//!
//! Downloads market feed documents and weather observations, merges them
//! into one hourly table and writes it to SQLite.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ingester::{print_urls, IngesterConfig, IngestionPipeline};

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Market feed and weather ingester")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "INGESTER_CONFIG", default_value = "config/ingester.yaml")]
    config: PathBuf,

    /// Run once and exit (vs continuous polling)
    #[arg(long)]
    once: bool,

    /// Print request URLs (token redacted) and exit
    #[arg(long)]
    print_urls: bool,

    /// Read `<query>.xml` documents from this directory instead of the API
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Do not fetch weather observations
    #[arg(long)]
    skip_weather: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = IngesterConfig::from_yaml(&args.config)?;
    info!(
        config = %args.config.display(),
        queries = config.queries.len(),
        zone = %config.target_zone,
        table = %config.database.table,
        "Loaded configuration"
    );

    if args.print_urls {
        for url in print_urls(&config)? {
            println!("{}", url);
        }
        return Ok(());
    }

    let pipeline = IngestionPipeline::from_config(config, args.input_dir, args.skip_weather).await?;

    if args.once {
        info!("Running single ingestion cycle");
        pipeline.run_once().await?;
    } else {
        info!("Starting continuous polling");
        pipeline.run_forever().await?;
    }

    Ok(())
}
