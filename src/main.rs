use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use candle_batch::assembler::BatchAssembler;
use candle_batch::coinbase::CoinbaseRestClient;
use candle_batch::config::Config;
use candle_batch::model::candle::Candle;
use candle_batch::window::Timestamp;

#[derive(Parser, Debug)]
#[command(name = "candle-batch")]
#[command(about = "Download OHLCV candles from Coinbase in rate-limited batches")]
#[command(version)]
struct Cli {
    /// Product id, e.g. BTC-USD
    #[arg(short, long)]
    product: String,

    /// Bucket size in seconds
    #[arg(short, long, default_value_t = 3600)]
    granularity: u32,

    /// Range start, epoch seconds or ISO-8601. Omit with --end for the latest candles.
    #[arg(short, long, requires = "end")]
    start: Option<String>,

    /// Range end, same representation as --start
    #[arg(short, long, requires = "start")]
    end: Option<String>,

    /// TOML config file (defaults to config/default.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct CandleRecord<'a> {
    product_id: &'a str,
    #[serde(flatten)]
    candle: &'a Candle,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    // stdout carries the candles, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        product_id = %cli.product,
        granularity = cli.granularity,
        rest_url = %config.coinbase.rest_base_url(),
        "Starting candle-batch"
    );

    let client = CoinbaseRestClient::connect(&config.coinbase)
        .await
        .context("failed to connect to Coinbase")?;
    let assembler = BatchAssembler::new(
        Arc::new(client),
        config.rate_limits.limiter(),
        config.batch.batch_config(),
    );

    let result = match (&cli.start, &cli.end) {
        (Some(start), Some(end)) => {
            assembler
                .assemble(
                    &cli.product,
                    &Timestamp::parse(start),
                    &Timestamp::parse(end),
                    cli.granularity,
                )
                .await
        }
        (None, None) => assembler.assemble_latest(&cli.product, cli.granularity).await,
        _ => bail!("--start and --end must be given together"),
    }
    .with_context(|| format!("candle batch for {} failed", cli.product))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for candle in result.candles() {
        let record = CandleRecord {
            product_id: &cli.product,
            candle,
        };
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    if !result.is_complete() {
        tracing::warn!(
            windows_fetched = result.windows_fetched(),
            windows_planned = result.windows_planned(),
            "Batch stopped early, output is partial"
        );
    }

    Ok(())
}
