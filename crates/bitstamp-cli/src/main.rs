/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: REST query results and streamed events printed as JSON
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or shutdown handling
*/

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use bitstamp_adapter::{BitstampClient, ClientConfig, StreamConnection};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "bitstamp", version, about = "Bitstamp trading API client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Query(QueryCommand),
    /// Print events from the given channels until Ctrl-C
    Stream {
        #[arg(required = true)]
        channels: Vec<String>,
    },
}

/// One-shot REST queries
#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// Ticker for a currency pair
    Ticker { pair: String },
    /// Order book for a currency pair
    OrderBook { pair: String },
    /// Account balances
    Balance,
    /// Open orders across all pairs
    OpenOrders,
    /// Transaction history
    Transactions,
    /// Cancel an open order
    Cancel { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(config_path = %args.config_path.display(), "starting bitstamp cli");
    let config = load_config(&args.config_path)?;

    match args.command {
        Command::Stream { channels } => run_stream(&config, &channels).await,
        Command::Query(query) => run_query(&config, query).await,
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<CliConfig> {
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    CliConfig::from_file(path_str).context("load config")
}

async fn run_query(config: &CliConfig, query: QueryCommand) -> Result<()> {
    let client = BitstampClient::with_config_and_base_url(
        config.credentials(),
        ClientConfig::default(),
        &config.api_url,
    )
    .context("build client")?;

    match query {
        QueryCommand::Ticker { pair } => print_json(&client.ticker(&pair).await?),
        QueryCommand::OrderBook { pair } => print_json(&client.order_book(&pair).await?),
        QueryCommand::Balance => print_json(&client.account_balance().await?),
        QueryCommand::OpenOrders => print_json(&client.open_orders().await?),
        QueryCommand::Transactions => print_json(&client.user_transactions().await?),
        QueryCommand::Cancel { id } => print_json(&client.cancel_order(id).await?),
    }
}

async fn run_stream(config: &CliConfig, channels: &[String]) -> Result<()> {
    let mut connection = StreamConnection::connect(config.stream_config())
        .await
        .context("connect stream")?;
    for channel in channels {
        connection
            .subscribe(channel)
            .await
            .with_context(|| format!("subscribe {channel}"))?;
    }

    let mut events = connection
        .take_events()
        .context("event receiver already taken")?;
    let mut errors = connection
        .take_errors()
        .context("error receiver already taken")?;

    let shutdown = CancellationToken::new();
    setup_signal_handler(shutdown.clone());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => print_json(&event)?,
                None => {
                    warn!("stream ended");
                    break;
                }
            },
            Some(err) = errors.recv() => {
                warn!(error = %err, retryable = err.is_retryable(), "stream error");
            }
        }
    }

    connection.close().await;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("render json")?;
    println!("{rendered}");
    Ok(())
}

fn setup_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown.cancel();
    });
}
