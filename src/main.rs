use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chainhook_ingest::config::{Config, STREAM_ID_ENV};
use chainhook_ingest::indexer::payload::ChainhookPayload;
use chainhook_ingest::pipeline::{IngestPipeline, JsonLinesSink, TextSink};
use chainhook_ingest::replay::{BlockSelector, ReplayClient, ReplayError};
use chainhook_ingest::tokens::registry::DEFAULT_DECIMALS;

#[derive(Parser)]
#[command(
    name = "chainhook-ingest",
    about = "Classify chainhook payloads and replay historical blocks",
    version
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    /// Output format for classified events
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a payload read from a file, or from stdin when omitted or `-`
    Classify {
        #[arg(short, long)]
        payload: Option<PathBuf>,
    },

    /// Replay one block and classify it
    Replay {
        /// Chainhook UUID (defaults to replay.stream_id / CHAINHOOK_UUID)
        #[arg(short, long)]
        stream: Option<String>,
        #[arg(long, conflicts_with = "hash", required_unless_present = "hash")]
        height: Option<u64>,
        /// 0x-prefixed index block hash
        #[arg(long)]
        hash: Option<String>,
    },

    /// Replay an inclusive range of block heights and classify each
    #[command(name = "replay-range")]
    ReplayRange {
        #[arg(short, long)]
        stream: Option<String>,
        #[arg(long)]
        from: u64,
        #[arg(long)]
        to: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One human-readable line per event
    Text,
    /// One tagged JSON object per event
    Jsonl,
    /// The full classification result as a JSON document
    Json,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so stdout stays machine-readable (set RUST_LOG=debug for detail)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let pipeline = IngestPipeline::from_config(&config);

    tracing::info!(
        assets = pipeline.registry().len(),
        mode = ?config.matching.mode,
        "Configuration loaded from {}",
        cli.config
    );
    if pipeline.registry().is_empty() {
        tracing::warn!(
            "No [[assets]] configured; amounts are shown with {} decimals",
            DEFAULT_DECIMALS
        );
    }

    match cli.command {
        Commands::Classify { payload } => {
            let payload = read_payload(payload)?;
            emit(&pipeline, &payload, cli.format)?;
        }
        Commands::Replay {
            stream,
            height,
            hash,
        } => {
            let stream = resolve_stream(stream, &config)?;
            let selector = match (height, hash) {
                (Some(h), None) => BlockSelector::Height(h),
                (None, Some(h)) => BlockSelector::IndexBlockHash(h),
                _ => return Err(eyre::eyre!("Exactly one of --height or --hash is required")),
            };

            let client = ReplayClient::new(&config.replay)?;
            let shutdown = shutdown_on_ctrl_c();

            match client
                .replay_block_cancellable(&stream, &selector, &shutdown)
                .await
            {
                Ok(Some(payload)) => emit(&pipeline, &payload, cli.format)?,
                Ok(None) => {
                    tracing::warn!(stream = %stream, block = %selector, "Block not available yet");
                }
                Err(ReplayError::Cancelled) => {
                    tracing::info!("Replay cancelled");
                }
                Err(e) => return Err(eyre::eyre!("Replay of {} failed: {}", selector, e)),
            }
        }
        Commands::ReplayRange { stream, from, to } => {
            let stream = resolve_stream(stream, &config)?;
            let client = ReplayClient::new(&config.replay)?;
            let shutdown = shutdown_on_ctrl_c();

            let results = tokio::select! {
                r = client.replay_range(&stream, from, to) => r?,
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received, abandoning range replay");
                    return Ok(());
                }
            };

            let mut missing = 0u64;
            for (height, payload) in results {
                match payload {
                    Some(payload) => emit(&pipeline, &payload, cli.format)?,
                    None => {
                        missing += 1;
                        tracing::warn!(block = height, "Block not available yet");
                    }
                }
            }
            tracing::info!(from, to, missing, "Range replay complete");
        }
    }

    Ok(())
}

fn resolve_stream(flag: Option<String>, config: &Config) -> eyre::Result<String> {
    flag.or_else(|| config.replay.stream_id.clone()).ok_or_else(|| {
        eyre::eyre!(
            "No stream id: pass --stream, set replay.stream_id, or export {}",
            STREAM_ID_ENV
        )
    })
}

fn read_payload(path: Option<PathBuf>) -> eyre::Result<ChainhookPayload> {
    let content = match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(&p)
            .map_err(|e| eyre::eyre!("Failed to read payload '{}': {}", p.display(), e))?,
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    serde_json::from_str(&content).map_err(|e| eyre::eyre!("Failed to parse payload: {}", e))
}

fn emit(pipeline: &IngestPipeline, payload: &ChainhookPayload, format: OutputFormat) -> eyre::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Json => {
            let events = pipeline.classify(payload);
            serde_json::to_writer_pretty(&mut out, &events)?;
            writeln!(out)?;
        }
        OutputFormat::Jsonl => {
            let mut sink = JsonLinesSink::new(&mut out);
            pipeline.process(payload, &mut sink)?;
        }
        OutputFormat::Text => {
            let mut sink = TextSink::new(&mut out, pipeline.registry().clone());
            pipeline.process(payload, &mut sink)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            token.cancel();
        }
    });
    shutdown
}
