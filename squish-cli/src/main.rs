//! Squish CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use squish_cache::TtlCache;
use squish_compression::{CompressionHandler, CompressionOutcome, NO_COMPRESSION_HEADER};
use squish_config::{Config, LoggingConfig};
use squish_core::{RequestContext, ResponseBody, ResponseContext};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "squish")]
#[command(about = "HTTP response compression pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a file through the compression pipeline as if it were a response body
    Compress {
        /// Response body to compress
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the resulting body
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long, env = "SQUISH_CONFIG")]
        config: Option<PathBuf>,

        /// Accept-Encoding header of the simulated request
        #[arg(short, long, default_value = "gzip, deflate, br")]
        accept_encoding: String,

        /// Treat the input as a JSON document
        #[arg(long)]
        json: bool,

        /// Send the x-no-compression header
        #[arg(long)]
        no_compression: bool,

        /// Number of identical requests to run (repeats are served from the cache)
        #[arg(long, default_value_t = 1)]
        repeat: usize,

        /// Log level, overrides the configuration
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "squish.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compress {
            input,
            output,
            config,
            accept_encoding,
            json,
            no_compression,
            repeat,
            log_level,
        } => {
            let mut config = match config {
                Some(path) => squish_config::load(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => Config::default(),
            };
            if let Some(level) = log_level {
                config.logging.level = level;
            }
            init_tracing(&config.logging)?;

            let body = read_body(&input, json)?;
            let cache = TtlCache::from_config(&config.cache);
            let handler = CompressionHandler::with_cache(config.compression, cache)?;

            let mut request =
                RequestContext::default().with_header("accept-encoding", &accept_encoding);
            if no_compression {
                request = request.with_header(NO_COMPRESSION_HEADER, "1");
            }

            let mut last = None;
            for _ in 0..repeat.max(1) {
                let mut response = ResponseContext::new(body.clone());
                let outcome = handler.handle_compression(&request, &mut response).await;
                last = Some((outcome, response));
            }
            let Some((outcome, response)) = last else {
                return Ok(());
            };

            let original = body.serialize()?.map(|s| s.to_bytes()).unwrap_or_default();
            let sent = outcome.body().cloned().unwrap_or_else(|| original.clone());

            if let Some(path) = output {
                std::fs::write(&path, &sent)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), bytes = sent.len(), "Body written");
            }

            let headers: serde_json::Map<String, serde_json::Value> = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        serde_json::Value::from(value.to_str().unwrap_or_default()),
                    )
                })
                .collect();

            let report = serde_json::json!({
                "outcome": describe(&outcome),
                "original_bytes": original.len(),
                "sent_bytes": sent.len(),
                "headers": headers,
                "stats": handler.stats(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Validate { config } => {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();

            tracing::info!("Validating configuration: {}", config.display());

            match squish_config::load(&config) {
                Ok(cfg) => {
                    let compression = &cfg.compression;
                    tracing::info!("✓ Configuration is valid");
                    tracing::info!("  Algorithm: {}", compression.compressor().algorithm());
                    tracing::info!("  Level: {}", compression.effective_level());
                    tracing::info!("  Threshold: {} bytes", compression.threshold);
                    tracing::info!(
                        "  Cache TTL: {}",
                        if compression.caching_enabled() {
                            format!("{:?}", compression.cache_ttl)
                        } else {
                            "disabled".to_string()
                        }
                    );
                    tracing::info!("  Streaming: {}", compression.use_stream);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("squish");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn read_body(path: &Path, json: bool) -> Result<ResponseBody> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?;

    if json {
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        Ok(ResponseBody::from(value))
    } else {
        Ok(ResponseBody::Text(content))
    }
}

fn describe(outcome: &CompressionOutcome) -> serde_json::Value {
    match outcome {
        CompressionOutcome::Skipped(reason) => serde_json::json!({
            "skipped": reason.as_str(),
        }),
        CompressionOutcome::Compressed {
            encoding,
            cache_hit,
            ..
        } => serde_json::json!({
            "compressed": encoding,
            "cache_hit": cache_hit,
        }),
        CompressionOutcome::Fallback(_) => serde_json::json!({
            "fallback": "identity",
        }),
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level: {}", logging.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
