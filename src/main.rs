use anyhow::bail;
use catalog_fetch::config::RetryConfig;
use catalog_fetch::{CatalogService, Config, FailurePolicy};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable, one line per event
    Compact,
    /// Multi-line human-readable output
    Pretty,
    /// One JSON object per event
    Json,
}

/// Command line and environment settings
///
/// Every flag overrides the matching field of the optional JSON config file.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "catalog-fetch",
    version,
    about = "Bounded concurrent product catalog fetcher with spreadsheet export"
)]
struct CliArgs {
    /// JSON configuration file
    ///
    /// Environment variable: `CONFIG_FILE`
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Address the HTTP API binds to
    ///
    /// Environment variable: `BIND_ADDRESS`
    #[arg(long, env = "BIND_ADDRESS")]
    bind: Option<SocketAddr>,

    /// Base URL of the catalog API
    ///
    /// Environment variable: `CATALOG_URL`
    #[arg(long, env = "CATALOG_URL")]
    catalog_url: Option<String>,

    /// Upload endpoint of the file service
    ///
    /// Environment variable: `UPLOAD_URL`
    #[arg(long, env = "UPLOAD_URL")]
    upload_url: Option<String>,

    /// Public base URL substituted into uploaded file links
    ///
    /// Environment variable: `PUBLIC_BASE_URL`
    #[arg(long, env = "PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Maximum simultaneous product requests
    ///
    /// Environment variable: `FETCH_CONCURRENCY`
    #[arg(long, env = "FETCH_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Product identifiers dispatched per wave
    ///
    /// Environment variable: `FETCH_CHUNK_SIZE`
    #[arg(long, env = "FETCH_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Retries per product request; negative uses the default of 3
    ///
    /// Environment variable: `RETRY_COUNT`
    #[arg(long, env = "RETRY_COUNT", allow_hyphen_values = true)]
    retries: Option<i64>,

    /// Seconds between retries; negative uses the default of 2
    ///
    /// Environment variable: `RETRY_DELAY_SECS`
    #[arg(long, env = "RETRY_DELAY_SECS", allow_hyphen_values = true)]
    retry_delay: Option<i64>,

    /// Fail the whole batch when any product request fails
    ///
    /// Environment variable: `STRICT_BATCH`
    #[arg(long, env = "STRICT_BATCH")]
    strict: bool,

    /// Spreadsheet output file
    ///
    /// Environment variable: `EXPORT_PATH`
    #[arg(long, env = "EXPORT_PATH")]
    export_path: Option<PathBuf>,

    /// Do not write spreadsheets
    ///
    /// Environment variable: `NO_EXPORT`
    #[arg(long, env = "NO_EXPORT")]
    no_export: bool,

    /// Report time zone as minutes east of UTC
    ///
    /// Environment variable: `UTC_OFFSET_MINUTES`
    #[arg(long, env = "UTC_OFFSET_MINUTES", allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,

    /// Skip loading the catalog at startup
    ///
    /// Environment variable: `SKIP_INITIAL_LOAD`
    #[arg(long, env = "SKIP_INITIAL_LOAD")]
    skip_initial_load: bool,

    /// Log output format
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

/// Settings resolved from the config file and CLI overrides
struct Settings {
    config: Config,
    skip_initial_load: bool,
    log_format: LogFormat,
}

impl TryFrom<CliArgs> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let mut config = match &args.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(bind) = args.bind {
            config.api.bind_address = bind;
        }
        if let Some(url) = args.catalog_url {
            config.catalog.base_url = url;
        }
        if let Some(url) = args.upload_url {
            config.upload.url = url;
        }
        if let Some(url) = args.public_base_url {
            config.upload.public_base_url = url;
        }
        if let Some(concurrency) = args.concurrency {
            if concurrency == 0 {
                bail!("FETCH_CONCURRENCY must be greater than 0");
            }
            config.fetch.concurrency = concurrency;
        }
        if let Some(chunk_size) = args.chunk_size {
            if chunk_size == 0 {
                bail!("FETCH_CHUNK_SIZE must be greater than 0");
            }
            config.fetch.chunk_size = chunk_size;
        }
        if args.retries.is_some() || args.retry_delay.is_some() {
            let retries = args.retries.unwrap_or(i64::from(config.retry.retries));
            let delay = args
                .retry_delay
                .unwrap_or_else(|| i64::try_from(config.retry.delay.as_secs()).unwrap_or(i64::MAX));
            config.retry = RetryConfig {
                jitter: config.retry.jitter,
                ..RetryConfig::from_raw(retries, delay)
            };
        }
        if args.strict {
            config.fetch.failure_policy = FailurePolicy::Strict;
        }
        if let Some(path) = args.export_path {
            config.export.path = path;
        }
        if args.no_export {
            config.export.enabled = false;
        }
        if let Some(minutes) = args.utc_offset_minutes {
            config.utc_offset_minutes = minutes;
        }

        config.validate()?;

        Ok(Self {
            config,
            skip_initial_load: args.skip_initial_load,
            log_format: args.log_format,
        })
    }
}

/// Best-effort `.env` loading; `.env.dev` is read too outside production
fn load_env_files() {
    let _ = dotenvy::dotenv();
    if std::env::var("ENV_MODE").map_or(true, |mode| mode != "production") {
        let _ = dotenvy::from_filename(".env.dev");
    }
}

fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_line_number(true)
                    .with_file(true)
                    .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                    .pretty(),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                    .compact(),
            )
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_files();
    let args = CliArgs::parse();
    let settings = Settings::try_from(args)?;

    init_logging(settings.log_format)?;
    tracing::info!(
        catalog = %settings.config.catalog.base_url,
        concurrency = settings.config.fetch.concurrency,
        chunk_size = settings.config.fetch.chunk_size,
        "Starting catalog-fetch"
    );

    let service = Arc::new(CatalogService::new(settings.config)?);

    if !settings.skip_initial_load {
        match service.load_catalog().await {
            Ok(count) => tracing::info!(count, "Initial catalog load complete"),
            Err(e) => tracing::warn!(
                error = %e,
                "Initial catalog load failed, identifiers will be loaded on first fetch"
            ),
        }
    }

    catalog_fetch::run_with_shutdown(service).await?;
    tracing::info!("Server exiting");
    Ok(())
}
