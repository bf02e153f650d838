use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use metadata_api::config;
use metadata_api::metrics;
use metadata_api::{BatchLookupRequest, MetadataService, MetadataStore};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version = VERSION, about = "Query track, album and artist metadata from a SQLite catalog")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite catalog database.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub catalog_db: Option<PathBuf>,

    /// Path to the track annotations database.
    /// Defaults to track_files.sqlite3 next to the catalog.
    #[clap(long, value_parser = parse_path)]
    pub annotations_db: Option<PathBuf>,

    /// Number of read-only connections per database.
    #[clap(long, default_value_t = 8)]
    pub read_pool_size: usize,

    /// Search deadline in seconds.
    #[clap(long, default_value_t = 10)]
    pub search_timeout_sec: u64,

    /// Maximum number of ids across all categories of a batch.
    #[clap(long, default_value_t = 400)]
    pub max_batch_items: usize,

    /// Print Prometheus metrics to stderr before exiting.
    #[clap(long)]
    pub dump_metrics: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// All tracks recorded under an ISRC.
    Isrc { isrc: String },
    /// A single track by id.
    Track { id: String },
    /// A single artist by id.
    Artist { id: String },
    /// A single album by id.
    Album { id: String },
    /// Every track on an album, in disc and track order.
    AlbumTracks { album_id: String },
    /// Artists whose name contains the query.
    SearchArtist {
        query: String,
        /// Result cap; 0 uses the configured default.
        #[clap(long, default_value_t = 0)]
        limit: i64,
    },
    /// Tracks whose name contains the query.
    SearchTrack {
        query: String,
        #[clap(long, default_value_t = 0)]
        limit: i64,
    },
    /// Multi-category lookup. Each flag takes a comma separated id list.
    Batch {
        #[clap(long, value_delimiter = ',')]
        tracks: Vec<String>,
        #[clap(long, value_delimiter = ',')]
        artists: Vec<String>,
        #[clap(long, value_delimiter = ',')]
        albums: Vec<String>,
        #[clap(long, value_delimiter = ',')]
        isrcs: Vec<String>,
    },
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            catalog_db: args.catalog_db.clone(),
            annotations_db: args.annotations_db.clone(),
            read_pool_size: args.read_pool_size,
            search_timeout_secs: args.search_timeout_sec,
            max_batch_items: args.max_batch_items,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", output);
    Ok(())
}

fn print_found<T: Serialize>(kind: &str, id: &str, value: Option<T>) -> Result<()> {
    if value.is_none() {
        warn!("{} {} not found", kind, id);
    }
    print_json(&value)
}

async fn run_command(
    service: &MetadataService,
    token: &CancellationToken,
    command: Command,
) -> Result<()> {
    match command {
        Command::Isrc { isrc } => print_json(&service.tracks_by_isrc(token, &isrc).await?),
        Command::Track { id } => print_found("Track", &id, service.track(token, &id).await?),
        Command::Artist { id } => print_found("Artist", &id, service.artist(token, &id).await?),
        Command::Album { id } => print_found("Album", &id, service.album(token, &id).await?),
        Command::AlbumTracks { album_id } => {
            print_json(&service.album_tracks(token, &album_id).await?)
        }
        Command::SearchArtist { query, limit } => {
            print_json(&service.search_artists(token, &query, limit).await?)
        }
        Command::SearchTrack { query, limit } => {
            print_json(&service.search_tracks(token, &query, limit).await?)
        }
        Command::Batch {
            tracks,
            artists,
            albums,
            isrcs,
        } => {
            let request = BatchLookupRequest {
                tracks,
                artists,
                albums,
                isrcs,
            };
            let response = service.batch_lookup(token, request).await?;
            for (category, message) in &response.errors {
                warn!("{}: {}", category, message);
            }
            print_json(&response)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  catalog_db: {:?}", app_config.catalog_db);
    info!("  annotations_db: {:?}", app_config.annotations_db);
    info!("  read_pool_size: {}", app_config.read_pool_size);

    metrics::init_metrics();

    let store = Arc::new(MetadataStore::open(&app_config.store_config())?);
    let service = MetadataService::new(store, app_config.service_settings());

    let shutdown_token = CancellationToken::new();
    {
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, cancelling in-flight queries");
                shutdown_token.cancel();
            }
        });
    }

    let result = run_command(&service, &shutdown_token, cli_args.command).await;

    if cli_args.dump_metrics {
        eprintln!("{}", metrics::render_metrics());
    }
    result
}
