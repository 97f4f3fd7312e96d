//! CLI entry point for the transit board.
//!
//! Provides subcommands for listing trains on a line, enumerating stations,
//! inspecting a single feed payload, and sampling a line over time.

use anyhow::Result;
use bytes::Bytes;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use gtfs_rt_board::{
    aggregator::Aggregator,
    board::TransitBoard,
    catalog::Catalog,
    config::Settings,
    fetch::{BasicClient, FeedSource, FileFeedSource, HttpClient, HttpFeedSource, auth::ApiKey},
    model::Agency,
    output::{append_records, append_trips, print_json, print_pretty, render_board},
    parser::decode,
    reference::{ReferenceHandle, StaticSources},
    stats::EnvelopeStats,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type Source = HttpFeedSource<Box<dyn HttpClient>>;

#[derive(Parser)]
#[command(name = "gtfs_rt_board")]
#[command(about = "Live train board built from GTFS-realtime feeds", long_about = None)]
struct Cli {
    /// Directory with the static GTFS tables (overrides GTFS_STATIC_DIR)
    #[arg(long, global = true)]
    static_dir: Option<PathBuf>,

    /// Which built-in feed catalog to use (ignored when FEED_CATALOG_PATH is set)
    #[arg(long, value_enum, global = true, default_value_t = System::Subway)]
    system: System,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum System {
    Subway,
    Lirr,
}

#[derive(Subcommand)]
enum Commands {
    /// Show trains for a line, or ALL
    Trains {
        #[arg(short, long, default_value = "ALL")]
        line: String,

        /// Emit the view as JSON instead of a text board
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Order trips by route id
        #[arg(long, default_value_t = false)]
        sort: bool,
    },
    /// List every station in the static tables
    Stations {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Decode a single feed from a file or URL and report field coverage
    Decode {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Extension schema to apply (generic, nyct, railroad)
        #[arg(short, long, default_value = "generic")]
        agency: Agency,

        /// CSV file to append the coverage record to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Sample a line repeatedly
    Watch {
        #[arg(short, long, default_value = "ALL")]
        line: String,

        /// Seconds between samples
        #[arg(short, long, default_value_t = 30)]
        interval: u64,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        samples: usize,

        /// CSV file to append one row per trip to
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Reload the static tables every K samples (0 = never)
        #[arg(long, default_value_t = 0)]
        reload_every: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_board.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_board.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("RUST_LOG")
                .from_env_lossy(),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::DEBUG.into())
                .with_env_var("RUST_LOG_JSON")
                .from_env_lossy(),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if let Some(dir) = cli.static_dir {
        settings.static_dir = dir;
    }

    match cli.command {
        Commands::Trains { line, json, sort } => {
            let board = build_board(&settings, cli.system)?;
            let view = board.trains(&line, sort).await?;
            if json {
                print_json(&view)?;
            } else {
                print!("{}", render_board(&view));
            }
        }
        Commands::Stations { json } => {
            let reference = ReferenceHandle::load(StaticSources::from_dir(&settings.static_dir));
            let stations = reference.snapshot().stop_entries();
            if json {
                print_json(&stations)?;
            } else {
                for s in &stations {
                    println!("{}\t{}", s.stop_id, s.stop_name);
                }
            }
            info!(count = stations.len(), "Stations listed");
        }
        Commands::Decode {
            source,
            agency,
            output,
        } => {
            let bytes = fetcher(&source, &settings).await?;
            let stats = match decode(&bytes, agency) {
                Ok(envelope) => {
                    print_pretty(&envelope);
                    EnvelopeStats::from_envelope(&envelope)
                }
                Err(e) => {
                    error!(error = %e, "Feed decode failed");
                    EnvelopeStats::from_error("decode_error", &e.to_string())
                }
            }
            .with_feed_info(&source, &agency.to_string());

            print_json(&stats)?;
            if let Some(path) = output {
                append_records(path, &[stats])?;
            }
        }
        Commands::Watch {
            line,
            interval,
            samples,
            csv,
            reload_every,
        } => {
            let board = build_board(&settings, cli.system)?;
            watch(&board, &line, interval, samples, csv.as_deref(), reload_every).await?;
        }
    }

    Ok(())
}

fn http_source(settings: &Settings) -> Result<Source> {
    let client = BasicClient::with_connect_timeout(settings.fetch_timeout)?;
    let client: Box<dyn HttpClient> = match &settings.api_key {
        Some(key) => Box::new(ApiKey::mta(client, key)?),
        None => Box::new(client),
    };
    Ok(HttpFeedSource(client))
}

fn build_board(settings: &Settings, system: System) -> Result<TransitBoard<Source>> {
    let catalog = match (&settings.catalog_path, system) {
        (Some(path), _) => Catalog::from_json_file(path)?,
        (None, System::Subway) => Catalog::nyct_subway(),
        (None, System::Lirr) => Catalog::lirr(),
    };
    info!(groups = catalog.groups.len(), "Feed catalog ready");

    let aggregator =
        Aggregator::new(catalog, http_source(settings)?).with_timeout(settings.fetch_timeout);
    let reference = ReferenceHandle::load(StaticSources::from_dir(&settings.static_dir));
    Ok(TransitBoard::new(aggregator, reference, settings.timezone))
}

/// Loads feed data from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(settings), fields(source = %url))]
async fn fetcher(url: &str, settings: &Settings) -> Result<Bytes> {
    if url.starts_with("http") {
        http_source(settings)?.fetch(url).await
    } else {
        FileFeedSource.fetch(url).await
    }
}

/// Samples `line` every `interval` seconds, optionally appending trips to a
/// CSV file and reloading the static tables every `reload_every` rounds.
#[tracing::instrument(skip(board, csv))]
async fn watch(
    board: &TransitBoard<Source>,
    line: &str,
    interval: u64,
    samples: usize,
    csv: Option<&Path>,
    reload_every: usize,
) -> Result<()> {
    if samples == 0 {
        info!(interval, "Sampling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(samples, interval, "Starting sample collection");
    }

    let mut sample_count = 0;
    loop {
        if samples > 0 && sample_count >= samples {
            break;
        }
        sample_count += 1;

        if reload_every > 0 && sample_count > 1 && (sample_count - 1) % reload_every == 0 {
            let store = board.reload_reference();
            info!(empty = store.is_empty(), "Static tables reloaded");
        }

        match board.trains(line, true).await {
            Ok(view) => match csv {
                Some(path) => {
                    if let Err(e) = append_trips(path, Utc::now(), &view) {
                        error!(error = %e, "Failed to write trip rows");
                    } else {
                        info!(sample = sample_count, trips = view.trips.len(), "Sample recorded");
                    }
                }
                None => print!("{}", render_board(&view)),
            },
            Err(e) => warn!(sample = sample_count, error = %e, "Sample failed"),
        }

        if samples == 0 || sample_count < samples {
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    info!(samples = sample_count, "Finished sampling");
    Ok(())
}
