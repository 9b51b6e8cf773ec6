//! CLI entry point for the GTFS directions tool.
//!
//! Provides subcommands for processing an extracted feed into markdown,
//! downloading and extracting a feed, doing both in one go, and looking up
//! the consolidated data for one station.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use gtfs_directions::{
    PipelineContext, TransitModel, archive,
    config::{FlushPolicy, PipelineConfig},
    fetch::{BasicClient, download_feed},
    markdown::{self, DirectorySink},
    output::{append_record, print_json, print_pretty},
    stats::RunSummary,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_directions")]
#[command(about = "Normalise a GTFS feed into per-direction route and station documents", long_about = None)]
struct Cli {
    /// JSON config file; CLI flags override its values
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process an extracted GTFS directory into markdown
    Process {
        /// Directory containing routes.txt, trips.txt, stops.txt, stop_times.txt
        #[arg(value_name = "GTFS_DIR")]
        gtfs_dir: PathBuf,

        /// Directory to write markdown files to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows of stop_times.txt read per batch
        #[arg(long)]
        chunk_size: Option<usize>,

        /// When accumulated trips are resolved into directions
        #[arg(long, value_enum)]
        flush: Option<FlushPolicy>,

        /// CSV file to append the run summary to
        #[arg(long)]
        summary_csv: Option<PathBuf>,

        /// Log the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download and extract the feed archive
    Fetch {
        /// Feed URL (defaults to the configured feed)
        #[arg(long)]
        url: Option<String>,

        /// Directory to extract the feed into
        #[arg(short, long, default_value = "gtfs")]
        dest: PathBuf,
    },
    /// Download, extract and process in one go
    Run {
        /// Feed URL (defaults to the configured feed)
        #[arg(long)]
        url: Option<String>,

        /// Directory to extract the feed into
        #[arg(short, long, default_value = "gtfs")]
        dest: PathBuf,

        /// Directory to write markdown files to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the consolidated stops and serving routes for one station name
    Stop {
        #[arg(value_name = "GTFS_DIR")]
        gtfs_dir: PathBuf,

        /// Station name, matched case-insensitively
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_directions.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_directions.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Process {
            gtfs_dir,
            output,
            chunk_size,
            flush,
            summary_csv,
            json,
        } => {
            if let Some(output) = output {
                config.output_dir = output;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if let Some(flush) = flush {
                config.flush = flush;
            }
            if summary_csv.is_some() {
                config.summary_csv = summary_csv;
            }
            config.validate()?;
            process(config, &gtfs_dir, json)
        }
        Commands::Fetch { url, dest } => {
            if let Some(url) = url {
                config.feed_url = url;
            }
            config.validate()?;
            fetch(&config, &dest).await.map(|_| ())
        }
        Commands::Run { url, dest, output } => {
            if let Some(url) = url {
                config.feed_url = url;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            config.validate()?;
            fetch(&config, &dest)
                .await
                .and_then(|dir| process(config, &dir, false))
        }
        Commands::Stop { gtfs_dir, name } => {
            config.validate()?;
            show_station(config, &gtfs_dir, &name)
        }
    };

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Run failed");
    }
    result
}

/// Defaults, then the optional JSON file, then the environment.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env()
}

/// Runs the pipeline and writes markdown. Nothing is written unless the
/// whole pipeline succeeded.
#[tracing::instrument(skip_all, fields(gtfs_dir = %gtfs_dir.display()))]
fn process(config: PipelineConfig, gtfs_dir: &Path, json: bool) -> Result<()> {
    let (model, summary) = run_pipeline(&config, gtfs_dir)?;

    let mut sink = DirectorySink::new(&config.output_dir);
    let categories = markdown::emit(&model, &mut sink, Utc::now())?;
    info!(
        categories,
        files = sink.written().len(),
        output_dir = %config.output_dir.display(),
        "Markdown written"
    );

    if json {
        print_json(&summary)?;
    } else {
        print_pretty(&summary);
    }
    if let Some(path) = &config.summary_csv {
        append_record(path, &summary)
            .with_context(|| format!("failed to append run summary to {}", path.display()))?;
    }
    Ok(())
}

fn run_pipeline(config: &PipelineConfig, gtfs_dir: &Path) -> Result<(TransitModel, RunSummary)> {
    let mut ctx = PipelineContext::new(config.clone());
    let model = ctx
        .run(gtfs_dir)
        .with_context(|| format!("failed to process feed in {}", gtfs_dir.display()))?;
    Ok((model, ctx.summary().clone()))
}

/// Downloads the configured feed next to `dest` and extracts it into `dest`.
#[tracing::instrument(skip_all, fields(url = %config.feed_url, dest = %dest.display()))]
async fn fetch(config: &PipelineConfig, dest: &Path) -> Result<PathBuf> {
    let client = BasicClient::from_config(&config.download)?;
    let zip_path = dest.with_extension("zip");
    let zip_path = download_feed(&client, &config.feed_url, &zip_path, &config.download).await?;

    let dir = archive::extract(&zip_path, dest)
        .with_context(|| format!("failed to extract {}", zip_path.display()))?;
    info!(dir = %dir.display(), "Feed ready");
    Ok(dir)
}

fn show_station(config: PipelineConfig, gtfs_dir: &Path, name: &str) -> Result<()> {
    let (model, _) = run_pipeline(&config, gtfs_dir)?;

    let stops = model.stops_named(name);
    if stops.is_empty() {
        warn!(name, "No station with that name");
        return Ok(());
    }

    for stop in stops {
        let served = markdown::served_by(stop, &model);
        info!(
            stop_id = %stop.id,
            name = %stop.name,
            lat = stop.lat,
            lon = stop.lon,
            variant = stop.is_variant(),
            codes = %stop.display_codes().join(", "),
            routes = %served.join(", "),
            "Station stop"
        );
    }
    Ok(())
}
