//! # scrape_notify
//!
//! Scrapes a handful of listing sites, drops what was already announced and
//! posts the rest to Telegram channels.
//!
//! ## Features
//!
//! - Theatre, concert and circus events for the coming week (kontramarka.ua)
//! - New-construction housing (novostroyki.lun.ua)
//! - Premier League and Champions League highlight videos (goalhd.net)
//! - Cinema releases with IMDb rating and trailer (planetakino.ua)
//! - A personal evening digest: weather, USD and Bitcoin rates
//!
//! ## Usage
//!
//! ```sh
//! scrape_notify --env production events
//! ```
//!
//! ## Architecture
//!
//! Each run executes one job:
//! 1. **Baseline**: Load the job's already-announced records (GitHub gist or a local file)
//! 2. **Fetching**: Download the listing pages in parallel; failed pages are skipped
//! 3. **Filtering**: Parse, drop known ids, apply the job's filter and ordering
//! 4. **Delivery**: Send one Telegram message per new record
//! 5. **Persistence**: Append the new records to the baseline

use clap::Parser;
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod fetch;
mod html;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod store;
mod utils;

use api::{OmdbClient, YoutubeClient};
use cli::{Cli, Job};
use config::{FileConfig, JobSettings};
use fetch::Fetcher;
use outputs::telegram::{LogNotifier, Outbox, TelegramNotifier};
use pipeline::{Listing, Pipeline, RunReport};
use scrapers::{events::EventsJob, flats::FlatsJob, goal::GoalJob, kino::KinoJob, me::MeJob};
use store::{FileStore, GistStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // --- Tracing init ---
    init_tracing(args.log_file.as_deref())?;

    let start_time = std::time::Instant::now();
    info!(job = args.job.name(), env = ?args.env, "scrape_notify starting up");
    debug!(config = ?args.config, state_dir = ?args.state_dir, dry_run = args.dry_run, "Parsed CLI arguments");

    let file_config = match &args.config {
        Some(path) => config::load_file_config(path).await?,
        None => FileConfig::default(),
    };
    let settings = config::resolve(&args, &file_config);
    settings.validate()?;
    info!(chat = %settings.chat, pages = settings.pages, base_url = %settings.base_url, "Resolved job settings");

    let fetcher = Fetcher::new(&settings.http)?;
    let outbox = build_outbox(&args, &fetcher)?;

    let result = match &args.job {
        Job::Events => run_listing(&args, &settings, &fetcher, &outbox, &EventsJob::new(&settings)?).await,
        Job::Flats => run_listing(&args, &settings, &fetcher, &outbox, &FlatsJob::new(&settings)?).await,
        Job::Goal => run_listing(&args, &settings, &fetcher, &outbox, &GoalJob::new(&settings)?).await,
        Job::Kino(kino) => {
            let client = fetcher.client().clone();
            let omdb = kino.omdb_api_key.clone().map(|key| OmdbClient::new(client.clone(), key));
            let youtube = kino.youtube_api_key.clone().map(|key| YoutubeClient::new(client, key));
            let job = KinoJob::new(&settings, omdb, youtube);
            run_listing(&args, &settings, &fetcher, &outbox, &job).await
        }
        Job::Me(me) => MeJob::new(me).run(&fetcher, &outbox, &settings.chat).await,
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!(job = settings.job, error = %e, "Job failed");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        fresh = report.fresh,
        delivered = report.delivered,
        failed = report.failed,
        persisted = report.persisted,
        "Execution complete"
    );

    Ok(())
}

/// Human-readable output on stderr, optionally mirrored without colours to
/// an append-only log file.
fn init_tracing(log_file: Option<&str>) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tfmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Telegram in normal runs, the log in dry runs.
fn build_outbox(args: &Cli, fetcher: &Fetcher) -> error::Result<Outbox> {
    if args.dry_run {
        info!("Dry run; messages are logged instead of sent");
        return Ok(Outbox::DryRun(LogNotifier));
    }
    let token = args
        .bot_token
        .clone()
        .ok_or(error::Error::MissingCredential("TELEGRAM_BOT_TOKEN"))?;
    Ok(Outbox::Telegram(TelegramNotifier::new(fetcher.client().clone(), token)))
}

/// A local directory when `--state-dir` is given, the gist otherwise.
fn build_store(args: &Cli, fetcher: &Fetcher) -> error::Result<Store> {
    if let Some(dir) = &args.state_dir {
        info!(dir = %dir, "Using local state directory");
        return Ok(Store::File(FileStore::new(dir)));
    }
    let token = args
        .github_token
        .clone()
        .ok_or(error::Error::MissingCredential("GITHUB_TOKEN"))?;
    let gist_id = args
        .gist_id
        .clone()
        .ok_or(error::Error::MissingCredential("GIST_ID"))?;
    Ok(Store::Gist(GistStore::new(fetcher.client().clone(), token, gist_id)))
}

#[instrument(level = "debug", skip_all, fields(job = settings.job))]
async fn run_listing<L: Listing>(
    args: &Cli,
    settings: &JobSettings,
    fetcher: &Fetcher,
    outbox: &Outbox,
    listing: &L,
) -> error::Result<RunReport> {
    let store = build_store(args, fetcher)?;
    Pipeline {
        fetcher,
        store: &store,
        notifier: outbox,
        chat: &settings.chat,
        dry_run: settings.dry_run,
    }
    .run(listing)
    .await
}
