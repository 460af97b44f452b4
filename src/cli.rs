//! Command-line interface definitions for scrape_notify.
//!
//! Every credential can be provided via a command-line flag or an environment
//! variable (a `.env` file in the working directory is loaded first). Each
//! job is a subcommand; the scheduler (cron, pm2, systemd timers) is expected
//! to run one subcommand per invocation.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for scrape_notify.
///
/// # Examples
///
/// ```sh
/// # Announce new theatre/concert/circus events to the test chat
/// scrape_notify events
///
/// # Production run of the flats job against the real channel
/// scrape_notify --env production flats
///
/// # Look at what would be sent without touching Telegram or the gist
/// scrape_notify --dry-run --state-dir ./state goal
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file with per-job overrides
    #[arg(short, long, env = "SCRAPE_NOTIFY_CONFIG", global = true)]
    pub config: Option<String>,

    /// Deployment environment; outside production every job posts to the test chat
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development, global = true)]
    pub env: Environment,

    /// Post to this chat instead of the job's configured one
    #[arg(long, global = true)]
    pub chat: Option<String>,

    /// Number of listing pages to fetch per category
    #[arg(long, global = true)]
    pub pages: Option<usize>,

    /// Log messages instead of sending them and never write the state document
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Keep state in `<dir>/<job>.json` instead of the GitHub gist
    #[arg(long, env = "STATE_DIR", global = true)]
    pub state_dir: Option<String>,

    /// Append log output to this file as well as stderr
    #[arg(long, env = "LOG_FILE", global = true)]
    pub log_file: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true, global = true)]
    pub bot_token: Option<String>,

    /// GitHub token with gist scope
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// Id of the gist holding the already-announced items
    #[arg(long, env = "GIST_ID", global = true)]
    pub gist_id: Option<String>,

    #[command(subcommand)]
    pub job: Job,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Job {
    /// Theatre, concert and circus events for the coming week
    Events,
    /// New-construction real-estate listings
    Flats,
    /// Premier League and Champions League highlight videos
    Goal,
    /// Cinema releases, decorated with IMDb data and a trailer
    Kino(KinoArgs),
    /// Personal daily digest: weather, USD and Bitcoin rates
    Me(MeArgs),
}

impl Job {
    /// Name used for config overrides, the state document and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Job::Events => "events",
            Job::Flats => "flats",
            Job::Goal => "goal",
            Job::Kino(_) => "kino",
            Job::Me(_) => "me",
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct KinoArgs {
    /// OMDb API key; without it movies are announced without IMDb data
    #[arg(long, env = "OMDB_API_KEY", hide_env_values = true)]
    pub omdb_api_key: Option<String>,

    /// YouTube Data API key; without it no trailer is attached
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MeArgs {
    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub weather_api_key: Option<String>,

    /// City query passed to OpenWeatherMap
    #[arg(long, default_value = "Odessa,ua")]
    pub city: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}
