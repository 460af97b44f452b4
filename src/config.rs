//! Runtime configuration: built-in job defaults, an optional YAML file, and
//! CLI/env overrides, resolved into one [`JobSettings`] per run.
//!
//! ```yaml
//! test_chat: "@my_test_chat"
//! user_agent: "Mozilla/5.0 (X11; Linux x86_64)"
//! timeout_secs: 20
//! concurrency: 4
//! jobs:
//!   events:
//!     pages: 2
//!   flats:
//!     chat: "@another_channel"
//! ```

use crate::cli::{Cli, Environment};
use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_TEST_CHAT: &str = "@butuzgoltestchat";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Contents of the optional YAML config file. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub test_chat: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub jobs: HashMap<String, JobOverrides>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct JobOverrides {
    pub chat: Option<String>,
    pub pages: Option<usize>,
    pub base_url: Option<String>,
}

/// Defaults a job ships with.
#[derive(Debug, Clone, Copy)]
pub struct JobDefaults {
    /// `None` keeps posting to the test chat in production.
    pub production_chat: Option<&'static str>,
    pub pages: usize,
    pub base_url: &'static str,
}

pub fn job_defaults(job: &str) -> JobDefaults {
    match job {
        "events" => JobDefaults {
            production_chat: Some("@togo_odessa"),
            pages: 3,
            base_url: "https://odessa.kontramarka.ua",
        },
        "flats" => JobDefaults {
            production_chat: Some("@novostroyki_odessa"),
            pages: 3,
            base_url: "https://novostroyki.lun.ua",
        },
        "goal" => JobDefaults {
            production_chat: Some("@football_video_apl_cl"),
            pages: 2,
            base_url: "http://goalhd.net",
        },
        "kino" => JobDefaults {
            production_chat: None,
            pages: 1,
            base_url: "https://planetakino.ua/odessa/showtimes/xml/",
        },
        // `me` talks to several services; base_url is unused there.
        _ => JobDefaults {
            production_chat: Some("534377703"),
            pages: 1,
            base_url: "",
        },
    }
}

/// HTTP client settings shared by every request of a run.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
    /// Maximum parallel page requests; `None` fires them all at once.
    pub concurrency: Option<usize>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: None,
        }
    }
}

/// Fully resolved settings for the job being run.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub job: &'static str,
    pub chat: String,
    pub pages: usize,
    pub base_url: String,
    pub dry_run: bool,
    pub http: HttpSettings,
}

impl JobSettings {
    /// Reject a malformed base URL before any request is made. Jobs without a
    /// single base URL (the digest) carry an empty one.
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.is_empty() {
            url::Url::parse(&self.base_url)?;
        }
        Ok(())
    }
}

/// Read and parse the YAML config file.
#[instrument(level = "info")]
pub async fn load_file_config(path: &str) -> Result<FileConfig> {
    let raw = tokio::fs::read_to_string(path).await?;
    let config = parse_file_config(&raw)?;
    info!(jobs = config.jobs.len(), "Loaded config file");
    Ok(config)
}

pub fn parse_file_config(raw: &str) -> Result<FileConfig> {
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

/// Merge defaults, file config and CLI flags. CLI wins, then the file, then
/// the built-in defaults.
pub fn resolve(cli: &Cli, file: &FileConfig) -> JobSettings {
    let job = cli.job.name();
    let defaults = job_defaults(job);
    let overrides = file.jobs.get(job).cloned().unwrap_or_default();

    let test_chat = file
        .test_chat
        .clone()
        .unwrap_or_else(|| DEFAULT_TEST_CHAT.to_string());

    let chat = cli.chat.clone().unwrap_or_else(|| match cli.env {
        Environment::Production => overrides
            .chat
            .clone()
            .or_else(|| defaults.production_chat.map(str::to_string))
            .unwrap_or(test_chat),
        Environment::Development => test_chat,
    });

    let mut http = HttpSettings::default();
    if let Some(ua) = &file.user_agent {
        http.user_agent = ua.clone();
    }
    if let Some(secs) = file.timeout_secs {
        http.timeout = Duration::from_secs(secs);
    }
    http.concurrency = file.concurrency.filter(|n| *n > 0);

    JobSettings {
        job,
        chat,
        pages: cli
            .pages
            .or(overrides.pages)
            .unwrap_or(defaults.pages)
            .max(1),
        base_url: overrides
            .base_url
            .unwrap_or_else(|| defaults.base_url.to_string()),
        dry_run: cli.dry_run,
        http,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const YAML: &str = r#"
test_chat: "@qa_chat"
timeout_secs: 5
concurrency: 2
jobs:
  flats:
    chat: "@flats_override"
    pages: 7
  goal:
    base_url: "http://localhost:9999"
"#;

    #[test]
    fn test_parse_file_config() {
        let config = parse_file_config(YAML).unwrap();
        assert_eq!(config.test_chat.as_deref(), Some("@qa_chat"));
        assert_eq!(config.jobs["flats"].pages, Some(7));
        assert_eq!(config.jobs["goal"].chat, None);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = parse_file_config("  \n").unwrap();
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_development_uses_test_chat() {
        let cli = Cli::parse_from(["scrape_notify", "--env", "development", "flats"]);
        let settings = resolve(&cli, &parse_file_config(YAML).unwrap());
        assert_eq!(settings.chat, "@qa_chat");
        assert_eq!(settings.pages, 7);
        assert_eq!(settings.http.timeout, Duration::from_secs(5));
        assert_eq!(settings.http.concurrency, Some(2));
    }

    #[test]
    fn test_production_uses_override_then_default() {
        let file = parse_file_config(YAML).unwrap();

        let cli = Cli::parse_from(["scrape_notify", "--env", "production", "flats"]);
        assert_eq!(resolve(&cli, &file).chat, "@flats_override");

        let cli = Cli::parse_from(["scrape_notify", "--env", "production", "events"]);
        let settings = resolve(&cli, &file);
        assert_eq!(settings.chat, "@togo_odessa");
        assert_eq!(settings.pages, 3);
        assert_eq!(settings.base_url, "https://odessa.kontramarka.ua");
    }

    #[test]
    fn test_cli_flags_win() {
        let file = parse_file_config(YAML).unwrap();
        let cli = Cli::parse_from([
            "scrape_notify",
            "--env",
            "production",
            "--chat",
            "@cli_chat",
            "--pages",
            "1",
            "goal",
        ]);
        let settings = resolve(&cli, &file);
        assert_eq!(settings.chat, "@cli_chat");
        assert_eq!(settings.pages, 1);
        assert_eq!(settings.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_validate_base_url() {
        let file = parse_file_config("jobs:\n  goal:\n    base_url: \"not a url\"\n").unwrap();
        let cli = Cli::parse_from(["scrape_notify", "goal"]);
        assert!(resolve(&cli, &file).validate().is_err());

        let cli = Cli::parse_from(["scrape_notify", "flats"]);
        assert!(resolve(&cli, &FileConfig::default()).validate().is_ok());

        let cli = Cli::parse_from(["scrape_notify", "me"]);
        assert!(resolve(&cli, &FileConfig::default()).validate().is_ok());
    }

    #[test]
    fn test_kino_production_follows_test_chat() {
        let cli = Cli::parse_from(["scrape_notify", "--env", "production", "kino"]);
        assert_eq!(resolve(&cli, &parse_file_config(YAML).unwrap()).chat, "@qa_chat");
        assert_eq!(resolve(&cli, &FileConfig::default()).chat, DEFAULT_TEST_CHAT);

        let file = parse_file_config("jobs:\n  kino:\n    chat: \"@kino_odessa\"\n").unwrap();
        assert_eq!(resolve(&cli, &file).chat, "@kino_odessa");
    }
}
