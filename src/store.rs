//! The dedup baseline: one JSON array of already-announced records per job.
//!
//! Records are handled as raw [`serde_json::Value`]s. Only their `id` field
//! matters for deduplication, so documents written by older versions of a
//! job (different field sets) keep working. Writes replace the whole
//! document; there is no locking or versioning.
//!
//! # Backends
//!
//! | Backend | Layout |
//! |---------|--------|
//! | [`GistStore`] | one file per job inside a GitHub gist |
//! | [`FileStore`] | `<dir>/<job>.json` on local disk |

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

pub const GITHUB_API: &str = "https://api.github.com";

/// Read and overwrite the per-job baseline document.
pub trait StateStore {
    async fn load(&self, key: &str) -> Result<Vec<Value>>;
    async fn save(&self, key: &str, records: &[Value]) -> Result<()>;
}

/// Ids of every record in a baseline. Records without a string `id` are ignored.
pub fn seen_ids(records: &[Value]) -> HashSet<String> {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Decode a stored document. Blank content is an empty baseline.
pub fn parse_document(key: &str, content: &str) -> Result<Vec<Value>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(other) => Err(Error::State {
            key: key.to_string(),
            reason: format!("expected a JSON array, found {}", kind(&other)),
        }),
        Err(e) => Err(Error::State {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Pretty-printed with two-space indentation, as the documents have always been.
pub fn render_document(records: &[Value]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

#[derive(Debug, Deserialize)]
struct Gist {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

/// GitHub gist used as a tiny key-value store: every job owns one file.
#[derive(Debug, Clone)]
pub struct GistStore {
    client: reqwest::Client,
    api_base: String,
    token: String,
    gist_id: String,
}

impl GistStore {
    pub fn new(client: reqwest::Client, token: impl Into<String>, gist_id: impl Into<String>) -> Self {
        Self::with_base(client, token, gist_id, GITHUB_API)
    }

    pub fn with_base(
        client: reqwest::Client,
        token: impl Into<String>,
        gist_id: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            gist_id: gist_id.into(),
        }
    }

    fn gist_url(&self) -> String {
        format!("{}/gists/{}", self.api_base, self.gist_id)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }
}

impl StateStore for GistStore {
    #[instrument(level = "info", skip(self))]
    async fn load(&self, key: &str) -> Result<Vec<Value>> {
        info!("Fetching data from db...");
        let gist: Gist = self
            .authorized(self.client.get(self.gist_url()))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(file) = gist.files.get(key) else {
            warn!("Gist has no file for this job yet; starting from an empty baseline");
            return Ok(Vec::new());
        };

        let content = match (&file.content, file.truncated, &file.raw_url) {
            (_, true, Some(raw_url)) => {
                self.authorized(self.client.get(raw_url))
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?
            }
            (Some(content), _, _) => content.clone(),
            (None, _, _) => {
                return Err(Error::State {
                    key: key.to_string(),
                    reason: "gist file has no content".to_string(),
                });
            }
        };

        let records = parse_document(key, &content)?;
        info!(records = records.len(), "Baseline loaded");
        Ok(records)
    }

    #[instrument(level = "info", skip(self, records), fields(records = records.len()))]
    async fn save(&self, key: &str, records: &[Value]) -> Result<()> {
        info!("Setting data to db...");
        let body = json!({
            "files": { key: { "content": render_document(records)? } }
        });
        self.authorized(self.client.patch(self.gist_url()))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        info!("Baseline saved");
        Ok(())
    }
}

/// Baselines kept as plain files, for local runs and development.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStore for FileStore {
    #[instrument(level = "info", skip(self))]
    async fn load(&self, key: &str) -> Result<Vec<Value>> {
        let path = self.path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_document(key, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No state file yet; starting from an empty baseline");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(level = "info", skip(self, records), fields(records = records.len()))]
    async fn save(&self, key: &str, records: &[Value]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(key);
        tokio::fs::write(&path, render_document(records)?).await?;
        info!(path = %path.display(), "Baseline saved");
        Ok(())
    }
}

/// The store chosen at startup.
#[derive(Debug, Clone)]
pub enum Store {
    Gist(GistStore),
    File(FileStore),
}

impl StateStore for Store {
    async fn load(&self, key: &str) -> Result<Vec<Value>> {
        match self {
            Store::Gist(s) => s.load(key).await,
            Store::File(s) => s.load(key).await,
        }
    }

    async fn save(&self, key: &str, records: &[Value]) -> Result<()> {
        match self {
            Store::Gist(s) => s.save(key, records).await,
            Store::File(s) => s.save(key, records).await,
        }
    }
}
