//! Crate-wide error type.
//!
//! Every fallible operation returns [`Result`]. Failures that must not stop a
//! run (a single page, a single message, a single enrichment lookup) are
//! logged and dropped by the caller instead of being propagated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("invalid xml feed: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("telegram rejected the message: {0}")]
    Telegram(String),

    #[error("state document `{key}` is malformed: {reason}")]
    State { key: String, reason: String },

    #[error("missing credential {0} (pass it as a flag or set the environment variable)")]
    MissingCredential(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
