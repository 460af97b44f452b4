//! Telegram delivery.
//!
//! Messages go through the Bot API (`sendMessage` / `sendPhoto`) with the
//! legacy `Markdown` parse mode, which is what the message templates are
//! written for.

use crate::error::{Error, Result};
use crate::models::Message;
use crate::utils::{preview, truncate_chars};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram rejects captions above 1024 and texts above 4096 characters.
pub const MAX_CAPTION_CHARS: usize = 1024;
pub const MAX_TEXT_CHARS: usize = 4096;

/// Anything that can deliver a [`Message`] to a chat.
pub trait Notifier {
    async fn send(&self, chat: &str, message: &Message) -> Result<()>;
}

/// Escape the characters legacy Markdown treats as markup, for scraped text
/// that is placed into a message template.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Cut `text` to `max` characters without leaving legacy Markdown open.
///
/// A cut that lands inside an entity, a link or after a lone backslash would
/// make Telegram reject the whole message, so the unfinished construct is
/// dropped together with everything after it.
pub fn truncate_markdown(text: &str, max: usize) -> String {
    let cut = truncate_chars(text, max);
    if cut.len() == text.len() {
        return cut;
    }

    enum Open {
        Entity(char),
        Code,
        Pre,
        LinkText,
        LinkUrl,
    }

    let bytes = cut.as_bytes();
    let mut open: Option<(Open, usize)> = None;
    let mut escape_at = None;
    let mut chars = cut.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if escape_at.take().is_some() {
            continue;
        }
        open = match (open, c) {
            (None, '\\') => {
                escape_at = Some(i);
                None
            }
            (None, '*' | '_') => Some((Open::Entity(c), i)),
            (None, '`') if bytes[i..].starts_with(b"```") => {
                chars.next();
                chars.next();
                Some((Open::Pre, i))
            }
            (None, '`') => Some((Open::Code, i)),
            (None, '[') => Some((Open::LinkText, i)),
            (Some((Open::Entity(e), _)), c) if c == e => None,
            (Some((Open::Code, _)), '`') => None,
            (Some((Open::Pre, _)), '`') if bytes[i..].starts_with(b"```") => {
                chars.next();
                chars.next();
                None
            }
            (Some((Open::LinkText, start)), ']') => match chars.peek() {
                Some((_, '(')) => {
                    chars.next();
                    Some((Open::LinkUrl, start))
                }
                _ => None,
            },
            (Some((Open::LinkUrl, _)), ')') => None,
            (state, _) => state,
        };
    }

    let end = match (open, escape_at) {
        (Some((_, start)), _) => start,
        (None, Some(at)) => at,
        (None, None) => cut.len(),
    };
    cut[..end].trim_end().to_string()
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: String,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(client: reqwest::Client, token: impl Into<String>) -> Self {
        Self::with_base(client, token, TELEGRAM_API)
    }

    /// Point the client at another Bot API server (local bot API, tests).
    pub fn with_base(
        client: reqwest::Client,
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<()> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        // Telegram reports failures as `ok: false` with a description,
        // usually alongside a 4xx status, so decode the body either way.
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<ApiResponse>(&text) {
            Ok(ApiResponse { ok: true, .. }) => Ok(()),
            Ok(ApiResponse { description, .. }) => Err(Error::Telegram(
                description.unwrap_or_else(|| status.to_string()),
            )),
            Err(_) => Err(Error::Telegram(format!("{status}: {text}"))),
        }
    }
}

impl Notifier for TelegramNotifier {
    #[instrument(level = "info", skip_all, fields(%chat))]
    async fn send(&self, chat: &str, message: &Message) -> Result<()> {
        let t0 = Instant::now();
        info!(preview = %preview(message.body()), "Sending message...");

        let res = match message {
            Message::Text(text) => {
                let body = SendMessage {
                    chat_id: chat,
                    text: truncate_markdown(text, MAX_TEXT_CHARS),
                    parse_mode: "Markdown",
                };
                self.call("sendMessage", &body).await
            }
            Message::Photo { url, caption } => {
                let body = SendPhoto {
                    chat_id: chat,
                    photo: url,
                    caption: truncate_markdown(caption, MAX_CAPTION_CHARS),
                    parse_mode: "Markdown",
                };
                self.call("sendPhoto", &body).await
            }
        };

        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "Telegram call failed");
        }
        res
    }
}

/// Logs messages instead of sending them. Used for `--dry-run`.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, chat: &str, message: &Message) -> Result<()> {
        match message {
            Message::Text(text) => info!(%chat, "[dry-run] message:\n{}", text),
            Message::Photo { url, caption } => {
                info!(%chat, photo = %url, "[dry-run] photo:\n{}", caption)
            }
        }
        Ok(())
    }
}

/// The notifier chosen at startup.
#[derive(Debug, Clone)]
pub enum Outbox {
    Telegram(TelegramNotifier),
    DryRun(LogNotifier),
}

impl Notifier for Outbox {
    async fn send(&self, chat: &str, message: &Message) -> Result<()> {
        match self {
            Outbox::Telegram(n) => n.send(chat, message).await,
            Outbox::DryRun(n) => n.send(chat, message).await,
        }
    }
}
