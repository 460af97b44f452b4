//! Data models shared by the jobs, the pipeline and the outputs.
//!
//! - [`PageRequest`]: one listing page to fetch
//! - [`Message`]: what gets posted to the chat
//! - Item records: [`EventItem`], [`FlatItem`], [`VideoItem`], [`MovieItem`]
//! - Digest parts for the daily `me` job: [`WeatherSlot`], [`Rates`]
//!
//! Item records are what ends up in the state document. Field names are
//! camelCase so documents written by earlier deployments still deserialize.

use crate::pipeline::Record;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A listing page to fetch. `label` tells the extractor which category or
/// league the page belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub label: String,
    /// Zero-based position among the pages of its label.
    pub index: usize,
}

impl PageRequest {
    pub fn new(url: impl Into<String>, label: impl Into<String>, index: usize) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            index,
        }
    }
}

/// A message ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Markdown text.
    Text(String),
    /// Remote image with a Markdown caption.
    Photo { url: String, caption: String },
}

impl Message {
    /// The Markdown body, whichever kind of message this is.
    pub fn body(&self) -> &str {
        match self {
            Message::Text(text) => text,
            Message::Photo { caption, .. } => caption,
        }
    }
}

/// A theatre, concert or circus event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub id: String,
    pub image: Option<String>,
    pub title: String,
    /// Start as published in the page microdata, e.g. `2026-10-18T19:00`.
    pub start_date: String,
    pub dates: EventDates,
    pub location: Location,
    pub price: String,
    pub url: String,
}

/// Either a single human-readable date or a from/to pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDates {
    Single(String),
    Range(String, String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub address: String,
    pub url: String,
}

/// A new-construction housing complex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatItem {
    pub id: String,
    pub image: Option<String>,
    pub title: String,
    pub location: String,
    pub price: String,
    pub developer: Developer,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub name: Option<String>,
    pub website: Option<String>,
}

/// Leagues tracked by the highlights job, in announcement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum League {
    #[serde(rename = "englandPremierLeague")]
    EnglandPremierLeague,
    #[serde(rename = "championsLeague")]
    ChampionsLeague,
}

/// A match highlights video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub title: String,
    pub link: String,
    /// Publication day; `None` when the site's relative date was not understood.
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<String>,
    #[serde(rename = "type")]
    pub league: League,
}

/// A cinema release from the showtimes feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieItem {
    pub id: String,
    /// Latin name derived from the URL slug, used for lookups.
    pub orig_name: String,
    pub title: String,
    pub link: String,
    pub dt_start: String,
    pub dt_end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<ImdbInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<Trailer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImdbInfo {
    pub id: String,
    pub link: String,
    pub title: String,
    pub runtime: String,
    pub rating: String,
    pub poster: Option<String>,
    pub director: Option<String>,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trailer {
    pub id: String,
    pub link: String,
}

impl Record for EventItem {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for FlatItem {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for VideoItem {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for MovieItem {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One three-hour forecast slot.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSlot {
    pub time: NaiveDateTime,
    pub temp: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsdRate {
    pub buy: String,
    pub sell: String,
}

/// Exchange rates gathered for the digest; each part is best effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rates {
    pub usd: Option<UsdRate>,
    pub bitcoin: Option<String>,
}
