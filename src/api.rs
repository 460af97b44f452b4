//! Secondary lookups used to decorate cinema releases.
//!
//! - [`OmdbClient`]: IMDb id, rating, runtime and poster by title and year
//! - [`YoutubeClient`]: first video search result, used as the trailer
//!
//! Both are best effort from the caller's point of view: a lookup returns
//! `Ok(None)` when nothing matched and `Err` when the service failed, and the
//! caller announces the movie undecorated either way.

use crate::error::Result;
use crate::models::{ImdbInfo, Trailer};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, instrument};

pub const OMDB_API: &str = "https://www.omdbapi.com";
pub const YOUTUBE_API: &str = "https://www.googleapis.com";

#[allow(non_snake_case)]
#[derive(Debug, Deserialize)]
struct OmdbResponse {
    Response: String,
    #[serde(default)]
    Title: Option<String>,
    #[serde(default)]
    Year: Option<String>,
    #[serde(default)]
    Runtime: Option<String>,
    #[serde(default)]
    Director: Option<String>,
    #[serde(default)]
    Poster: Option<String>,
    #[serde(default)]
    imdbRating: Option<String>,
    #[serde(default)]
    imdbID: Option<String>,
}

/// OMDb marks missing values with the literal `N/A`.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "N/A")
}

#[derive(Debug, Clone)]
pub struct OmdbClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self::with_base(client, api_key, OMDB_API)
    }

    pub fn with_base(
        client: reqwest::Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Look a movie up by its (Latin) title and release year.
    #[instrument(level = "info", skip(self))]
    pub async fn lookup(&self, name: &str, year: i32) -> Result<Option<ImdbInfo>> {
        let t0 = Instant::now();
        let url = format!(
            "{}/?t={}&y={}&type=movie&apikey={}",
            self.api_base,
            urlencoding::encode(name),
            year,
            self.api_key
        );
        let response: OmdbResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, found = %response.Response, "OMDb answered");

        if response.Response != "True" {
            return Ok(None);
        }
        let Some(id) = present(response.imdbID) else {
            return Ok(None);
        };

        Ok(Some(ImdbInfo {
            link: format!("http://www.imdb.com/title/{id}"),
            id,
            title: present(response.Title).unwrap_or_else(|| name.to_string()),
            runtime: present(response.Runtime).unwrap_or_default(),
            rating: present(response.imdbRating).unwrap_or_default(),
            poster: present(response.Poster),
            director: present(response.Director),
            year: present(response.Year).unwrap_or_else(|| year.to_string()),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YoutubeClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self::with_base(client, api_key, YOUTUBE_API)
    }

    pub fn with_base(
        client: reqwest::Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// First video matching `query`.
    #[instrument(level = "info", skip(self))]
    pub async fn first_video(&self, query: &str) -> Result<Option<Trailer>> {
        let url = format!(
            "{}/youtube/v3/search?part=snippet&type=video&maxResults=10&q={}&key={}",
            self.api_base,
            urlencoding::encode(query),
            self.api_key
        );
        let response: SearchResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .items
            .into_iter()
            .find_map(|item| item.id.video_id)
            .map(|id| Trailer {
                link: format!("https://www.youtube.com/watch?v={id}"),
                id,
            }))
    }
}
