//! Cinema releases from the [Planeta Kino](https://planetakino.ua) showtimes feed.
//!
//! Unlike the other sources this one is a single XML document:
//!
//! ```xml
//! <planeta-kino>
//!   <movies>
//!     <movie id="…" url="https://planetakino.ua/odessa/movies/dune/">
//!       <title>Дюна</title>
//!       <dt-start>2026-10-20</dt-start>
//!       <dt-end>2026-11-20</dt-end>
//!     </movie>
//!   </movies>
//! </planeta-kino>
//! ```
//!
//! Movies are announced from five days before their premiere, decorated with
//! IMDb data and a trailer when those lookups are configured and succeed.

use crate::api::{OmdbClient, YoutubeClient};
use crate::config::JobSettings;
use crate::error::Result;
use crate::models::{MovieItem, Message, PageRequest};
use crate::outputs::telegram::escape_markdown;
use crate::pipeline::Listing;
use crate::utils::{last_path_segment, long_date_ru, parse_date};
use chrono::{DateTime, Datelike, Duration, Local, NaiveTime};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{info, warn};

/// Days before the premiere a movie gets announced.
const LEAD_DAYS: i64 = 5;

#[derive(Debug, Deserialize)]
struct Feed {
    movies: MovieList,
}

#[derive(Debug, Deserialize)]
struct MovieList {
    #[serde(default)]
    movie: Vec<MovieNode>,
}

#[derive(Debug, Deserialize)]
struct MovieNode {
    #[serde(rename = "@url")]
    url: String,
    title: String,
    #[serde(rename = "dt-start")]
    dt_start: String,
    #[serde(rename = "dt-end")]
    dt_end: String,
}

pub struct KinoJob {
    feed_url: String,
    now: DateTime<Local>,
    omdb: Option<OmdbClient>,
    youtube: Option<YoutubeClient>,
}

impl KinoJob {
    pub fn new(
        settings: &JobSettings,
        omdb: Option<OmdbClient>,
        youtube: Option<YoutubeClient>,
    ) -> Self {
        Self {
            feed_url: settings.base_url.clone(),
            now: Local::now(),
            omdb,
            youtube,
        }
    }

    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    async fn decorate(&self, mut movie: MovieItem) -> MovieItem {
        let year = self.now.year();

        if let Some(omdb) = &self.omdb {
            info!(title = %movie.title, name = %movie.orig_name, "Fetching imdb");
            match omdb.lookup(&movie.orig_name, year).await {
                Ok(Some(imdb)) => movie.imdb = Some(imdb),
                Ok(None) => warn!(name = %movie.orig_name, "imdb id not found"),
                Err(e) => warn!(name = %movie.orig_name, error = %e, "imdb lookup failed"),
            }
        }

        if let Some(youtube) = &self.youtube {
            let query = format!("{} {} трейлер на русском", movie.orig_name, year);
            match youtube.first_video(&query).await {
                Ok(trailer) => movie.youtube = trailer,
                Err(e) => warn!(name = %movie.orig_name, error = %e, "youtube search failed"),
            }
        }

        info!(
            title = %movie.title,
            imdb = movie.imdb.as_ref().map(|i| i.link.as_str()).unwrap_or(""),
            youtube = movie.youtube.as_ref().map(|t| t.link.as_str()).unwrap_or(""),
            "imdb youtube fetched"
        );
        movie
    }
}

/// `dune-part_two` → `dune part two`.
pub fn original_name(slug: &str) -> String {
    slug.replace(['-', '_'], " ")
}

/// `166 min` → `166 мин`, `2h 46min` → `2ч 46мин`.
pub fn localize_runtime(runtime: &str) -> String {
    runtime.replace("min", "мин").replace('h', "ч")
}

impl Listing for KinoJob {
    type Item = MovieItem;

    fn key(&self) -> &'static str {
        "kino"
    }

    fn pages(&self) -> Vec<PageRequest> {
        vec![PageRequest::new(self.feed_url.clone(), "feed", 0)]
    }

    fn extract(&self, _page: &PageRequest, body: &str) -> Result<Vec<MovieItem>> {
        let feed: Feed = quick_xml::de::from_str(body)?;
        info!(count = feed.movies.movie.len(), "Data xml to json");

        Ok(feed
            .movies
            .movie
            .into_iter()
            .filter_map(|node| {
                let Some(id) = last_path_segment(&node.url).map(str::to_string) else {
                    warn!(url = %node.url, "Movie url without a slug; skipping");
                    return None;
                };
                Some(MovieItem {
                    orig_name: original_name(&id),
                    id,
                    title: node.title.trim().to_string(),
                    link: node.url,
                    dt_start: node.dt_start.trim().to_string(),
                    dt_end: node.dt_end.trim().to_string(),
                    imdb: None,
                    youtube: None,
                })
            })
            .collect())
    }

    fn keep(&self, item: &MovieItem) -> bool {
        match parse_date(&item.dt_start) {
            // Announced from midnight `LEAD_DAYS` before the premiere.
            Some(start) => {
                start.and_time(NaiveTime::MIN) - Duration::days(LEAD_DAYS) < self.now.naive_local()
            }
            None => {
                warn!(id = %item.id, start = %item.dt_start, "Unparseable premiere date; skipping");
                false
            }
        }
    }

    async fn enrich(&self, items: Vec<MovieItem>) -> Vec<MovieItem> {
        if self.omdb.is_none() && self.youtube.is_none() {
            return items;
        }
        join_all(items.into_iter().map(|movie| self.decorate(movie))).await
    }

    fn render(&self, item: &MovieItem) -> Message {
        Message::Text(format_message(item))
    }
}

pub fn format_message(item: &MovieItem) -> String {
    let mut lines = Vec::new();
    match &item.imdb {
        Some(imdb) => {
            lines.push(escape_markdown(&item.title));
            lines.push(format!("imdb: {}", imdb.rating));
            if !imdb.runtime.is_empty() {
                lines.push(format!("Длительность: {}", localize_runtime(&imdb.runtime)));
            }
        }
        None => lines.push(format!("[{}]({})", escape_markdown(&item.title), item.link)),
    }
    if let Some(start) = parse_date(&item.dt_start) {
        lines.push(format!("Начало: {}", long_date_ru(start)));
    }
    if let Some(end) = parse_date(&item.dt_end) {
        lines.push(format!("Конец: {}", long_date_ru(end)));
    }
    if let Some(trailer) = &item.youtube {
        lines.push(trailer.link.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use crate::fetch::Fetcher;
    use crate::models::ImdbInfo;
    use crate::pipeline::Pipeline;
    use crate::pipeline::testing::{MemoryStore, RecordingNotifier};
    use chrono::TimeZone;
    use mockito::Matcher;
    use serde_json::json;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<planeta-kino>
  <movies>
    <movie id="1" url="https://planetakino.ua/odessa/movies/dune-part_two/">
      <title>Дюна: Часть вторая</title>
      <dt-start>2026-10-18</dt-start>
      <dt-end>2026-11-20</dt-end>
      <genres>фантастика</genres>
    </movie>
    <movie id="2" url="https://planetakino.ua/odessa/movies/far-future/">
      <title>Далёкое будущее</title>
      <dt-start>2026-12-24</dt-start>
      <dt-end>2027-01-20</dt-end>
    </movie>
    <movie id="3" url="https://planetakino.ua/odessa/movies/old-hit/">
      <title>Старый хит &amp; компания</title>
      <dt-start>2026-09-01</dt-start>
      <dt-end>2026-10-30</dt-end>
    </movie>
  </movies>
</planeta-kino>"#;

    fn settings(feed_url: &str) -> JobSettings {
        JobSettings {
            job: "kino",
            chat: "@test".into(),
            pages: 1,
            base_url: feed_url.into(),
            dry_run: false,
            http: HttpSettings::default(),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_helpers() {
        assert_eq!(original_name("dune-part_two"), "dune part two");
        assert_eq!(localize_runtime("166 min"), "166 мин");
        assert_eq!(localize_runtime("2h 46min"), "2ч 46мин");
    }

    #[test]
    fn test_extract_and_keep() {
        let job = KinoJob::new(&settings("u"), None, None).at(now());
        let items = job
            .extract(&PageRequest::new("u", "feed", 0), FEED)
            .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "dune-part_two");
        assert_eq!(items[0].orig_name, "dune part two");
        assert_eq!(items[0].title, "Дюна: Часть вторая");
        assert_eq!(items[2].title, "Старый хит & компания");

        let kept: Vec<&str> = items
            .iter()
            .filter(|m| job.keep(m))
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(kept, vec!["dune-part_two", "old-hit"]);
    }

    #[test]
    fn test_lead_window_starts_at_midnight_five_days_ahead() {
        let job = KinoJob::new(&settings("u"), None, None).at(now());
        let premiere = |date: &str| MovieItem {
            id: date.into(),
            orig_name: String::new(),
            title: String::new(),
            link: String::new(),
            dt_start: date.into(),
            dt_end: date.into(),
            imdb: None,
            youtube: None,
        };

        assert!(job.keep(&premiere("2026-10-21")));
        assert!(!job.keep(&premiere("2026-10-22")));

        let midnight = Local.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        let job = KinoJob::new(&settings("u"), None, None).at(midnight);
        assert!(!job.keep(&premiere("2026-10-21")));
    }

    #[test]
    fn test_extract_skips_movies_without_an_id() {
        let feed = r#"<planeta-kino><movies>
            <movie id="1" url=""><title>Без ссылки</title><dt-start>2026-10-18</dt-start><dt-end>2026-10-30</dt-end></movie>
            <movie id="2" url="/?from=feed"><title>Корень</title><dt-start>2026-10-18</dt-start><dt-end>2026-10-30</dt-end></movie>
            <movie id="3" url="https://planetakino.ua/odessa/movies/alien/"><title>Чужой</title><dt-start>2026-10-18</dt-start><dt-end>2026-10-30</dt-end></movie>
        </movies></planeta-kino>"#;
        let job = KinoJob::new(&settings("u"), None, None);
        let items = job.extract(&PageRequest::new("u", "feed", 0), feed).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "alien");
    }

    #[test]
    fn test_malformed_feed_is_error() {
        let job = KinoJob::new(&settings("u"), None, None);
        assert!(job.extract(&PageRequest::new("u", "feed", 0), "<html>").is_err());
    }

    #[test]
    fn test_format_message_with_and_without_imdb() {
        let mut movie = MovieItem {
            id: "dune".into(),
            orig_name: "dune".into(),
            title: "Дюна".into(),
            link: "https://planetakino.ua/odessa/movies/dune/".into(),
            dt_start: "2026-10-18".into(),
            dt_end: "2026-11-20".into(),
            imdb: None,
            youtube: None,
        };
        let plain = format_message(&movie);
        assert!(plain.starts_with("[Дюна](https://planetakino.ua/odessa/movies/dune/)\nНачало: 18 "));
        assert!(plain.contains("\nКонец: 20 "));

        movie.imdb = Some(ImdbInfo {
            id: "tt1".into(),
            link: "http://www.imdb.com/title/tt1".into(),
            title: "Dune".into(),
            runtime: "155 min".into(),
            rating: "8.0".into(),
            poster: None,
            director: None,
            year: "2026".into(),
        });
        let decorated = format_message(&movie);
        let lines: Vec<&str> = decorated.lines().collect();
        assert_eq!(lines[0], "Дюна");
        assert_eq!(lines[1], "imdb: 8.0");
        assert_eq!(lines[2], "Длительность: 155 мин");
    }

    #[tokio::test]
    async fn test_run_enriches_best_effort() {
        let mut server = mockito::Server::new_async().await;
        let _feed = server
            .mock("GET", "/feed.xml")
            .with_body(FEED)
            .create_async()
            .await;
        let _omdb_hit = server
            .mock("GET", "/omdb/")
            .match_query(Matcher::UrlEncoded("t".into(), "dune part two".into()))
            .with_body(r#"{"Response":"True","Title":"Dune: Part Two","Runtime":"166 min","imdbRating":"8.6","imdbID":"tt15239678"}"#)
            .create_async()
            .await;
        let _omdb_down = server
            .mock("GET", "/omdb/")
            .match_query(Matcher::UrlEncoded("t".into(), "old hit".into()))
            .with_status(500)
            .create_async()
            .await;
        let _yt = server
            .mock("GET", "/youtube/v3/search")
            .match_query(Matcher::Any)
            .with_body(r#"{"items":[{"id":{"videoId":"trailer1"}}]}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let job = KinoJob::new(
            &settings(&format!("{}/feed.xml", server.url())),
            Some(OmdbClient::with_base(client.clone(), "KEY", format!("{}/omdb", server.url()))),
            Some(YoutubeClient::with_base(client, "KEY", server.url())),
        )
        .at(now());

        let store = MemoryStore::with("kino", vec![json!({"id": "already-announced"})]);
        let notifier = RecordingNotifier::default();
        let fetcher = Fetcher::new(&HttpSettings::default()).unwrap();
        let report = Pipeline {
            fetcher: &fetcher,
            store: &store,
            notifier: &notifier,
            chat: "@test",
            dry_run: false,
        }
        .run(&job)
        .await
        .unwrap();

        assert_eq!(report.delivered, 2);
        let bodies = notifier.bodies();
        assert!(bodies[0].starts_with("Дюна: Часть вторая\nimdb: 8.6\nДлительность: 166 мин"));
        assert!(bodies[0].ends_with("https://www.youtube.com/watch?v=trailer1"));
        // OMDb failed for this one; it still goes out, as a plain link.
        assert!(bodies[1].starts_with("[Старый хит & компания](https://planetakino.ua/odessa/movies/old-hit/)"));

        let doc = store.doc("kino");
        assert_eq!(doc.len(), 3);
        assert_eq!(doc[1]["imdb"]["id"], "tt15239678");
        assert!(doc[2].get("imdb").is_none());
    }
}
