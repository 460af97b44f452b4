//! Match highlight videos from [goalhd.net](http://goalhd.net).
//!
//! Two leagues are followed. Each league's section is paginated from one
//! (`/{section}/{n}`) and may mix in videos from other competitions, so
//! titles are filtered by the league's name.
//!
//! Titles carry the final score (`Arsenal 2:1 Chelsea`); it is kept in the
//! record but replaced by a dash in the announcement.

use crate::config::JobSettings;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::html::{self, attr, own_text, raw_text};
use crate::models::{League, Message, PageRequest, VideoItem};
use crate::outputs::telegram::escape_markdown;
use crate::pipeline::Listing;
use crate::utils::long_date_ru;
use chrono::{Duration, Local, NaiveDate};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

static SCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r" [0-9]+:[0-9]+ ").expect("score regex"));
static TODAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"час|мин|сек").expect("today regex"));
static DAYS_AGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"день|дней|дня").expect("days regex"));
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("number regex"));

const REVIEW_SUFFIX: &str = " | Обзор матча";

impl League {
    pub const ALL: [League; 2] = [League::EnglandPremierLeague, League::ChampionsLeague];

    /// Site section listing this league's videos.
    pub fn section(self) -> &'static str {
        match self {
            League::EnglandPremierLeague => "england",
            League::ChampionsLeague => "champions-league",
        }
    }

    /// Text every relevant video title contains.
    pub fn title_filter(self) -> &'static str {
        match self {
            League::EnglandPremierLeague => "Английская Премьер-Лига",
            League::ChampionsLeague => "Лига Чемпионов",
        }
    }

    fn from_section(section: &str) -> Option<League> {
        League::ALL.into_iter().find(|l| l.section() == section)
    }

    /// Page carrying the league table.
    pub fn standings_url(self) -> &'static str {
        match self {
            League::EnglandPremierLeague => "https://football.ua/england/table.html",
            League::ChampionsLeague => "https://sport.ua/cl/results/fixture",
        }
    }
}

/// Most rows a standings message carries.
const MAX_STANDINGS_ROWS: usize = 40;

/// Rows of the biggest table on a standings page, as trimmed cell texts.
///
/// Standings pages carry navigation and fixture tables too; the league table
/// is the one with the most data rows.
pub fn parse_standings(body: &str) -> Result<Vec<Vec<String>>> {
    let document = Html::parse_document(body);
    let table_sel = html::selector("table")?;
    let row_sel = html::selector("tr")?;
    let cell_sel = html::selector("td")?;

    let best = document
        .select(&table_sel)
        .map(|table| {
            table
                .select(&row_sel)
                .map(|row| {
                    row.select(&cell_sel)
                        .map(own_text)
                        .filter(|cell| !cell.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|cells| cells.len() >= 2)
                .collect::<Vec<_>>()
        })
        .max_by_key(Vec::len)
        .unwrap_or_default();

    Ok(best.into_iter().take(MAX_STANDINGS_ROWS).collect())
}

/// League table as a monospace block with aligned columns.
pub fn format_standings(league: League, rows: &[Vec<String>]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let columns = rows.iter().map(Vec::len).max().unwrap_or_default();
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or_default()
        })
        .collect();

    let lines = rows.iter().map(|row| {
        row.iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell.replace('`', "'"), width = *width))
            .join(" ")
            .trim_end()
            .to_string()
    });

    Some(format!(
        "*{}*\n```\n{}\n```",
        league.title_filter(),
        lines.collect::<Vec<_>>().join("\n")
    ))
}

/// Resolve the site's relative publication date ("3 часа назад",
/// "2 дня назад") against `today`.
pub fn resolve_relative_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    if TODAY.is_match(raw) {
        Some(today)
    } else if DAYS_AGO.is_match(raw) {
        let days: i64 = LEADING_NUMBER.captures(raw)?.get(1)?.as_str().parse().ok()?;
        Some(today - Duration::days(days))
    } else {
        None
    }
}

/// Split the score out of a title: `("Arsenal - Chelsea", Some("2:1"))`.
pub fn split_score(title: &str) -> (String, Option<String>) {
    let score = SCORE.find(title).map(|m| m.as_str().trim().to_string());
    let title = SCORE.replace(title, " - ").replace(REVIEW_SUFFIX, "");
    (title, score)
}

struct Selectors {
    item: Selector,
    link: Selector,
    info: Selector,
}

pub struct GoalJob {
    base_url: String,
    pages: usize,
    today: NaiveDate,
    standings: Vec<(League, String)>,
    sel: Selectors,
}

impl GoalJob {
    pub fn new(settings: &JobSettings) -> Result<Self> {
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            pages: settings.pages,
            today: Local::now().date_naive(),
            standings: League::ALL
                .into_iter()
                .map(|league| (league, league.standings_url().to_string()))
                .collect(),
            sel: Selectors {
                item: html::selector(".videos .col-lg-4")?,
                link: html::selector(".title a")?,
                info: html::selector(".info")?,
            },
        })
    }

    /// Pin the day relative dates are resolved against.
    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Read `league`'s table from another page.
    pub fn with_standings(mut self, league: League, url: impl Into<String>) -> Self {
        let url = url.into();
        match self.standings.iter_mut().find(|(l, _)| *l == league) {
            Some(entry) => entry.1 = url,
            None => self.standings.push((league, url)),
        }
        self
    }

    async fn standings(&self, fetcher: &Fetcher, league: League) -> Result<Option<String>> {
        let Some((_, url)) = self.standings.iter().find(|(l, _)| *l == league) else {
            return Ok(None);
        };
        info!(league = league.section(), %url, "Fetching standings");
        let rows = parse_standings(&fetcher.get_text(url).await?)?;
        if rows.is_empty() {
            warn!(league = league.section(), %url, "No standings table found");
        }
        Ok(format_standings(league, &rows))
    }
}

impl Listing for GoalJob {
    type Item = VideoItem;

    fn key(&self) -> &'static str {
        "goal"
    }

    fn pages(&self) -> Vec<PageRequest> {
        League::ALL
            .into_iter()
            .flat_map(|league| {
                (0..self.pages).map(move |page| {
                    PageRequest::new(
                        format!("{}/{}/{}", self.base_url, league.section(), page + 1),
                        league.section(),
                        page,
                    )
                })
            })
            .collect()
    }

    fn extract(&self, page: &PageRequest, body: &str) -> Result<Vec<VideoItem>> {
        let Some(league) = League::from_section(&page.label) else {
            warn!(label = %page.label, "Page does not belong to a known league");
            return Ok(Vec::new());
        };
        let document = Html::parse_document(body);
        let mut items = Vec::new();

        for el in document.select(&self.sel.item) {
            let Some(link_el) = el.select(&self.sel.link).next() else {
                warn!(label = %page.label, page = page.index, "Video card without a title link; skipping");
                continue;
            };
            let id = attr(el, &self.sel.link, "href")
                .map(|href| href.trim_start_matches('/').to_string())
                .unwrap_or_default();
            if id.is_empty() {
                warn!(label = %page.label, page = page.index, "Video link without a slug; skipping");
                continue;
            }

            // `.info` holds the views on its first line and the age on the second.
            let info = el
                .select(&self.sel.info)
                .next()
                .map(raw_text)
                .unwrap_or_default();
            let age = info.split('\n').nth(1).unwrap_or_default().trim();

            let raw_title = own_text(link_el);
            let (title, score) = split_score(&raw_title);
            items.push(VideoItem {
                link: format!("{}/{}", self.base_url, id),
                id,
                title,
                date: resolve_relative_date(age, self.today),
                score,
                league,
            });
        }

        debug!(label = %page.label, page = page.index, count = items.len(), "Parsed videos page");
        Ok(items)
    }

    fn keep(&self, item: &VideoItem) -> bool {
        item.title.contains(item.league.title_filter())
    }

    fn arrange(&self, mut items: Vec<VideoItem>) -> Vec<VideoItem> {
        // League order first; within a league oldest first, unknown dates last.
        items.sort_by_key(|item| (item.league, item.date.is_none(), item.date));
        items
    }

    fn render(&self, item: &VideoItem) -> Message {
        Message::Text(format_message(item))
    }

    fn group(&self, item: &VideoItem) -> Option<String> {
        Some(item.league.section().to_string())
    }

    /// The league table follows that league's highlights.
    async fn closing(&self, fetcher: &Fetcher, group: &str) -> Option<Message> {
        let league = League::from_section(group)?;
        match self.standings(fetcher, league).await {
            Ok(table) => table.map(Message::Text),
            Err(e) => {
                warn!(league = group, error = %e, "Standings fetching error");
                None
            }
        }
    }
}

pub fn format_message(item: &VideoItem) -> String {
    let mut lines = vec![escape_markdown(&item.title)];
    if let Some(date) = item.date {
        lines.push(format!("Дата: {}", long_date_ru(date)));
    }
    lines.push(format!("[Обзор]({})", item.link));
    lines.join("\n")
}
