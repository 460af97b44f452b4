//! Theatre, concert and circus events from
//! [kontramarka.ua](https://odessa.kontramarka.ua).
//!
//! # URL Pattern
//!
//! Category listings are paginated from zero: `/ru/{category}?page={n}`.
//! Event links look like `/ru/event/some-slug.html`; the slug is the id.
//!
//! Only events starting within the next seven days are announced. Events
//! further out are not recorded, so they come up again once they are close.

use crate::config::JobSettings;
use crate::error::Result;
use crate::html::{self, attr, text};
use crate::models::{EventDates, EventItem, Location, Message, PageRequest};
use crate::outputs::telegram::escape_markdown;
use crate::pipeline::Listing;
use crate::utils::parse_local_datetime;
use chrono::{DateTime, Duration, Local};
use scraper::{Html, Selector};
use tracing::{debug, warn};

pub const CATEGORIES: [&str; 3] = ["circus", "concert", "theatre"];

/// How far ahead events are announced.
const WINDOW_DAYS: i64 = 7;

struct Selectors {
    item: Selector,
    image_link: Selector,
    image: Selector,
    title: Selector,
    start_date: Selector,
    single_date: Selector,
    date_from: Selector,
    date_to: Selector,
    place_name: Selector,
    place_address: Selector,
    place_url: Selector,
    price: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            // Sic: the site misspells the container id.
            item: html::selector("#inner-events-contaienr .cat_item")?,
            image_link: html::selector(".cat_item__image")?,
            image: html::selector(".block-info meta[itemprop=image]")?,
            title: html::selector(".block-info__title span")?,
            start_date: html::selector(".block-info meta[itemprop=startDate]")?,
            single_date: html::selector(".dates .date_s")?,
            date_from: html::selector(".dates span:nth-child(2) span")?,
            date_to: html::selector(".dates span:nth-child(4) span")?,
            place_name: html::selector(r#"div[itemprop="location"] meta[itemprop=name]"#)?,
            place_address: html::selector(r#"div[itemprop="location"] meta[itemprop=address]"#)?,
            place_url: html::selector(r#"div[itemprop="location"] a[itemprop=url]"#)?,
            price: html::selector(".block-info__price")?,
        })
    }
}

pub struct EventsJob {
    base_url: String,
    pages: usize,
    now: DateTime<Local>,
    sel: Selectors,
}

impl EventsJob {
    pub fn new(settings: &JobSettings) -> Result<Self> {
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            pages: settings.pages,
            now: Local::now(),
            sel: Selectors::new()?,
        })
    }

    /// Pin the reference time used for the seven-day window.
    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }
}

/// `/ru/event/some-slug.html` → `some-slug`.
pub fn event_id(href: &str) -> String {
    href.get(4..)
        .unwrap_or_default()
        .replace(".html", "")
        .replace("event/", "")
}

impl Listing for EventsJob {
    type Item = EventItem;

    fn key(&self) -> &'static str {
        "events"
    }

    fn pages(&self) -> Vec<PageRequest> {
        CATEGORIES
            .iter()
            .flat_map(|category| {
                (0..self.pages).map(move |page| {
                    PageRequest::new(
                        format!("{}/ru/{}?page={}", self.base_url, category, page),
                        *category,
                        page,
                    )
                })
            })
            .collect()
    }

    fn extract(&self, page: &PageRequest, body: &str) -> Result<Vec<EventItem>> {
        let document = Html::parse_document(body);
        let sel = &self.sel;
        let mut items = Vec::new();

        for el in document.select(&sel.item) {
            let Some(href) = attr(el, &sel.image_link, "href") else {
                warn!(label = %page.label, page = page.index, "Event card without a link; skipping");
                continue;
            };
            let id = event_id(&href);
            if id.is_empty() {
                warn!(label = %page.label, page = page.index, %href, "Event link without a slug; skipping");
                continue;
            }

            let dates = if el.select(&sel.single_date).next().is_some() {
                EventDates::Single(text(el, &sel.single_date))
            } else {
                EventDates::Range(text(el, &sel.date_from), text(el, &sel.date_to))
            };

            items.push(EventItem {
                id,
                image: attr(el, &sel.image, "content"),
                title: text(el, &sel.title),
                start_date: attr(el, &sel.start_date, "content").unwrap_or_default(),
                dates,
                location: Location {
                    name: attr(el, &sel.place_name, "content").unwrap_or_default(),
                    address: attr(el, &sel.place_address, "content").unwrap_or_default(),
                    url: format!(
                        "{}{}",
                        self.base_url,
                        attr(el, &sel.place_url, "href").unwrap_or_default()
                    ),
                },
                price: text(el, &sel.price),
                url: format!("{}{}", self.base_url, href),
            });
        }

        debug!(label = %page.label, page = page.index, count = items.len(), "Parsed events page");
        Ok(items)
    }

    fn keep(&self, item: &EventItem) -> bool {
        let Some(start) = parse_local_datetime(&item.start_date) else {
            warn!(id = %item.id, start = %item.start_date, "Unparseable start date; skipping");
            return false;
        };
        start > self.now && start < self.now + Duration::days(WINDOW_DAYS)
    }

    fn arrange(&self, mut items: Vec<EventItem>) -> Vec<EventItem> {
        items.sort_by_key(|item| parse_local_datetime(&item.start_date));
        items
    }

    fn render(&self, item: &EventItem) -> Message {
        let caption = format_message(item);
        match &item.image {
            Some(url) => Message::Photo {
                url: url.clone(),
                caption,
            },
            None => Message::Text(caption),
        }
    }
}

pub fn format_message(item: &EventItem) -> String {
    let start = parse_local_datetime(&item.start_date);
    let weekday = start
        .map(|s| crate::utils::weekday_short_ru(s.date_naive()))
        .unwrap_or_default();
    let time = start.map(|s| s.format("%H:%M").to_string()).unwrap_or_default();
    let dates = match &item.dates {
        EventDates::Single(d) => d.clone(),
        EventDates::Range(from, to) => format!("{from} - {to}"),
    };

    [
        format!("[{}]({})", escape_markdown(&item.title), item.url),
        format!("Дата: {} {}", weekday, escape_markdown(&dates)),
        format!("Время: {time}"),
        format!(
            "Место: [{} {}]({})",
            escape_markdown(&item.location.name),
            escape_markdown(&item.location.address),
            item.location.url
        ),
        format!("Цена: {}", escape_markdown(&item.price)),
    ]
    .join("\n")
}
