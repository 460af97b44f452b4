//! New-construction housing from [LUN novostroyki](https://novostroyki.lun.ua).
//!
//! # URL Pattern
//!
//! The Odessa catalogue is paginated from one. A complex's card links to
//! `/{slug}`; the slug is the id. The developer's website is hidden behind a
//! redirect link (`...?to=<encoded url>`).

use crate::config::JobSettings;
use crate::error::Result;
use crate::html::{self, attr, text};
use crate::models::{Developer, FlatItem, Message, PageRequest};
use crate::outputs::telegram::escape_markdown;
use crate::pipeline::Listing;
use scraper::{Html, Selector};
use tracing::{debug, warn};

/// `все-новостройки-одессы`, percent-encoded.
pub const CATALOGUE_PATH: &str = "/%D0%B2%D1%81%D0%B5-%D0%BD%D0%BE%D0%B2%D0%BE%D1%81%D1%82%D1%80%D0%BE%D0%B9%D0%BA%D0%B8-%D0%BE%D0%B4%D0%B5%D1%81%D1%81%D1%8B";

struct Selectors {
    item: Selector,
    link: Selector,
    developer_name: Selector,
    developer_link: Selector,
    image: Selector,
    title: Selector,
    location: Selector,
    price: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            item: html::selector(".card-grid .card-grid-cell")?,
            link: html::selector(".card>a")?,
            developer_name: html::selector(".card-content .card-text:nth-child(3)")?,
            developer_link: html::selector(".card-content .card-actions a")?,
            image: html::selector(".card-image")?,
            title: html::selector(".card-title")?,
            location: html::selector(".card-location")?,
            price: html::selector(".card-content .card-price-value")?,
        })
    }
}

pub struct FlatsJob {
    base_url: String,
    pages: usize,
    sel: Selectors,
}

impl FlatsJob {
    pub fn new(settings: &JobSettings) -> Result<Self> {
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            pages: settings.pages,
            sel: Selectors::new()?,
        })
    }
}

/// Decode the target of a `...?to=<encoded url>` redirect link.
pub fn redirect_target(href: &str) -> Option<String> {
    let (_, encoded) = href.split_once("to=")?;
    let encoded = encoded.split('&').next().unwrap_or(encoded);
    urlencoding::decode(encoded)
        .ok()
        .map(|s| s.into_owned())
        .filter(|s| !s.is_empty())
}

/// Protocol-relative image sources get an explicit scheme.
fn absolute_image(src: String) -> String {
    if src.starts_with("//") {
        format!("http:{src}")
    } else {
        src
    }
}

impl Listing for FlatsJob {
    type Item = FlatItem;

    fn key(&self) -> &'static str {
        "flats"
    }

    fn pages(&self) -> Vec<PageRequest> {
        (0..self.pages)
            .map(|page| {
                PageRequest::new(
                    format!("{}{}?page={}", self.base_url, CATALOGUE_PATH, page + 1),
                    "catalogue",
                    page,
                )
            })
            .collect()
    }

    fn extract(&self, page: &PageRequest, body: &str) -> Result<Vec<FlatItem>> {
        let document = Html::parse_document(body);
        let sel = &self.sel;
        let mut items = Vec::new();

        for el in document.select(&sel.item) {
            let Some(href) = attr(el, &sel.link, "href") else {
                warn!(page = page.index, "Card without a link; skipping");
                continue;
            };
            let id = href.trim_start_matches('/').to_string();
            if id.is_empty() {
                warn!(page = page.index, %href, "Card link without a slug; skipping");
                continue;
            }

            let name = text(el, &sel.developer_name);
            let developer = Developer {
                name: Some(name).filter(|n| !n.is_empty()),
                website: attr(el, &sel.developer_link, "href")
                    .as_deref()
                    .and_then(redirect_target),
            };

            items.push(FlatItem {
                link: format!("{}/{}", self.base_url, id),
                id,
                image: attr(el, &sel.image, "src").map(absolute_image),
                title: text(el, &sel.title),
                location: text(el, &sel.location),
                price: text(el, &sel.price),
                developer,
            });
        }

        // The catalogue lists newest first; announce oldest first within a page.
        items.reverse();
        debug!(page = page.index, count = items.len(), "Parsed catalogue page");
        Ok(items)
    }

    fn render(&self, item: &FlatItem) -> Message {
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

pub fn format_message(item: &FlatItem) -> String {
    let developer = match (&item.developer.name, &item.developer.website) {
        (Some(name), Some(site)) => Some(format!("[{}]({})", escape_markdown(name), site)),
        (Some(name), None) => Some(escape_markdown(name)),
        (None, Some(site)) => Some(site.clone()),
        (None, None) => None,
    };

    [
        Some(format!("[{}]({})", escape_markdown(&item.title), item.link)),
        developer.map(|d| format!("Девелопер: {d}")),
        Some(format!("Район: {}", escape_markdown(&item.location))),
        Some(format!("Цена: {}", escape_markdown(&item.price))),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n")
}
