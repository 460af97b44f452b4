//! Small helpers over `scraper` used by the extractors.

use crate::error::{Error, Result};
use scraper::{ElementRef, Selector};

/// Compile a CSS selector, reporting bad selectors as errors.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::Selector(css.to_string()))
}

/// Text of the first element matching `sel` under `el`, whitespace-collapsed
/// and trimmed. Empty when nothing matches.
pub fn text(el: ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel).next().map(own_text).unwrap_or_default()
}

/// Whitespace-collapsed text of `el` itself.
pub fn own_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Raw text of `el`, line structure kept.
pub fn raw_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Attribute `name` of the first element matching `sel` under `el`.
pub fn attr(el: ElementRef<'_>, sel: &Selector, name: &str) -> Option<String> {
    el.select(sel)
        .next()
        .and_then(|e| e.value().attr(name))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const PAGE: &str = r#"
        <div class="card">
          <a class="title" href="/one">  First
             title </a>
          <meta itemprop="image" content="http://img/1.png">
        </div>
        <div class="card"><a class="title" href="/two">Second</a></div>
    "#;

    #[test]
    fn test_invalid_selector_is_error() {
        assert!(matches!(selector("div[["), Err(Error::Selector(_))));
    }

    #[test]
    fn test_text_and_attr() {
        let document = Html::parse_document(PAGE);
        let card = selector(".card").unwrap();
        let cards: Vec<_> = document.select(&card).collect();
        let title = selector("a.title").unwrap();
        let image = selector("meta[itemprop=image]").unwrap();

        assert_eq!(cards.len(), 2);
        assert_eq!(text(cards[0], &title), "First title");
        assert_eq!(attr(cards[0], &title, "href").as_deref(), Some("/one"));
        assert_eq!(attr(cards[0], &image, "content").as_deref(), Some("http://img/1.png"));
        assert_eq!(attr(cards[1], &image, "content"), None);
        assert_eq!(text(cards[1], &image), "");
    }
}
