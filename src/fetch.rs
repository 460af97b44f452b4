//! HTTP fetching with per-page failure isolation.
//!
//! All jobs share one [`Fetcher`] per run. Listing pages are requested in
//! parallel; a page that fails is logged and skipped so the rest of the run
//! carries on with whatever did arrive.

use crate::config::HttpSettings;
use crate::error::Result;
use crate::models::PageRequest;
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// A fetched page; `body` is `None` when the request failed.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub request: PageRequest,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    concurrency: Option<usize>,
}

impl Fetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            concurrency: settings.concurrency,
        })
    }

    /// The underlying client, for callers that need custom requests.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET a URL and return the body. Non-2xx statuses are errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    /// GET a URL and decode the JSON body.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch every page in parallel, keeping request order in the result.
    ///
    /// A failed page yields `body: None` and does not affect the others.
    #[instrument(level = "info", skip_all, fields(pages = requests.len()))]
    pub async fn fetch_pages(&self, requests: &[PageRequest]) -> Vec<FetchedPage> {
        let t0 = Instant::now();
        let limit = self.concurrency.unwrap_or(requests.len()).max(1);

        let pages: Vec<FetchedPage> = stream::iter(requests.iter().cloned())
            .map(|request| async move {
                info!(label = %request.label, page = request.index, "Fetching page");
                let body = match self.get_text(&request.url).await {
                    Ok(body) => {
                        debug!(url = %request.url, bytes = body.len(), "Page fetched");
                        Some(body)
                    }
                    Err(e) => {
                        error!(label = %request.label, page = request.index, url = %request.url, error = %e, "Page fetching error");
                        None
                    }
                };
                FetchedPage { request, body }
            })
            .buffered(limit)
            .collect()
            .await;

        let ok = pages.iter().filter(|p| p.body.is_some()).count();
        info!(
            fetched = ok,
            failed = pages.len() - ok,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Pages fetched"
        );
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fetcher() -> Fetcher {
        Fetcher::new(&HttpSettings {
            timeout: Duration::from_secs(5),
            ..HttpSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_page_is_isolated_and_order_kept() {
        let mut server = mockito::Server::new_async().await;
        let _p0 = server
            .mock("GET", "/list?page=0")
            .with_body("zero")
            .create_async()
            .await;
        let _p1 = server
            .mock("GET", "/list?page=1")
            .with_status(500)
            .create_async()
            .await;
        let _p2 = server
            .mock("GET", "/list?page=2")
            .with_body("two")
            .create_async()
            .await;

        let requests: Vec<PageRequest> = (0..3)
            .map(|i| PageRequest::new(format!("{}/list?page={}", server.url(), i), "list", i))
            .collect();

        let pages = fetcher().fetch_pages(&requests).await;

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].body.as_deref(), Some("zero"));
        assert_eq!(pages[1].body, None);
        assert_eq!(pages[2].body.as_deref(), Some("two"));
        assert_eq!(pages[2].request.index, 2);
    }

    #[tokio::test]
    async fn test_bounded_concurrency_keeps_order_and_isolation() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for (path, status) in [("/a", 200), ("/b", 503), ("/c", 200), ("/d", 200)] {
            mocks.push(
                server
                    .mock("GET", path)
                    .with_status(status)
                    .with_body(path.trim_start_matches('/'))
                    .expect(2)
                    .create_async()
                    .await,
            );
        }
        let requests: Vec<PageRequest> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, p)| PageRequest::new(format!("{}/{p}", server.url()), "list", i))
            .collect();

        // Zero is clamped to one request at a time instead of stalling.
        for concurrency in [Some(1), Some(0)] {
            let fetcher = Fetcher::new(&HttpSettings {
                concurrency,
                ..HttpSettings::default()
            })
            .unwrap();
            let bodies: Vec<Option<String>> = fetcher
                .fetch_pages(&requests)
                .await
                .into_iter()
                .map(|page| page.body)
                .collect();
            assert_eq!(
                bodies,
                vec![Some("a".into()), None, Some("c".into()), Some("d".into())]
            );
        }
        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_get_json() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/rate.json")
            .with_header("content-type", "application/json")
            .with_body(r#"{"rate": "1.5"}"#)
            .create_async()
            .await;

        let value: serde_json::Value = fetcher()
            .get_json(&format!("{}/rate.json", server.url()))
            .await
            .unwrap();
        assert_eq!(value["rate"], "1.5");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_error() {
        let result = fetcher().get_text("http://127.0.0.1:1/nothing").await;
        assert!(result.is_err());
    }
}
