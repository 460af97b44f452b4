//! The scrape → dedupe → notify pipeline every listing job runs through.
//!
//! A job describes *what* to scrape by implementing [`Listing`]; the
//! [`Pipeline`] owns *how*:
//!
//! 1. **Baseline**: load the already-announced records for the job
//! 2. **Fetch**: request every listing page in parallel, failures isolated
//! 3. **Extract**: parse each page into records, in page order
//! 4. **Dedupe**: drop records already announced or repeated within the run,
//!    then apply the job's own filter
//! 5. **Enrich / arrange**: optional best-effort decoration, final ordering
//! 6. **Deliver**: send messages one by one, each failure isolated
//! 7. **Persist**: append the new records to the baseline and write it back
//!
//! Nothing is persisted when no new record was found. Delivery happens before
//! persisting, so a crash in between re-announces on the next run rather than
//! silently losing items.

use crate::error::Result;
use crate::fetch::Fetcher;
use crate::models::{Message, PageRequest};
use crate::outputs::telegram::Notifier;
use crate::store::{StateStore, seen_ids};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// A scraped item with a stable identity, derived from its detail-page URL.
pub trait Record: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &str;
}

/// Everything source-specific about a listing job.
pub trait Listing {
    type Item: Record;

    /// Name of the job; also the state document key.
    fn key(&self) -> &'static str;

    /// Pages to fetch, in the order their items should be considered.
    fn pages(&self) -> Vec<PageRequest>;

    /// Turn one page body into records.
    fn extract(&self, page: &PageRequest, body: &str) -> Result<Vec<Self::Item>>;

    /// Source-specific filter applied to records that are new.
    fn keep(&self, _item: &Self::Item) -> bool {
        true
    }

    /// Best-effort decoration of new records before they are announced.
    async fn enrich(&self, items: Vec<Self::Item>) -> Vec<Self::Item> {
        items
    }

    /// Final announcement order.
    fn arrange(&self, items: Vec<Self::Item>) -> Vec<Self::Item> {
        items
    }

    /// Group an announcement belongs to. Items of one group must be adjacent
    /// after [`Listing::arrange`]; each group may end with a closing message.
    fn group(&self, _item: &Self::Item) -> Option<String> {
        None
    }

    /// Message sent after the last announcement of `group`, if any.
    async fn closing(&self, _fetcher: &Fetcher, _group: &str) -> Option<Message> {
        None
    }

    fn render(&self, item: &Self::Item) -> Message;
}

/// Counters for one run, logged at the end and handy in tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub pages: usize,
    pub failed_pages: usize,
    pub extracted: usize,
    pub fresh: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Group closing messages sent.
    pub closings: usize,
    pub persisted: bool,
}

/// Keep the records whose id is not in `seen`, dropping repeats within the
/// batch (first occurrence wins). Order is preserved.
pub fn dedupe<T: Record>(items: Vec<T>, seen: &HashSet<String>) -> Vec<T> {
    let mut taken: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|item| !seen.contains(item.id()) && taken.insert(item.id().to_string()))
        .collect()
}

pub struct Pipeline<'a, S, N> {
    pub fetcher: &'a Fetcher,
    pub store: &'a S,
    pub notifier: &'a N,
    pub chat: &'a str,
    /// Skip writing the baseline back.
    pub dry_run: bool,
}

impl<'a, S: StateStore, N: Notifier> Pipeline<'a, S, N> {
    #[instrument(level = "info", skip_all, fields(job = listing.key()))]
    pub async fn run<L: Listing>(&self, listing: &L) -> Result<RunReport> {
        let t0 = Instant::now();
        let mut report = RunReport::default();

        // Without a baseline every item would look new; refuse to run.
        let baseline = self.store.load(listing.key()).await?;
        let seen = seen_ids(&baseline);
        info!(seen = seen.len(), "Loaded baseline");

        let requests = listing.pages();
        report.pages = requests.len();
        let pages = self.fetcher.fetch_pages(&requests).await;

        let mut extracted = Vec::new();
        for page in &pages {
            let Some(body) = &page.body else {
                report.failed_pages += 1;
                continue;
            };
            match listing.extract(&page.request, body) {
                Ok(items) => {
                    if items.is_empty() {
                        warn!(label = %page.request.label, page = page.request.index, "Page is empty");
                    }
                    extracted.extend(items);
                }
                Err(e) => {
                    report.failed_pages += 1;
                    error!(label = %page.request.label, page = page.request.index, error = %e, "Page parsing error");
                }
            }
        }
        report.extracted = extracted.len();
        info!(count = extracted.len(), "Data filtering");

        let fresh: Vec<L::Item> = dedupe(extracted, &seen)
            .into_iter()
            .filter(|item| listing.keep(item))
            .collect();
        info!(count = fresh.len(), "Data filtered");

        let fresh = listing.arrange(listing.enrich(fresh).await);
        report.fresh = fresh.len();

        if fresh.is_empty() {
            info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Nothing new");
            return Ok(report);
        }

        for (i, item) in fresh.iter().enumerate() {
            let message = listing.render(item);
            match self.notifier.send(self.chat, &message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(id = item.id(), error = %e, "Sending message error");
                }
            }

            let Some(group) = listing.group(item) else {
                continue;
            };
            if fresh.get(i + 1).and_then(|next| listing.group(next)).as_ref() == Some(&group) {
                continue;
            }
            if let Some(closing) = listing.closing(self.fetcher, &group).await {
                match self.notifier.send(self.chat, &closing).await {
                    Ok(()) => report.closings += 1,
                    Err(e) => error!(%group, error = %e, "Sending closing message error"),
                }
            }
        }

        if self.dry_run {
            info!("Dry run; baseline left untouched");
        } else {
            let mut records = baseline;
            for item in &fresh {
                records.push(serde_json::to_value(item)?);
            }
            self.store.save(listing.key(), &records).await?;
            report.persisted = true;
        }

        info!(
            pages = report.pages,
            failed_pages = report.failed_pages,
            extracted = report.extracted,
            fresh = report.fresh,
            delivered = report.delivered,
            failed = report.failed,
            closings = report.closings,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "done"
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory store and notifier shared by the job tests.

    use super::*;
    use crate::error::Error;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        pub docs: Mutex<HashMap<String, Vec<Value>>>,
        pub saves: Mutex<usize>,
        pub fail_load: bool,
    }

    impl MemoryStore {
        pub fn with(key: &str, records: Vec<Value>) -> Self {
            let store = Self::default();
            store.docs.lock().unwrap().insert(key.to_string(), records);
            store
        }

        pub fn doc(&self, key: &str) -> Vec<Value> {
            self.docs.lock().unwrap().get(key).cloned().unwrap_or_default()
        }
    }

    impl StateStore for MemoryStore {
        async fn load(&self, key: &str) -> Result<Vec<Value>> {
            if self.fail_load {
                return Err(Error::State {
                    key: key.to_string(),
                    reason: "unavailable".into(),
                });
            }
            Ok(self.doc(key))
        }

        async fn save(&self, key: &str, records: &[Value]) -> Result<()> {
            *self.saves.lock().unwrap() += 1;
            self.docs
                .lock()
                .unwrap()
                .insert(key.to_string(), records.to_vec());
            Ok(())
        }
    }

    /// Records messages; fails for any message whose body contains `fail_on`.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Message>>,
        pub fail_on: Option<String>,
    }

    impl RecordingNotifier {
        pub fn bodies(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|m| m.body().to_string())
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn send(&self, _chat: &str, message: &Message) -> Result<()> {
            if let Some(needle) = &self.fail_on {
                if message.body().contains(needle.as_str()) {
                    return Err(Error::Telegram("Bad Request".into()));
                }
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }
}
