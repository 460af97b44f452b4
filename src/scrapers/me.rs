//! Personal evening digest: tomorrow's weather, the USD street rate and the
//! Bitcoin price, sent as one message.
//!
//! There is nothing to deduplicate here, so this job bypasses the pipeline
//! and the state store entirely. Every source is best effort; a source that
//! fails simply drops its line from the digest.

use crate::cli::MeArgs;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::html::{self, attr};
use crate::models::{Message, Rates, UsdRate, WeatherSlot};
use crate::outputs::telegram::Notifier;
use crate::pipeline::RunReport;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use itertools::{Itertools, MinMaxResult};
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const WEATHER_API: &str = "http://api.openweathermap.org";
pub const KURS_PAGE: &str = "https://kurs.com.ua/gorod/1551-odessa/";
pub const BITCOIN_API: &str = "https://api.coindesk.com/v1/bpi/currentprice.json";

const BLACK_MARKET_ROW: &str = r#"[data-blockid="app_kurs_blackMarket_k7vzyzbxe"] tbody tr:first-child"#;

/// Where the digest's data comes from.
#[derive(Debug, Clone)]
pub struct Sources {
    pub weather_api: String,
    pub kurs_page: String,
    pub bitcoin_api: String,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            weather_api: WEATHER_API.to_string(),
            kurs_page: KURS_PAGE.to_string(),
            bitcoin_api: BITCOIN_API.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt_txt: String,
    main: ForecastMain,
    #[serde(default)]
    weather: Vec<ForecastWeather>,
}

#[derive(Debug, Deserialize)]
struct ForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastWeather {
    description: String,
}

pub struct MeJob {
    api_key: Option<String>,
    city: String,
    tomorrow: NaiveDate,
    sources: Sources,
}

impl MeJob {
    pub fn new(args: &MeArgs) -> Self {
        Self {
            api_key: args.weather_api_key.clone(),
            city: args.city.clone(),
            tomorrow: Local::now().date_naive() + Duration::days(1),
            sources: Sources::default(),
        }
    }

    pub fn with_sources(mut self, sources: Sources) -> Self {
        self.sources = sources;
        self
    }

    /// Pin the day the forecast is taken for.
    pub fn for_day(mut self, day: NaiveDate) -> Self {
        self.tomorrow = day;
        self
    }

    async fn weather(&self, fetcher: &Fetcher) -> Option<Vec<WeatherSlot>> {
        let Some(key) = &self.api_key else {
            warn!("No weather API key; skipping forecast");
            return None;
        };
        info!("Fetching weather...");
        let url = format!(
            "{}/data/2.5/forecast?q={}&lang=ru&units=metric&appid={}",
            self.sources.weather_api.trim_end_matches('/'),
            urlencoding::encode(&self.city),
            key
        );
        match fetcher.get_json::<Forecast>(&url).await {
            Ok(forecast) => Some(daytime_slots(forecast, self.tomorrow)),
            Err(e) => {
                warn!(error = %e, "Fetching weather error");
                None
            }
        }
    }

    async fn usd(&self, fetcher: &Fetcher) -> Option<UsdRate> {
        info!("Fetching usd...");
        let parsed = fetcher
            .get_text(&self.sources.kurs_page)
            .await
            .and_then(|body| parse_black_market(&body));
        match parsed {
            Ok(rate) => {
                if rate.is_none() {
                    warn!("USD black market row not found");
                }
                rate
            }
            Err(e) => {
                warn!(error = %e, "Fetching usd error");
                None
            }
        }
    }

    async fn bitcoin(&self, fetcher: &Fetcher) -> Option<String> {
        info!("Fetching bitcoin...");
        match fetcher.get_json::<Value>(&self.sources.bitcoin_api).await {
            Ok(doc) => doc
                .pointer("/bpi/USD/rate")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                warn!(error = %e, "Fetching bitcoin error");
                None
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(job = "me"))]
    pub async fn run<N: Notifier>(
        &self,
        fetcher: &Fetcher,
        notifier: &N,
        chat: &str,
    ) -> Result<RunReport> {
        let t0 = Instant::now();
        let (weather, usd, bitcoin) =
            tokio::join!(self.weather(fetcher), self.usd(fetcher), self.bitcoin(fetcher));

        let answered = [weather.is_some(), usd.is_some(), bitcoin.is_some()];
        let failed_sources = answered.iter().filter(|ok| !**ok).count();

        let rates = Rates { usd, bitcoin };
        let digest = format_digest(weather.as_deref().unwrap_or_default(), &rates);
        info!(
            usd = ?rates.usd,
            bitcoin = rates.bitcoin.as_deref().unwrap_or(""),
            "Sending message..."
        );
        notifier.send(chat, &Message::Text(digest)).await?;

        info!(
            failed_sources,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "done"
        );
        Ok(RunReport {
            pages: answered.len(),
            failed_pages: failed_sources,
            extracted: answered.len() - failed_sources,
            fresh: 1,
            delivered: 1,
            ..RunReport::default()
        })
    }
}

/// Forecast slots of `day` strictly between 07:00 and 23:00.
fn daytime_slots(forecast: Forecast, day: NaiveDate) -> Vec<WeatherSlot> {
    let (Some(from), Some(to)) = (day.and_hms_opt(7, 0, 0), day.and_hms_opt(23, 0, 0)) else {
        return Vec::new();
    };

    forecast
        .list
        .into_iter()
        .filter_map(|entry| {
            let time = NaiveDateTime::parse_from_str(&entry.dt_txt, "%Y-%m-%d %H:%M:%S").ok()?;
            Some(WeatherSlot {
                time,
                temp: entry.main.temp,
                description: entry
                    .weather
                    .into_iter()
                    .next()
                    .map(|w| w.description)
                    .unwrap_or_default(),
            })
        })
        .filter(|slot| slot.time > from && slot.time < to)
        .collect()
}

/// Buy/sell from the first black-market row of the rates page.
pub fn parse_black_market(body: &str) -> Result<Option<UsdRate>> {
    let document = Html::parse_document(body);
    let row_sel = html::selector(BLACK_MARKET_ROW)?;
    let bid = html::selector(r#"[data-rate-type="bid"]"#)?;
    let ask = html::selector(r#"[data-rate-type="ask"]"#)?;

    Ok(document.select(&row_sel).next().and_then(|row| {
        Some(UsdRate {
            buy: attr(row, &bid, "data-rate")?,
            sell: attr(row, &ask, "data-rate")?,
        })
    }))
}

/// `12-17 10 облачно 16 ясно`: the range (or a single value), then each
/// change of conditions with its hour.
pub fn format_weather(slots: &[WeatherSlot]) -> Option<String> {
    let range = match slots.iter().map(|s| s.temp.round() as i64).minmax() {
        MinMaxResult::NoElements => return None,
        MinMaxResult::OneElement(t) => t.to_string(),
        MinMaxResult::MinMax(min, max) if min == max => min.to_string(),
        MinMaxResult::MinMax(min, max) => format!("{min}-{max}"),
    };

    let changes = slots
        .iter()
        .dedup_by(|a, b| a.description == b.description)
        .map(|s| format!("{} {}", s.time.format("%-H"), s.description));

    Some(std::iter::once(range).chain(changes).join(" "))
}

pub fn format_digest(weather: &[WeatherSlot], rates: &Rates) -> String {
    [
        Some("Привет".to_string()),
        format_weather(weather).map(|w| format!("Погода {w}")),
        rates
            .usd
            .as_ref()
            .map(|usd| format!("USD {} {}", usd.buy, usd.sell)),
        rates.bitcoin.as_ref().map(|rate| format!("Bitcoin {rate}")),
    ]
    .into_iter()
    .flatten()
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use crate::pipeline::testing::RecordingNotifier;
    use mockito::Matcher;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn slot(hour: u32, temp: f64, description: &str) -> WeatherSlot {
        WeatherSlot {
            time: day().and_hms_opt(hour, 0, 0).unwrap(),
            temp,
            description: description.into(),
        }
    }

    const KURS: &str = r#"<html><body>
      <div data-blockid="app_kurs_blackMarket_k7vzyzbxe">
        <table><tbody>
          <tr><td>USD</td><td data-rate-type="bid" data-rate="41.35">41,35</td><td data-rate-type="ask" data-rate="41.60">41,60</td></tr>
          <tr><td>EUR</td><td data-rate-type="bid" data-rate="48.10">48,10</td><td data-rate-type="ask" data-rate="48.50">48,50</td></tr>
        </tbody></table>
      </div>
    </body></html>"#;

    const FORECAST: &str = r#"{"list":[
      {"dt_txt":"2026-10-17 06:00:00","main":{"temp":8.2},"weather":[{"description":"ясно"}]},
      {"dt_txt":"2026-10-17 09:00:00","main":{"temp":11.6},"weather":[{"description":"облачно"}]},
      {"dt_txt":"2026-10-17 12:00:00","main":{"temp":15.4},"weather":[{"description":"облачно"}]},
      {"dt_txt":"2026-10-17 15:00:00","main":{"temp":17.1},"weather":[{"description":"небольшой дождь"}]},
      {"dt_txt":"2026-10-17 18:00:00","main":{"temp":14.0},"weather":[{"description":"облачно"}]},
      {"dt_txt":"2026-10-17 23:00:00","main":{"temp":10.0},"weather":[{"description":"ясно"}]},
      {"dt_txt":"2026-10-18 09:00:00","main":{"temp":12.0},"weather":[{"description":"ясно"}]}
    ]}"#;

    #[test]
    fn test_parse_black_market_takes_first_row() {
        let rate = parse_black_market(KURS).unwrap().unwrap();
        assert_eq!(rate.buy, "41.35");
        assert_eq!(rate.sell, "41.60");
        assert_eq!(parse_black_market("<html></html>").unwrap(), None);
    }

    #[test]
    fn test_daytime_slots_are_exclusive() {
        let forecast: Forecast = serde_json::from_str(FORECAST).unwrap();
        let slots = daytime_slots(forecast, day());
        let hours: Vec<String> = slots.iter().map(|s| s.time.format("%H").to_string()).collect();
        assert_eq!(hours, vec!["09", "12", "15", "18"]);
    }

    #[test]
    fn test_format_weather() {
        let slots = vec![
            slot(9, 11.6, "облачно"),
            slot(12, 15.4, "облачно"),
            slot(15, 17.1, "небольшой дождь"),
            slot(18, 14.0, "облачно"),
        ];
        assert_eq!(
            format_weather(&slots).as_deref(),
            Some("12-17 9 облачно 15 небольшой дождь 18 облачно")
        );

        let flat = vec![slot(9, 12.2, "ясно"), slot(12, 11.9, "ясно")];
        assert_eq!(format_weather(&flat).as_deref(), Some("12 9 ясно"));
        assert_eq!(format_weather(&[]), None);
    }

    #[test]
    fn test_format_digest_drops_missing_sources() {
        let rates = Rates {
            usd: Some(UsdRate {
                buy: "41.35".into(),
                sell: "41.60".into(),
            }),
            bitcoin: None,
        };
        assert_eq!(
            format_digest(&[slot(9, 11.0, "ясно")], &rates),
            "Привет\nПогода 11 9 ясно\nUSD 41.35 41.60"
        );
        assert_eq!(format_digest(&[], &Rates::default()), "Привет");
    }

    #[tokio::test]
    async fn test_run_sends_digest_when_a_source_fails() {
        let mut server = mockito::Server::new_async().await;
        let _weather = server
            .mock("GET", "/data/2.5/forecast")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Odessa,ua".into()),
                Matcher::UrlEncoded("units".into(), "metric".into()),
                Matcher::UrlEncoded("appid".into(), "KEY".into()),
            ]))
            .with_body(FORECAST)
            .create_async()
            .await;
        let _kurs = server
            .mock("GET", "/kurs")
            .with_body(KURS)
            .create_async()
            .await;
        let _btc = server
            .mock("GET", "/btc")
            .with_status(503)
            .create_async()
            .await;

        let job = MeJob::new(&MeArgs {
            weather_api_key: Some("KEY".into()),
            city: "Odessa,ua".into(),
        })
        .for_day(day())
        .with_sources(Sources {
            weather_api: server.url(),
            kurs_page: format!("{}/kurs", server.url()),
            bitcoin_api: format!("{}/btc", server.url()),
        });

        let notifier = RecordingNotifier::default();
        let fetcher = Fetcher::new(&HttpSettings::default()).unwrap();
        let report = job.run(&fetcher, &notifier, "42").await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!((report.pages, report.failed_pages, report.extracted), (3, 1, 2));
        assert_eq!(
            notifier.bodies(),
            vec!["Привет\nПогода 12-17 9 облачно 15 небольшой дождь 18 облачно\nUSD 41.35 41.60"]
        );
    }
}
