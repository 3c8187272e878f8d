//! Sina Finance provider.
//!
//! Daily klines come from the `CN_MarketDataService.getKLineData` endpoint and
//! listings from the `Market_Center.getHQNodeData` endpoint. Both return JSON
//! whose numeric fields are sometimes quoted strings, so every field goes
//! through the same coercion as CSV text.
//!
//! Klines are unadjusted. With [`PriceAdjustment::Forward`] the provider also
//! downloads the symbol's forward-adjustment factor table (`qfq.js`) and
//! divides each bar's OHLC by the factor in force on that date.
//!
//! Every request passes the shared rate limiter and circuit breaker. A 403
//! trips the breaker at once; 429s, server errors and broken response bodies
//! are retried with backoff.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataSource, FetchResult, HistoryProvider, ListingProvider};
use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use crate::domain::{AssetClass, Instrument, RawBar};
use crate::metrics::{coerce_price, coerce_volume};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const KLINE_URL: &str =
    "https://quotes.sina.cn/cn/api/json_v2.php/CN_MarketDataService.getKLineData";
const LISTING_URL: &str =
    "https://vip.stock.finance.sina.com.cn/quotes_service/api/json_v2.php/Market_Center.getHQNodeData";
const FACTOR_URL: &str = "https://finance.sina.com.cn/realstock/company";
const REFERER: &str = "https://finance.sina.com.cn";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Rows per listing page; the endpoint caps `num` at 100.
const LISTING_PAGE_SIZE: usize = 100;

/// Price basis of the returned bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceAdjustment {
    /// Prices as traded.
    #[default]
    Raw,
    /// Scaled so that splits and dividends do not show up as price jumps.
    Forward,
}

/// Network settings for the Sina provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinaConfig {
    pub timeout_secs: u64,
    pub requests_per_second: f64,
    pub burst: u32,
    pub retry: RetryPolicy,
    /// Breaker cooldown after a ban or repeated failures.
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
    /// Upper bound on listing pages, guards against a paginator that never empties.
    pub max_listing_pages: usize,
    pub adjustment: PriceAdjustment,
}

impl Default for SinaConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            requests_per_second: 5.0,
            burst: 5,
            retry: RetryPolicy::default(),
            breaker_cooldown_secs: 600,
            breaker_failure_threshold: 5,
            max_listing_pages: 100,
            adjustment: PriceAdjustment::Raw,
        }
    }
}

/// A JSON scalar that may arrive quoted or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(f64),
}

impl TextOrNumber {
    fn price(&self) -> Option<f64> {
        match self {
            TextOrNumber::Text(s) => coerce_price(s),
            TextOrNumber::Number(n) => (n.is_finite() && *n > 0.0).then_some(*n),
        }
    }

    fn volume(&self) -> Option<u64> {
        match self {
            TextOrNumber::Text(s) => coerce_volume(s),
            TextOrNumber::Number(n) => (n.is_finite() && *n >= 0.0).then_some(n.trunc() as u64),
        }
    }

    fn text(&self) -> String {
        match self {
            TextOrNumber::Text(s) => s.trim().to_string(),
            TextOrNumber::Number(n) => format!("{n:.0}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KlineRow {
    day: String,
    open: Option<TextOrNumber>,
    high: Option<TextOrNumber>,
    low: Option<TextOrNumber>,
    close: Option<TextOrNumber>,
    volume: Option<TextOrNumber>,
}

#[derive(Debug, Deserialize)]
struct FactorTable {
    data: Vec<FactorRow>,
}

#[derive(Debug, Deserialize)]
struct FactorRow {
    d: String,
    f: TextOrNumber,
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    symbol: Option<TextOrNumber>,
    code: Option<TextOrNumber>,
    name: Option<String>,
}

/// Sina Finance history and listing provider.
pub struct SinaProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    rate_limiter: Arc<RateLimiter>,
    config: SinaConfig,
}

impl SinaProvider {
    pub fn new(config: SinaConfig) -> Result<Self, DataError> {
        let circuit_breaker = Arc::new(CircuitBreaker::new(
            Duration::from_secs(config.breaker_cooldown_secs),
            config.breaker_failure_threshold,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(config.requests_per_second, config.burst));
        Self::with_shared(config, circuit_breaker, rate_limiter)
    }

    /// Build a provider that shares its breaker and limiter with other clients.
    pub fn with_shared(
        config: SinaConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::ProviderUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            circuit_breaker,
            rate_limiter,
            config,
        })
    }

    fn kline_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        // The endpoint counts rows back from today, so ask for at least the
        // calendar span; the sanitizer clips to the window.
        let today = chrono::Local::now().date_naive();
        let span = (today.max(end) - start).num_days().max(1) + 1;
        format!("{KLINE_URL}?symbol={symbol}&scale=240&ma=no&datalen={span}")
    }

    fn factor_url(symbol: &str) -> String {
        format!("{FACTOR_URL}/{symbol}/qfq.js")
    }

    fn listing_url(class: AssetClass, page: usize) -> String {
        let node = match class {
            AssetClass::Etf => "etf_hq_fund",
            AssetClass::Equity => "hs_a",
        };
        format!(
            "{LISTING_URL}?page={page}&num={LISTING_PAGE_SIZE}&sort=symbol&asc=1&node={node}"
        )
    }

    fn transport_error(&self, what: &str, e: reqwest::Error) -> DataError {
        self.circuit_breaker.record_failure();
        if e.is_timeout() {
            DataError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            DataError::ProviderUnavailable(format!("{what}: {e}"))
        }
    }

    fn refuse(&self, what: &str) -> DataError {
        tracing::debug!(
            what,
            remaining_secs = self.circuit_breaker.remaining_cooldown().as_secs(),
            "circuit breaker open, request refused"
        );
        DataError::CircuitBreakerTripped
    }

    /// GET a JSON document. `Ok(None)` means the endpoint answered with a
    /// JSON `null` or nothing at all.
    fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<Option<T>, DataError> {
        let Some(body) = self.get_text(url, what)? else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| DataError::ResponseFormatChanged(format!("failed to parse {what}: {e}")))
    }

    /// GET a response body with rate limiting, retries and breaker
    /// bookkeeping. Empty and `null` bodies come back as `Ok(None)`.
    fn get_text(&self, url: &str, what: &str) -> Result<Option<String>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(self.refuse(what));
        }

        let mut rng = rand::thread_rng();
        let mut last_error = None;

        for attempt in 0..=self.config.retry.max_retries {
            if attempt > 0 {
                let delay = self.config.retry.delay_for(attempt, &mut rng);
                tracing::debug!(what, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(self.refuse(what));
            }
            self.rate_limiter.acquire();

            let resp = match self.client.get(url).header("Referer", REFERER).send() {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(self.transport_error(what, e));
                    continue;
                }
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::RateLimited);
                continue;
            }
            if status.is_server_error() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::ProviderUnavailable(format!("HTTP {status} for {what}")));
                continue;
            }
            if !status.is_success() {
                return Err(DataError::Other(format!("HTTP {status} for {what}")));
            }

            let body = match resp.text() {
                Ok(body) => body,
                Err(e) => {
                    last_error = Some(self.transport_error(what, e));
                    continue;
                }
            };
            self.circuit_breaker.record_success();

            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed == "null" {
                return Ok(None);
            }
            return Ok(Some(trimmed.to_string()));
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn parse_klines(symbol: &str, rows: Vec<KlineRow>) -> Result<Vec<RawBar>, DataError> {
        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            let date = NaiveDate::parse_from_str(row.day.trim(), "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad date {:?} for {symbol}: {e}", row.day))
            })?;
            bars.push(RawBar {
                date,
                open: row.open.as_ref().and_then(TextOrNumber::price),
                high: row.high.as_ref().and_then(TextOrNumber::price),
                low: row.low.as_ref().and_then(TextOrNumber::price),
                close: row.close.as_ref().and_then(TextOrNumber::price),
                volume: row.volume.as_ref().and_then(TextOrNumber::volume),
            });
        }
        Ok(bars)
    }

    fn parse_listing(class: AssetClass, rows: Vec<ListingRow>) -> Vec<Instrument> {
        rows.into_iter()
            .filter_map(|row| {
                // Fund listings carry the venue-prefixed symbol; share listings the bare code.
                let code = match class {
                    AssetClass::Etf => row.symbol.or(row.code),
                    AssetClass::Equity => row.code.or(row.symbol),
                }?
                .text();
                if code.is_empty() {
                    return None;
                }
                Some(Instrument::new(code, row.name.unwrap_or_default()))
            })
            .collect()
    }
}

/// Parse a `qfq.js` body (`var qfq_factor = {"total":..,"data":[{"d":..,"f":..}]}`)
/// into `(effective date, factor)` pairs sorted by date.
pub fn parse_forward_factors(body: &str) -> Result<Vec<(NaiveDate, f64)>, DataError> {
    let line = body.lines().next().unwrap_or_default();
    let json = match (line.find('{'), line.rfind('}')) {
        (Some(open), Some(close)) if open < close => &line[open..=close],
        _ => {
            return Err(DataError::ResponseFormatChanged(
                "adjustment factor table has no object".into(),
            ))
        }
    };
    let table: FactorTable = serde_json::from_str(json).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse adjustment factors: {e}"))
    })?;

    let mut factors = Vec::with_capacity(table.data.len());
    for row in table.data {
        let date = NaiveDate::parse_from_str(row.d.trim(), "%Y-%m-%d").map_err(|e| {
            DataError::ResponseFormatChanged(format!("bad factor date {:?}: {e}", row.d))
        })?;
        let factor = row.f.price().ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("bad adjustment factor on {date}"))
        })?;
        factors.push((date, factor));
    }
    factors.sort_by_key(|(date, _)| *date);
    Ok(factors)
}

/// Divide each bar's prices by the latest factor effective on or before its
/// date. Bars older than the first factor lose their prices and are dropped
/// by the sanitizer. Volume is left as traded.
pub fn apply_forward_factors(bars: &mut [RawBar], factors: &[(NaiveDate, f64)]) {
    for bar in bars.iter_mut() {
        let idx = factors.partition_point(|(date, _)| *date <= bar.date);
        let factor = idx.checked_sub(1).map(|i| factors[i].1);
        let scale = |price: Option<f64>| factor.zip(price).map(|(f, p)| p / f);
        bar.open = scale(bar.open);
        bar.high = scale(bar.high);
        bar.low = scale(bar.low);
        bar.close = scale(bar.close);
    }
}

impl HistoryProvider for SinaProvider {
    fn name(&self) -> &str {
        "sina_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let url = Self::kline_url(symbol, start, end);
        let rows: Vec<KlineRow> = self
            .get_json(&url, symbol)?
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        let mut bars = Self::parse_klines(symbol, rows)?;

        if self.config.adjustment == PriceAdjustment::Forward {
            let what = format!("{symbol} adjustment factors");
            match self.get_text(&Self::factor_url(symbol), &what)? {
                Some(body) => apply_forward_factors(&mut bars, &parse_forward_factors(&body)?),
                None => tracing::warn!(symbol, "no adjustment factors published, using raw prices"),
            }
        }

        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::SinaFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

impl ListingProvider for SinaProvider {
    fn name(&self) -> &str {
        "sina_finance"
    }

    fn list_instruments(&self, class: AssetClass) -> Result<Vec<Instrument>, DataError> {
        let mut instruments = Vec::new();
        for page in 1..=self.config.max_listing_pages {
            let url = Self::listing_url(class, page);
            let rows: Vec<ListingRow> = self
                .get_json(&url, "listing")?
                .unwrap_or_default();
            if rows.is_empty() {
                break;
            }
            let fetched = rows.len();
            instruments.extend(Self::parse_listing(class, rows));
            tracing::debug!(class = %class, page, fetched, total = instruments.len(), "listing page");
            if fetched < LISTING_PAGE_SIZE {
                break;
            }
        }
        if instruments.is_empty() {
            return Err(DataError::ProviderUnavailable(format!(
                "empty {class} listing from sina_finance"
            )));
        }
        Ok(instruments)
    }
}
