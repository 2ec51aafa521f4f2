use crate::domain::snapshot::{normalize_ticker, MarketSnapshot, SessionBar};
use crate::market::error::DataFetchError;
use crate::market::types::{vendor_error, AggregateBar, AggregatesResponse, LastTradeResponse};
use crate::market::MarketDataClient;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::time::Duration;

const AGGREGATES_LOOKBACK_DAYS: i64 = 10;

/// Which pair of Polygon endpoints backs a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    /// One daily-aggregates range query; the two newest bars give price and previous close.
    Aggregates,
    /// Last trade for price plus the previous-day aggregate for the reference session.
    LastTrade,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown quote mode {0:?} (expected `aggregates` or `last_trade`)")]
pub struct UnknownQuoteMode(String);

impl FromStr for QuoteMode {
    type Err = UnknownQuoteMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggregates" | "aggs" => Ok(Self::Aggregates),
            "last_trade" | "last-trade" | "quote" => Ok(Self::LastTrade),
            other => Err(UnknownQuoteMode(other.to_string())),
        }
    }
}

/// Upper bound on attempts per request, whatever the config asks for.
pub const MAX_ATTEMPTS: u32 = 5;
const MAX_BACKOFF: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct PolygonConfig {
    pub api_key: String,
    pub base_url: String,
    pub quote_mode: QuoteMode,
    pub timeout: Duration,
    /// Total attempts per request, including the first.
    pub retries: u32,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct PolygonClient {
    http: reqwest::Client,
    config: PolygonConfig,
}

impl PolygonClient {
    pub fn new(config: PolygonConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build market data http client: {e}"))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        ticker: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DataFetchError> {
        let res = self
            .http
            .get(self.url(path))
            .query(query)
            .query(&[("apiKey", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| DataFetchError::retryable(ticker, format!("request failed: {e}")))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| DataFetchError::retryable(ticker, format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let detail = format!("HTTP {status}: {}", truncate(&text, 200));
            return Err(if is_retryable_status(status) {
                DataFetchError::retryable(ticker, detail)
            } else {
                DataFetchError::new(ticker, detail)
            });
        }

        serde_json::from_str::<T>(&text).map_err(|e| {
            DataFetchError::new(ticker, format!("malformed response body ({e}): {}", truncate(&text, 200)))
        })
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        ticker: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DataFetchError> {
        let max_attempts = self.config.retries.clamp(1, MAX_ATTEMPTS);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(ticker, path, query).await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if !err.retryable || attempt >= max_attempts {
                        tracing::warn!(%ticker, attempt, error = %err, "market data fetch failed");
                        return Err(err);
                    }
                    let backoff = backoff_for(self.config.retry_backoff, attempt);
                    tracing::warn!(%ticker, attempt, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn fetch_aggregates(&self, ticker: &str) -> Result<MarketSnapshot, DataFetchError> {
        let (from, to) = aggregates_window(Utc::now().date_naive());
        let path = format!("/v2/aggs/ticker/{ticker}/range/1/day/{from}/{to}");
        let res: AggregatesResponse = self
            .get_with_retry(
                ticker,
                &path,
                &[
                    ("adjusted", "true".to_string()),
                    ("sort", "desc".to_string()),
                    ("limit", AGGREGATES_LOOKBACK_DAYS.to_string()),
                ],
            )
            .await?;

        if let Some(detail) = vendor_error(res.status.as_deref(), res.error.as_deref(), res.message.as_deref()) {
            return Err(DataFetchError::new(ticker, detail));
        }

        snapshot_from_bars(ticker, res.results.unwrap_or_default())
    }

    async fn fetch_last_trade(&self, ticker: &str) -> Result<MarketSnapshot, DataFetchError> {
        let trade: LastTradeResponse = self
            .get_with_retry(ticker, &format!("/v2/last/trade/{ticker}"), &[])
            .await?;
        if let Some(detail) =
            vendor_error(trade.status.as_deref(), trade.error.as_deref(), trade.message.as_deref())
        {
            return Err(DataFetchError::new(ticker, detail));
        }
        let price = trade
            .results
            .map(|t| t.price)
            .ok_or_else(|| DataFetchError::new(ticker, "empty last trade result"))?;

        let prev: AggregatesResponse = self
            .get_with_retry(
                ticker,
                &format!("/v2/aggs/ticker/{ticker}/prev"),
                &[("adjusted", "true".to_string())],
            )
            .await?;
        let prev_bar = prev.results.and_then(|bars| bars.into_iter().next());

        snapshot_from_trade(ticker, price, prev_bar)
    }
}

#[async_trait::async_trait]
impl MarketDataClient for PolygonClient {
    fn provider_name(&self) -> &'static str {
        "polygon"
    }

    #[tracing::instrument(skip(self))]
    async fn fetch(&self, ticker: &str) -> Result<MarketSnapshot, DataFetchError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(DataFetchError::new(ticker, "ticker must be non-empty"));
        }
        match self.config.quote_mode {
            QuoteMode::Aggregates => self.fetch_aggregates(&ticker).await,
            QuoteMode::LastTrade => self.fetch_last_trade(&ticker).await,
        }
    }
}

/// Range covering enough calendar days to include at least two sessions across weekends and
/// holidays.
pub fn aggregates_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - ChronoDuration::days(AGGREGATES_LOOKBACK_DAYS), today)
}

/// Bars may arrive in any order; the newest is the reference session and the one before it
/// supplies the previous close.
fn snapshot_from_bars(ticker: &str, mut bars: Vec<AggregateBar>) -> Result<MarketSnapshot, DataFetchError> {
    bars.sort_by_key(|b| std::cmp::Reverse(b.timestamp_ms.unwrap_or_default()));
    let mut iter = bars.into_iter();
    let latest = iter
        .next()
        .ok_or_else(|| DataFetchError::new(ticker, "empty aggregates result"))?;
    ensure_price(ticker, latest.close)?;

    let previous_close = iter
        .next()
        .map(|b| b.close)
        .filter(|c| c.is_finite())
        .unwrap_or(latest.close);

    Ok(MarketSnapshot::new(
        ticker,
        latest.close,
        Some(previous_close),
        volume_of(latest.volume),
        SessionBar {
            open: latest.open,
            high: latest.high,
            low: latest.low,
        },
    ))
}

fn snapshot_from_trade(
    ticker: &str,
    price: f64,
    prev_bar: Option<AggregateBar>,
) -> Result<MarketSnapshot, DataFetchError> {
    ensure_price(ticker, price)?;
    let Some(bar) = prev_bar else {
        tracing::debug!(%ticker, "previous close unavailable; using last trade price");
        return Ok(MarketSnapshot::new(ticker, price, Some(price), 0, SessionBar::default()));
    };

    let previous_close = if bar.close.is_finite() { bar.close } else { price };
    Ok(MarketSnapshot::new(
        ticker,
        price,
        Some(previous_close),
        volume_of(bar.volume),
        SessionBar {
            open: bar.open,
            high: bar.high,
            low: bar.low,
        },
    ))
}

fn ensure_price(ticker: &str, price: f64) -> Result<(), DataFetchError> {
    if !price.is_finite() || price < 0.0 {
        return Err(DataFetchError::new(ticker, format!("unusable price {price}")));
    }
    Ok(())
}

fn volume_of(v: Option<f64>) -> u64 {
    v.filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}

/// Exponential backoff after the given failed attempt, capped at `MAX_BACKOFF`.
fn backoff_for(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.checked_mul(factor).map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
