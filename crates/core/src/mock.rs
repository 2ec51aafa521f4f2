//! Synthetic stand-ins for both vendors, used when credentials are absent.
//!
//! Values are shaped to exercise every display field; they are not a market model.

use crate::domain::recommendation::{Recommendation, RiskLevel, Signal, MAX_CONFIDENCE, MIN_CONFIDENCE};
use crate::domain::snapshot::{MarketSnapshot, SessionBar};
use crate::llm::error::RecommendationError;
use crate::llm::{Provider, RecommendationClient};
use crate::market::error::DataFetchError;
use crate::market::MarketDataClient;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::time::Duration;

const BASE_PRICE_RANGE: std::ops::Range<f64> = 50.0..550.0;
const MAX_DAILY_MOVE_PCT: f64 = 5.0;
const VOLUME_RANGE: std::ops::Range<u64> = 1_000_000..50_000_000;
const SHARES_OUTSTANDING_RANGE: std::ops::Range<f64> = 1.0e8..1.0e10;
const PRICE_TARGET_BAND: f64 = 0.15;

pub fn mock_snapshot(ticker: &str) -> MarketSnapshot {
    mock_snapshot_with(&mut rand::rng(), ticker)
}

pub fn mock_snapshot_with<R: Rng + ?Sized>(rng: &mut R, ticker: &str) -> MarketSnapshot {
    let price = rng.random_range(BASE_PRICE_RANGE);
    let move_pct = rng.random_range(-MAX_DAILY_MOVE_PCT..=MAX_DAILY_MOVE_PCT);
    let previous_close = price / (1.0 + move_pct / 100.0);
    let open = previous_close * (1.0 + rng.random_range(-0.01..=0.01));
    let high = price.max(open) * (1.0 + rng.random_range(0.0..=0.02));
    let low = price.min(open) * (1.0 - rng.random_range(0.0..=0.02));
    let volume = rng.random_range(VOLUME_RANGE);
    let market_cap = price * rng.random_range(SHARES_OUTSTANDING_RANGE);

    MarketSnapshot::new(
        ticker,
        price,
        Some(previous_close),
        volume,
        SessionBar {
            open: Some(open),
            high: Some(high),
            low: Some(low),
        },
    )
    .with_market_cap(market_cap)
}

pub fn mock_recommendation(snapshot: &MarketSnapshot) -> Recommendation {
    mock_recommendation_with(&mut rand::rng(), snapshot)
}

pub fn mock_recommendation_with<R: Rng + ?Sized>(rng: &mut R, snapshot: &MarketSnapshot) -> Recommendation {
    let signal = *Signal::ALL.choose(rng).unwrap_or(&Signal::Hold);
    let risk = *RiskLevel::ALL.choose(rng).unwrap_or(&RiskLevel::Medium);
    let confidence = rng.random_range(MIN_CONFIDENCE..=MAX_CONFIDENCE);
    let price_target = snapshot.price() * (1.0 + rng.random_range(-PRICE_TARGET_BAND..=PRICE_TARGET_BAND));

    let direction = if snapshot.is_up() { "up" } else { "down" };
    let reasoning = format!(
        "{ticker} is {direction} {pct:.2}% on volume of {volume} shares. \
Based on this session the outlook is {signal} with {risk} risk. \
This is simulated data for demonstration purposes.",
        ticker = snapshot.ticker(),
        pct = snapshot.change_percent().abs(),
        volume = snapshot.volume(),
        risk = risk.as_str().to_ascii_lowercase(),
    );

    Recommendation::new(signal, f64::from(confidence), reasoning, Some(risk), Some(price_target))
}

/// Serves both client traits from the generators above. Never fails.
#[derive(Debug, Clone, Default)]
pub struct MockDataGenerator {
    latency: Duration,
}

impl MockDataGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps this long before every answer, to make mock runs look like network calls.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait::async_trait]
impl MarketDataClient for MockDataGenerator {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, ticker: &str) -> Result<MarketSnapshot, DataFetchError> {
        self.pause().await;
        Ok(mock_snapshot(ticker))
    }
}

#[async_trait::async_trait]
impl RecommendationClient for MockDataGenerator {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    async fn recommend(&self, snapshot: &MarketSnapshot) -> Result<Recommendation, RecommendationError> {
        self.pause().await;
        Ok(mock_recommendation(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn all_finite(s: &MarketSnapshot) -> bool {
        [s.price(), s.change(), s.change_percent()]
            .into_iter()
            .chain([s.open(), s.high(), s.low(), s.previous_close(), s.market_cap()].into_iter().flatten())
            .all(f64::is_finite)
    }

    #[test]
    fn snapshots_are_complete_and_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let s = mock_snapshot_with(&mut rng, "nvda");
            assert_eq!(s.ticker(), "NVDA");
            assert!(all_finite(&s));
            assert!(BASE_PRICE_RANGE.contains(&s.price()));
            assert!(s.open().is_some() && s.high().is_some() && s.low().is_some());
            assert!(s.market_cap().is_some());
            assert!(s.high().unwrap() >= s.price());
            assert!(s.low().unwrap() <= s.price());
            assert!(s.change_percent().abs() <= MAX_DAILY_MOVE_PCT + 1e-9);
            assert!(VOLUME_RANGE.contains(&s.volume()));
            let prev = s.previous_close().unwrap();
            assert!((s.change() - (s.price() - prev)).abs() < 1e-9);
        }
    }

    #[test]
    fn recommendations_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let s = mock_snapshot_with(&mut rng, "AAPL");
            let r = mock_recommendation_with(&mut rng, &s);
            assert!((60..=100).contains(&r.confidence()));
            let target = r.price_target().unwrap();
            assert!(target >= s.price() * 0.85 - 1e-9 && target <= s.price() * 1.15 + 1e-9);
            assert!(r.reasoning().starts_with("AAPL is "));
        }
    }

    #[test]
    fn reasoning_echoes_direction_and_volume() {
        let s = MarketSnapshot::new("X", 90.0, Some(100.0), 123, SessionBar::default());
        let r = mock_recommendation_with(&mut StdRng::seed_from_u64(1), &s);
        assert!(r.reasoning().contains("down 10.00%"));
        assert!(r.reasoning().contains("123 shares"));
    }

    #[tokio::test]
    async fn generator_serves_both_traits() {
        let mock = MockDataGenerator::new();
        let s = MarketDataClient::fetch(&mock, "tsla").await.unwrap();
        let r = mock.recommend(&s).await.unwrap();
        assert_eq!(s.ticker(), "TSLA");
        assert!((60..=100).contains(&r.confidence()));
        assert_eq!(RecommendationClient::provider(&mock), Provider::Mock);
    }
}
