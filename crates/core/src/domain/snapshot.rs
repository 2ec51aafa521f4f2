use chrono::{DateTime, Utc};
use serde::Serialize;

/// One normalized market-data reading for a ticker.
///
/// `change` and `change_percent` are derived from `price` and `previous_close` at construction
/// and cannot be set independently. Values are kept at full precision; rounding happens in
/// [`crate::domain::view`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    ticker: String,
    price: f64,
    change: f64,
    change_percent: f64,
    volume: u64,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    previous_close: Option<f64>,
    market_cap: Option<f64>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionBar {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
}

impl MarketSnapshot {
    pub fn new(
        ticker: &str,
        price: f64,
        previous_close: Option<f64>,
        volume: u64,
        bar: SessionBar,
    ) -> Self {
        let (change, change_percent) = derive_change(price, previous_close);
        Self {
            ticker: normalize_ticker(ticker),
            price,
            change,
            change_percent,
            volume,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            previous_close,
            market_cap: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn change(&self) -> f64 {
        self.change
    }

    pub fn change_percent(&self) -> f64 {
        self.change_percent
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    pub fn open(&self) -> Option<f64> {
        self.open
    }

    pub fn high(&self) -> Option<f64> {
        self.high
    }

    pub fn low(&self) -> Option<f64> {
        self.low
    }

    pub fn previous_close(&self) -> Option<f64> {
        self.previous_close
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.market_cap
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn is_up(&self) -> bool {
        self.change >= 0.0
    }
}

/// Returns `(change, change_percent)`. A missing or zero previous close yields a zero percentage.
pub fn derive_change(price: f64, previous_close: Option<f64>) -> (f64, f64) {
    match previous_close {
        Some(prev) => {
            let change = price - prev;
            let percent = if prev != 0.0 { change / prev * 100.0 } else { 0.0 };
            (change, percent)
        }
        None => (0.0, 0.0),
    }
}

pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::view::round2;

    #[test]
    fn change_percent_matches_previous_close() {
        let s = MarketSnapshot::new("aapl", 150.0, Some(148.0), 1_000, SessionBar::default());
        assert_eq!(s.ticker(), "AAPL");
        assert_eq!(round2(s.change()), 2.00);
        assert_eq!(round2(s.change_percent()), 1.35);
    }

    #[test]
    fn zero_previous_close_has_zero_percent() {
        let s = MarketSnapshot::new("X", 10.0, Some(0.0), 0, SessionBar::default());
        assert_eq!(s.change(), 10.0);
        assert_eq!(s.change_percent(), 0.0);
        assert!(s.change_percent().is_finite());
    }

    #[test]
    fn absent_previous_close_has_zero_change() {
        let s = MarketSnapshot::new("X", 10.0, None, 0, SessionBar::default());
        assert_eq!(s.change(), 0.0);
        assert_eq!(s.change_percent(), 0.0);
        assert!(s.previous_close().is_none());
    }

    #[test]
    fn percent_identity_holds_for_negative_moves() {
        let s = MarketSnapshot::new("X", 95.5, Some(100.0), 0, SessionBar::default());
        let prev = s.previous_close().unwrap();
        assert!((s.change_percent() - s.change() / prev * 100.0).abs() < 1e-12);
        assert!(!s.is_up());
    }
}
