use crate::domain::snapshot::normalize_ticker;
use serde::Serialize;

const MAX_TICKER_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchlistError {
    #[error("ticker must be non-empty")]
    Empty,

    #[error("invalid ticker symbol: {0}")]
    Invalid(String),

    #[error("{0} is already in the watchlist")]
    Duplicate(String),
}

/// Ordered, de-duplicated set of uppercase ticker symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Watchlist {
    tickers: Vec<String>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a watchlist, silently skipping invalid and repeated symbols.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::new();
        for s in symbols {
            if let Err(err) = out.add(s.as_ref()) {
                tracing::debug!(symbol = s.as_ref(), error = %err, "skipping watchlist seed entry");
            }
        }
        out
    }

    /// Adds a symbol, returning the normalized form. Duplicates are rejected and leave the list
    /// unchanged.
    pub fn add(&mut self, raw: &str) -> Result<String, WatchlistError> {
        let ticker = validate_ticker(raw)?;
        if self.contains(&ticker) {
            return Err(WatchlistError::Duplicate(ticker));
        }
        self.tickers.push(ticker.clone());
        Ok(ticker)
    }

    /// Removes a symbol. Returns false when it was not present.
    pub fn remove(&mut self, raw: &str) -> bool {
        let ticker = normalize_ticker(raw);
        let before = self.tickers.len();
        self.tickers.retain(|t| *t != ticker);
        self.tickers.len() != before
    }

    pub fn contains(&self, raw: &str) -> bool {
        let ticker = normalize_ticker(raw);
        self.tickers.iter().any(|t| *t == ticker)
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

pub fn validate_ticker(raw: &str) -> Result<String, WatchlistError> {
    let ticker = normalize_ticker(raw);
    if ticker.is_empty() {
        return Err(WatchlistError::Empty);
    }
    let valid_chars = ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if ticker.len() > MAX_TICKER_LEN || !valid_chars {
        return Err(WatchlistError::Invalid(ticker));
    }
    Ok(ticker)
}
