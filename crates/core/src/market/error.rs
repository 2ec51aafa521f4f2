/// The vendor call failed or returned data that cannot be turned into a snapshot.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to fetch market data for {ticker}: {detail}")]
pub struct DataFetchError {
    pub ticker: String,
    pub detail: String,
    /// Transport failures, 5xx and 429 may succeed on a later attempt.
    pub retryable: bool,
}

impl DataFetchError {
    pub fn new(ticker: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            detail: detail.into(),
            retryable: false,
        }
    }

    pub fn retryable(ticker: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::new(ticker, detail)
        }
    }
}
