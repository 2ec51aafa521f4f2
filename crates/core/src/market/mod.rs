pub mod error;
pub mod polygon;
pub mod types;

use crate::domain::snapshot::MarketSnapshot;
use crate::market::error::DataFetchError;

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch(&self, ticker: &str) -> Result<MarketSnapshot, DataFetchError>;
}
