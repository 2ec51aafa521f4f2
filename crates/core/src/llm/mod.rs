pub mod error;
pub mod json;
pub mod openai;

use crate::domain::recommendation::Recommendation;
use crate::domain::snapshot::MarketSnapshot;
use crate::llm::error::RecommendationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Mock,
}

#[async_trait::async_trait]
pub trait RecommendationClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn recommend(&self, snapshot: &MarketSnapshot) -> Result<Recommendation, RecommendationError>;
}
