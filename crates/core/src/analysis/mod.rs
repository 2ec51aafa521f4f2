pub mod session;

use crate::config::{DataSource, Settings};
use crate::domain::recommendation::Recommendation;
use crate::domain::snapshot::MarketSnapshot;
use crate::llm::error::RecommendationError;
use crate::llm::openai::OpenAiClient;
use crate::llm::RecommendationClient;
use crate::market::error::DataFetchError;
use crate::market::polygon::PolygonClient;
use crate::market::MarketDataClient;
use crate::mock::MockDataGenerator;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub snapshot: MarketSnapshot,
    pub recommendation: Recommendation,
}

/// One failure for the whole run. The first failing ticker (in watchlist order) wins.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchAnalysisError {
    #[error("watchlist is empty")]
    EmptyWatchlist,

    #[error(transparent)]
    DataFetch(#[from] DataFetchError),

    #[error(transparent)]
    Recommendation(#[from] RecommendationError),
}

impl BatchAnalysisError {
    pub fn ticker(&self) -> Option<&str> {
        match self {
            Self::EmptyWatchlist => None,
            Self::DataFetch(e) => Some(&e.ticker),
            Self::Recommendation(e) => Some(&e.ticker),
        }
    }

    /// Short message for the results panel.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyWatchlist => "Add at least one ticker before analyzing.".to_string(),
            Self::DataFetch(e) => format!("Failed to fetch market data for {}.", e.ticker),
            Self::Recommendation(e) => format!("Failed to get a recommendation for {}.", e.ticker),
        }
    }
}

/// Runs fetch-then-recommend for every ticker and collects results in input order.
#[derive(Clone)]
pub struct Analyzer {
    market: Arc<dyn MarketDataClient>,
    advisor: Arc<dyn RecommendationClient>,
    source: DataSource,
    concurrency: usize,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("market", &self.market.provider_name())
            .field("advisor", &self.advisor.provider())
            .field("source", &self.source)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Analyzer {
    pub fn new(
        market: Arc<dyn MarketDataClient>,
        advisor: Arc<dyn RecommendationClient>,
        source: DataSource,
    ) -> Self {
        Self {
            market,
            advisor,
            source,
            concurrency: 1,
        }
    }

    pub fn mock(mock: MockDataGenerator) -> Self {
        let mock = Arc::new(mock);
        Self::new(mock.clone(), mock, DataSource::Mock)
    }

    /// Picks live clients when both vendor keys are configured, the mock generator otherwise.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let analyzer = match settings.data_source() {
            DataSource::Live => Self::new(
                Arc::new(PolygonClient::new(settings.polygon_config()?)?),
                Arc::new(OpenAiClient::new(settings.openai_config()?)?),
                DataSource::Live,
            ),
            DataSource::Mock => {
                tracing::info!("vendor credentials missing; using mock data");
                Self::mock(MockDataGenerator::new().with_latency(settings.mock_latency()))
            }
        };
        Ok(analyzer.with_concurrency(settings.analysis_concurrency))
    }

    /// Upper bound on tickers in flight. `1` is strictly sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub async fn analyze_one(&self, ticker: &str) -> Result<AnalysisResult, BatchAnalysisError> {
        let snapshot = self.market.fetch(ticker).await?;
        let recommendation = self.advisor.recommend(&snapshot).await?;
        tracing::debug!(
            ticker = %snapshot.ticker(),
            recommendation = %recommendation.recommendation(),
            confidence = recommendation.confidence(),
            "ticker analyzed"
        );
        Ok(AnalysisResult {
            snapshot,
            recommendation,
        })
    }

    /// All-or-nothing: one result per ticker in the given order, or the first error. Remaining
    /// tickers are not started once a failure is observed.
    pub async fn analyze(&self, tickers: &[String]) -> Result<Vec<AnalysisResult>, BatchAnalysisError> {
        if tickers.is_empty() {
            return Err(BatchAnalysisError::EmptyWatchlist);
        }

        let t0 = std::time::Instant::now();
        let pending: Vec<_> = tickers.iter().map(|ticker| self.analyze_one(ticker)).collect();
        let results: Vec<AnalysisResult> = futures::stream::iter(pending)
            .buffered(self.concurrency)
            .try_collect()
            .await
            .inspect_err(|err| {
                tracing::error!(ticker = err.ticker().unwrap_or_default(), error = %err, "analysis run failed");
            })?;

        tracing::info!(
            tickers = results.len(),
            source = ?self.source,
            elapsed_ms = t0.elapsed().as_millis(),
            "analysis run complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::recommendation::Signal;
    use crate::domain::snapshot::SessionBar;
    use crate::llm::Provider;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted market client: fails for tickers in `fail`, records call order.
    #[derive(Default)]
    pub(crate) struct ScriptedMarket {
        pub fail: Vec<&'static str>,
        pub calls: Mutex<Vec<String>>,
        pub delay_for: Vec<(&'static str, u64)>,
    }

    #[async_trait::async_trait]
    impl MarketDataClient for ScriptedMarket {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(&self, ticker: &str) -> Result<MarketSnapshot, DataFetchError> {
            self.calls.lock().unwrap().push(ticker.to_string());
            if let Some((_, ms)) = self.delay_for.iter().find(|(t, _)| *t == ticker) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.fail.iter().any(|t| *t == ticker) {
                return Err(DataFetchError::new(ticker, "HTTP 500 Internal Server Error"));
            }
            Ok(MarketSnapshot::new(ticker, 100.0, Some(99.0), 10, SessionBar::default()))
        }
    }

    pub(crate) struct FixedAdvisor;

    #[async_trait::async_trait]
    impl RecommendationClient for FixedAdvisor {
        fn provider(&self) -> Provider {
            Provider::Mock
        }

        async fn recommend(&self, snapshot: &MarketSnapshot) -> Result<Recommendation, RecommendationError> {
            Ok(Recommendation::new(
                Signal::Hold,
                70.0,
                format!("{} is flat", snapshot.ticker()),
                None,
                None,
            ))
        }
    }

    fn tickers(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn mocked_run_returns_one_result_per_ticker_in_order() {
        let analyzer = Analyzer::mock(MockDataGenerator::new());
        let results = analyzer.analyze(&tickers(&["AAPL", "TSLA"])).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].snapshot.ticker(), "AAPL");
        assert_eq!(results[1].snapshot.ticker(), "TSLA");
    }

    #[tokio::test]
    async fn empty_watchlist_is_rejected() {
        let analyzer = Analyzer::mock(MockDataGenerator::new());
        assert!(matches!(analyzer.analyze(&[]).await, Err(BatchAnalysisError::EmptyWatchlist)));
    }

    #[tokio::test]
    async fn failure_aborts_remaining_tickers() {
        let market = Arc::new(ScriptedMarket {
            fail: vec!["BAD"],
            ..Default::default()
        });
        let analyzer = Analyzer::new(market.clone(), Arc::new(FixedAdvisor), DataSource::Live);

        let err = analyzer.analyze(&tickers(&["AAPL", "BAD", "MSFT"])).await.unwrap_err();
        assert_eq!(err.ticker(), Some("BAD"));
        assert!(matches!(err, BatchAnalysisError::DataFetch(_)));
        assert_eq!(*market.calls.lock().unwrap(), ["AAPL", "BAD"]);
    }

    #[tokio::test]
    async fn concurrent_run_preserves_input_order() {
        let market = Arc::new(ScriptedMarket {
            delay_for: vec![("SLOW", 50)],
            ..Default::default()
        });
        let analyzer = Analyzer::new(market, Arc::new(FixedAdvisor), DataSource::Live).with_concurrency(3);

        let results = analyzer.analyze(&tickers(&["SLOW", "FAST", "MID"])).await.unwrap();
        let order: Vec<_> = results.iter().map(|r| r.snapshot.ticker()).collect();
        assert_eq!(order, ["SLOW", "FAST", "MID"]);
    }

    #[test]
    fn settings_without_keys_build_a_mock_analyzer() {
        let analyzer = Analyzer::from_settings(&Settings::default()).unwrap();
        assert_eq!(analyzer.source(), DataSource::Mock);
    }

    #[test]
    fn user_message_names_the_ticker() {
        let err = BatchAnalysisError::from(DataFetchError::new("TSLA", "HTTP 500"));
        assert_eq!(err.user_message(), "Failed to fetch market data for TSLA.");
    }
}
