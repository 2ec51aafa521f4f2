pub mod analysis;
pub mod domain;
pub mod llm;
pub mod market;
pub mod mock;

#[cfg(test)]
pub(crate) mod testing;

pub mod config {
    use crate::llm::openai::OpenAiConfig;
    use crate::market::polygon::{PolygonConfig, QuoteMode, MAX_ATTEMPTS};
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_POLYGON_BASE_URL: &str = "https://api.polygon.io";
    const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
    const DEFAULT_OPENAI_MAX_TOKENS: u32 = 500;
    const DEFAULT_OPENAI_TEMPERATURE: f32 = 0.3;
    const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_MARKET_DATA_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_MARKET_DATA_RETRIES: u32 = 2;

    /// Where analysis data comes from for a run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum DataSource {
        Live,
        Mock,
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub polygon_api_key: Option<String>,
        pub polygon_base_url: String,
        pub polygon_quote_mode: QuoteMode,
        pub market_data_timeout_secs: u64,
        pub market_data_retries: u32,
        pub openai_api_key: Option<String>,
        pub openai_base_url: String,
        pub openai_model: String,
        pub openai_max_tokens: u32,
        pub openai_temperature: f32,
        pub openai_timeout_secs: u64,
        pub analysis_concurrency: usize,
        pub mock_latency_ms: u64,
        pub watchlist: Vec<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                polygon_api_key: None,
                polygon_base_url: DEFAULT_POLYGON_BASE_URL.to_string(),
                polygon_quote_mode: QuoteMode::Aggregates,
                market_data_timeout_secs: DEFAULT_MARKET_DATA_TIMEOUT_SECS,
                market_data_retries: DEFAULT_MARKET_DATA_RETRIES,
                openai_api_key: None,
                openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                openai_model: DEFAULT_OPENAI_MODEL.to_string(),
                openai_max_tokens: DEFAULT_OPENAI_MAX_TOKENS,
                openai_temperature: DEFAULT_OPENAI_TEMPERATURE,
                openai_timeout_secs: DEFAULT_OPENAI_TIMEOUT_SECS,
                analysis_concurrency: 1,
                mock_latency_ms: 0,
                watchlist: Vec::new(),
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from an arbitrary key lookup. `from_env` is the only caller outside tests.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let defaults = Self::default();
            let non_blank = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

            let polygon_quote_mode = match non_blank("POLYGON_QUOTE_MODE") {
                Some(s) => s.parse::<QuoteMode>()?,
                None => defaults.polygon_quote_mode,
            };

            let watchlist = non_blank("WATCHLIST")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            Ok(Self {
                polygon_api_key: non_blank("POLYGON_API_KEY"),
                polygon_base_url: non_blank("POLYGON_BASE_URL").unwrap_or(defaults.polygon_base_url),
                polygon_quote_mode,
                market_data_timeout_secs: parse_or(
                    &lookup,
                    "MARKET_DATA_TIMEOUT_SECS",
                    defaults.market_data_timeout_secs,
                )?,
                market_data_retries: parse_or(
                    &lookup,
                    "MARKET_DATA_RETRIES",
                    defaults.market_data_retries,
                )?
                .clamp(1, MAX_ATTEMPTS),
                openai_api_key: non_blank("OPENAI_API_KEY"),
                openai_base_url: non_blank("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
                openai_model: non_blank("OPENAI_MODEL").unwrap_or(defaults.openai_model),
                openai_max_tokens: parse_or(&lookup, "OPENAI_MAX_TOKENS", defaults.openai_max_tokens)?,
                openai_temperature: parse_or(
                    &lookup,
                    "OPENAI_TEMPERATURE",
                    defaults.openai_temperature,
                )?,
                openai_timeout_secs: parse_or(
                    &lookup,
                    "OPENAI_TIMEOUT_SECS",
                    defaults.openai_timeout_secs,
                )?,
                analysis_concurrency: parse_or(
                    &lookup,
                    "ANALYSIS_CONCURRENCY",
                    defaults.analysis_concurrency,
                )?
                .max(1),
                mock_latency_ms: parse_or(&lookup, "MOCK_LATENCY_MS", defaults.mock_latency_ms)?,
                watchlist,
                sentry_dsn: non_blank("SENTRY_DSN"),
            })
        }

        /// Live data needs both vendor keys; anything less is mock mode, not an error.
        pub fn data_source(&self) -> DataSource {
            if self.polygon_api_key.is_some() && self.openai_api_key.is_some() {
                DataSource::Live
            } else {
                DataSource::Mock
            }
        }

        pub fn require_polygon_api_key(&self) -> anyhow::Result<&str> {
            self.polygon_api_key
                .as_deref()
                .context("POLYGON_API_KEY is required")
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn polygon_config(&self) -> anyhow::Result<PolygonConfig> {
            Ok(PolygonConfig {
                api_key: self.require_polygon_api_key()?.to_string(),
                base_url: self.polygon_base_url.clone(),
                quote_mode: self.polygon_quote_mode,
                timeout: Duration::from_secs(self.market_data_timeout_secs),
                retries: self.market_data_retries,
                retry_backoff: Duration::from_millis(500),
            })
        }

        pub fn openai_config(&self) -> anyhow::Result<OpenAiConfig> {
            Ok(OpenAiConfig {
                api_key: self.require_openai_api_key()?.to_string(),
                base_url: self.openai_base_url.clone(),
                model: self.openai_model.clone(),
                max_tokens: self.openai_max_tokens,
                temperature: self.openai_temperature,
                timeout: Duration::from_secs(self.openai_timeout_secs),
            })
        }

        pub fn mock_latency(&self) -> Duration {
            Duration::from_millis(self.mock_latency_ms)
        }
    }

    fn parse_or<T>(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: T,
    ) -> anyhow::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match lookup(key).filter(|s| !s.trim().is_empty()) {
            Some(s) => s
                .trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value: {s}")),
            None => Ok(default),
        }
    }

}
