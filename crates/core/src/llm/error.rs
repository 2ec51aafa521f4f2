use crate::llm::Provider;
use std::fmt;

/// Where in the model round trip a recommendation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Http,
    Decode,
    EmptyContent,
    Parse,
    Validate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Decode => "decode",
            Self::EmptyContent => "empty_content",
            Self::Parse => "parse",
            Self::Validate => "validate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("recommendation failed for {ticker} (provider={provider:?}, stage={stage}): {detail}")]
pub struct RecommendationError {
    pub ticker: String,
    pub provider: Provider,
    pub stage: Stage,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl RecommendationError {
    pub fn new(ticker: &str, provider: Provider, stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }
}
