use crate::domain::recommendation::Recommendation;
use crate::domain::snapshot::MarketSnapshot;
use crate::llm::error::{RecommendationError, Stage};
use crate::llm::json::{self, ParseError};
use crate::llm::{Provider, RecommendationClient};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a professional financial analyst. \
Provide concise, data-driven stock recommendations based only on the market data you are given. \
Always respond with valid JSON only.";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build reqwest client: {e}"))?;
        Ok(Self { http, config })
    }

    fn err(ticker: &str, stage: Stage, detail: impl Into<String>) -> RecommendationError {
        RecommendationError::new(ticker, Provider::OpenAI, stage, detail)
    }

    async fn create_chat_completion(
        &self,
        ticker: &str,
        req: &ChatCompletionRequest<'_>,
    ) -> Result<ChatCompletionResponse, RecommendationError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| Self::err(ticker, Stage::Http, format!("request failed: {e}")))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| Self::err(ticker, Stage::Http, format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(Self::err(ticker, Stage::Http, format!("status={status}")).with_raw_output(text));
        }

        serde_json::from_str::<ChatCompletionResponse>(&text).map_err(|e| {
            Self::err(ticker, Stage::Decode, format!("unexpected response shape: {e}")).with_raw_output(text)
        })
    }
}

#[async_trait::async_trait]
impl RecommendationClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    #[tracing::instrument(skip_all, fields(ticker = %snapshot.ticker()))]
    async fn recommend(&self, snapshot: &MarketSnapshot) -> Result<Recommendation, RecommendationError> {
        let ticker = snapshot.ticker();
        let user_prompt = user_prompt(snapshot);
        let req = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let res = self.create_chat_completion(ticker, &req).await?;
        let content = res
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Self::err(ticker, Stage::EmptyContent, "model returned no content"))?;

        json::parse_recommendation(&content).map_err(|e| {
            let stage = match e {
                ParseError::NotJson(_) => Stage::Parse,
                ParseError::Contract(_) => Stage::Validate,
            };
            tracing::warn!(%ticker, stage = stage.as_str(), error = %e, "model output rejected");
            Self::err(ticker, stage, e.to_string()).with_raw_output(content)
        })
    }
}

/// Renders the snapshot into the fixed analysis prompt.
pub fn user_prompt(s: &MarketSnapshot) -> String {
    let opt = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| format!("${v:.2}"));
    format!(
        "Analyze the following stock data for {ticker} and provide an investment recommendation.\n\n\
Current Price: ${price:.2}\n\
Change: ${change:.2} ({change_percent:.2}%)\n\
Volume: {volume}\n\
Open: {open}\n\
High: {high}\n\
Low: {low}\n\
Previous Close: {previous_close}\n\n\
Respond with ONLY a JSON object with exactly these keys:\n\
{{\n\
  \"recommendation\": \"BUY\" | \"SELL\" | \"HOLD\",\n\
  \"confidence\": a number from 60 to 100,\n\
  \"reasoning\": \"2-3 sentences explaining the recommendation\",\n\
  \"riskLevel\": \"LOW\" | \"MEDIUM\" | \"HIGH\",\n\
  \"priceTarget\": a number\n\
}}",
        ticker = s.ticker(),
        price = s.price(),
        change = s.change(),
        change_percent = s.change_percent(),
        volume = s.volume(),
        open = opt(s.open()),
        high = opt(s.high()),
        low = opt(s.low()),
        previous_close = opt(s.previous_close()),
    )
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{RiskLevel, Signal};
    use crate::domain::snapshot::SessionBar;
    use crate::testing::spawn_stub;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn config(base_url: String) -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url,
            model: "gpt-test".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            timeout: Duration::from_secs(5),
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot::new("AAPL", 150.0, Some(148.0), 52_000_000, SessionBar::default())
    }

    fn reply_with(content: Value) -> Router {
        Router::new().route(
            "/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let content = content.clone();
                async move {
                    assert_eq!(
                        headers.get("authorization").and_then(|v| v.to_str().ok()),
                        Some("Bearer sk-test")
                    );
                    assert_eq!(body["model"], "gpt-test");
                    assert_eq!(body["messages"][0]["role"], "system");
                    assert_eq!(body["max_tokens"], 500);
                    Json(json!({
                        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
                    }))
                }
            }),
        )
    }

    #[test]
    fn prompt_carries_snapshot_fields() {
        let p = user_prompt(&snapshot());
        assert!(p.contains("AAPL"));
        assert!(p.contains("Current Price: $150.00"));
        assert!(p.contains("(1.35%)"));
        assert!(p.contains("Open: N/A"));
        assert!(p.contains("\"riskLevel\""));
    }

    #[tokio::test]
    async fn parses_fenced_model_reply() {
        let content = "```json\n{\"recommendation\":\"buy\",\"confidence\":150,\"reasoning\":\"Up on volume.\",\"priceTarget\":170}\n```";
        let base = spawn_stub(reply_with(json!(content))).await;
        let client = OpenAiClient::new(config(base)).unwrap();

        let r = client.recommend(&snapshot()).await.unwrap();
        assert_eq!(r.recommendation(), Signal::Buy);
        assert_eq!(r.confidence(), 100);
        assert_eq!(r.risk_level(), RiskLevel::Medium);
        assert_eq!(r.price_target(), Some(170.0));
    }

    #[tokio::test]
    async fn missing_reasoning_is_a_validation_error() {
        let content = r#"{"recommendation":"SELL","confidence":80,"riskLevel":"HIGH"}"#;
        let base = spawn_stub(reply_with(json!(content))).await;
        let client = OpenAiClient::new(config(base)).unwrap();

        let err = client.recommend(&snapshot()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert_eq!(err.ticker, "AAPL");
        assert!(err.detail.contains("reasoning"));
        assert_eq!(err.raw_output.as_deref(), Some(content));
    }

    #[tokio::test]
    async fn null_content_is_empty_content() {
        let base = spawn_stub(reply_with(Value::Null)).await;
        let client = OpenAiClient::new(config(base)).unwrap();

        let err = client.recommend(&snapshot()).await.unwrap_err();
        assert_eq!(err.stage, Stage::EmptyContent);
    }

    #[tokio::test]
    async fn non_json_content_is_a_parse_error() {
        let base = spawn_stub(reply_with(json!("I think you should hold."))).await;
        let client = OpenAiClient::new(config(base)).unwrap();

        let err = client.recommend(&snapshot()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Parse);
    }

    #[tokio::test]
    async fn http_error_is_reported() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}}))) }),
        );
        let base = spawn_stub(app).await;
        let client = OpenAiClient::new(config(base)).unwrap();

        let err = client.recommend(&snapshot()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Http);
        assert!(err.detail.contains("401"));
        assert!(err.raw_output.unwrap_or_default().contains("bad key"));
    }

    #[tokio::test]
    async fn empty_choices_is_empty_content() {
        let app = Router::new().route("/chat/completions", post(|| async { Json(json!({"choices": []})) }));
        let base = spawn_stub(app).await;
        let client = OpenAiClient::new(config(base)).unwrap();

        let err = client.recommend(&snapshot()).await.unwrap_err();
        assert_eq!(err.stage, Stage::EmptyContent);
    }
}
