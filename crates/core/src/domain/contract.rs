use crate::domain::recommendation::{Recommendation, RiskLevel, Signal};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The recommendation object as the model emits it. Required keys are optional here so that a
/// missing key is reported by name instead of as a generic decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRecommendation {
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub risk_level: Option<Value>,
    #[serde(default)]
    pub price_target: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("missing required key `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for `{field}`: {detail}")]
    InvalidField { field: &'static str, detail: String },
}

impl LlmRecommendation {
    pub fn validate_and_into_recommendation(self) -> Result<Recommendation, ContractError> {
        let raw_signal = self
            .recommendation
            .ok_or(ContractError::MissingField("recommendation"))?;
        let signal = Signal::parse(&raw_signal).ok_or_else(|| ContractError::InvalidField {
            field: "recommendation",
            detail: format!("expected BUY, SELL or HOLD (got {raw_signal:?})"),
        })?;

        let confidence = self
            .confidence
            .ok_or(ContractError::MissingField("confidence"))?;

        let reasoning = self
            .reasoning
            .ok_or(ContractError::MissingField("reasoning"))?
            .trim()
            .to_string();
        if reasoning.is_empty() {
            return Err(ContractError::InvalidField {
                field: "reasoning",
                detail: "must be non-empty".to_string(),
            });
        }

        let risk_level = match self.risk_level.as_ref().and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => {
                let parsed = RiskLevel::parse(s);
                if parsed.is_none() {
                    tracing::debug!(risk_level = %s, "unrecognized riskLevel; using MEDIUM");
                }
                parsed
            }
            _ => None,
        };

        let price_target = self.price_target.as_ref().and_then(Value::as_f64);

        Ok(Recommendation::new(
            signal,
            confidence,
            reasoning,
            risk_level,
            price_target,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> Result<Recommendation, ContractError> {
        serde_json::from_value::<LlmRecommendation>(v)
            .unwrap()
            .validate_and_into_recommendation()
    }

    #[test]
    fn accepts_complete_object() {
        let r = decode(json!({
            "recommendation": "BUY",
            "confidence": 85,
            "reasoning": "Strong momentum on heavy volume.",
            "riskLevel": "LOW",
            "priceTarget": 172.5
        }))
        .unwrap();
        assert_eq!(r.recommendation(), Signal::Buy);
        assert_eq!(r.confidence(), 85);
        assert_eq!(r.risk_level(), RiskLevel::Low);
        assert_eq!(r.price_target(), Some(172.5));
    }

    #[test]
    fn missing_reasoning_is_rejected() {
        let err = decode(json!({"recommendation": "HOLD", "confidence": 70})).unwrap_err();
        assert_eq!(err, ContractError::MissingField("reasoning"));
    }

    #[test]
    fn missing_confidence_is_rejected() {
        let err = decode(json!({"recommendation": "HOLD", "reasoning": "x"})).unwrap_err();
        assert_eq!(err, ContractError::MissingField("confidence"));
    }

    #[test]
    fn unknown_signal_is_rejected() {
        let err = decode(json!({"recommendation": "ACCUMULATE", "confidence": 70, "reasoning": "x"}))
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidField { field: "recommendation", .. }));
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let low = decode(json!({"recommendation": "SELL", "confidence": -5, "reasoning": "x"})).unwrap();
        let high = decode(json!({"recommendation": "SELL", "confidence": 150, "reasoning": "x"})).unwrap();
        assert_eq!(low.confidence(), 60);
        assert_eq!(high.confidence(), 100);
    }

    #[test]
    fn falsy_or_unknown_risk_defaults_to_medium() {
        for risk in [json!(null), json!(""), json!("EXTREME"), json!(3)] {
            let r = decode(json!({
                "recommendation": "HOLD",
                "confidence": 75,
                "reasoning": "x",
                "riskLevel": risk
            }))
            .unwrap();
            assert_eq!(r.risk_level(), RiskLevel::Medium);
        }
    }

    #[test]
    fn non_numeric_price_target_is_dropped() {
        let r = decode(json!({
            "recommendation": "HOLD",
            "confidence": 75,
            "reasoning": "x",
            "priceTarget": "$180"
        }))
        .unwrap();
        assert_eq!(r.price_target(), None);
    }
}
