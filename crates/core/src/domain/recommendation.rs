use serde::Serialize;
use std::fmt;

pub const MIN_CONFIDENCE: u8 = 60;
pub const MAX_CONFIDENCE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Buy, Signal::Sell, Signal::Hold];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "HOLD" => Some(Self::Hold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A BUY/SELL/HOLD call for exactly one snapshot. Confidence is always within
/// `MIN_CONFIDENCE..=MAX_CONFIDENCE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    recommendation: Signal,
    confidence: u8,
    reasoning: String,
    risk_level: RiskLevel,
    price_target: Option<f64>,
}

impl Recommendation {
    pub fn new(
        recommendation: Signal,
        confidence: f64,
        reasoning: impl Into<String>,
        risk_level: Option<RiskLevel>,
        price_target: Option<f64>,
    ) -> Self {
        Self {
            recommendation,
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
            risk_level: risk_level.unwrap_or_default(),
            price_target: price_target.filter(|p| p.is_finite()),
        }
    }

    pub fn recommendation(&self) -> Signal {
        self.recommendation
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    pub fn price_target(&self) -> Option<f64> {
        self.price_target
    }
}

/// Rounds to the nearest integer and clamps into `[60, 100]`. NaN maps to the floor.
pub fn clamp_confidence(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_CONFIDENCE;
    }
    raw.round()
        .clamp(f64::from(MIN_CONFIDENCE), f64::from(MAX_CONFIDENCE)) as u8
}
