//! Presentation views. Numeric display fields are rounded to two decimals here and nowhere else.

use crate::analysis::AnalysisResult;
use crate::domain::recommendation::{Recommendation, RiskLevel, Signal};
use crate::domain::snapshot::MarketSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub ticker: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub previous_close: Option<f64>,
    pub market_cap: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl From<&MarketSnapshot> for SnapshotView {
    fn from(s: &MarketSnapshot) -> Self {
        Self {
            ticker: s.ticker().to_string(),
            price: round2(s.price()),
            change: round2(s.change()),
            change_percent: round2(s.change_percent()),
            volume: s.volume(),
            open: s.open().map(round2),
            high: s.high().map(round2),
            low: s.low().map(round2),
            previous_close: s.previous_close().map(round2),
            market_cap: s.market_cap().map(round2),
            fetched_at: s.fetched_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationView {
    pub recommendation: Signal,
    pub confidence: u8,
    pub reasoning: String,
    pub risk_level: RiskLevel,
    pub price_target: Option<f64>,
}

impl From<&Recommendation> for RecommendationView {
    fn from(r: &Recommendation) -> Self {
        Self {
            recommendation: r.recommendation(),
            confidence: r.confidence(),
            reasoning: r.reasoning().to_string(),
            risk_level: r.risk_level(),
            price_target: r.price_target().map(round2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub snapshot: SnapshotView,
    pub recommendation: RecommendationView,
}

impl From<&AnalysisResult> for ResultView {
    fn from(r: &AnalysisResult) -> Self {
        Self {
            snapshot: SnapshotView::from(&r.snapshot),
            recommendation: RecommendationView::from(&r.recommendation),
        }
    }
}

/// Plain-text card used by the CLI.
pub fn render_card(r: &AnalysisResult) -> String {
    let s = SnapshotView::from(&r.snapshot);
    let rec = RecommendationView::from(&r.recommendation);
    let arrow = if r.snapshot.is_up() { "▲" } else { "▼" };
    let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));

    let mut out = String::new();
    out.push_str(&format!(
        "{:<8} ${:.2}  {} {:+.2} ({:+.2}%)  vol {}\n",
        s.ticker, s.price, arrow, s.change, s.change_percent, s.volume
    ));
    out.push_str(&format!(
        "         open {}  high {}  low {}  prev {}\n",
        opt(s.open),
        opt(s.high),
        opt(s.low),
        opt(s.previous_close)
    ));
    if let Some(cap) = s.market_cap {
        out.push_str(&format!("         market cap {cap:.2}\n"));
    }
    out.push_str(&format!(
        "         {} ({}% confidence, {} risk, target {})\n",
        rec.recommendation,
        rec.confidence,
        rec.risk_level,
        opt(rec.price_target)
    ));
    out.push_str(&format!("         {}\n", rec.reasoning));
    out
}
