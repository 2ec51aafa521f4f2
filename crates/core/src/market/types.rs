//! Polygon response shapes. Only the fields used for a snapshot are decoded.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatesResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<AggregateBar>>,
}

/// One OHLCV bar. `t` is the bar start in Unix milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateBar {
    #[serde(rename = "o")]
    pub open: Option<f64>,
    #[serde(rename = "h")]
    pub high: Option<f64>,
    #[serde(rename = "l")]
    pub low: Option<f64>,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v", default)]
    pub volume: Option<f64>,
    #[serde(rename = "t", default)]
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastTradeResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Option<LastTrade>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastTrade {
    #[serde(rename = "p")]
    pub price: f64,
}

/// Polygon reports auth and plan problems in the body as well as the status line.
pub fn vendor_error(status: Option<&str>, error: Option<&str>, message: Option<&str>) -> Option<String> {
    match status {
        Some("ERROR") | Some("NOT_AUTHORIZED") | Some("NOT_FOUND") => Some(
            error
                .or(message)
                .map(str::to_string)
                .unwrap_or_else(|| format!("vendor status {}", status.unwrap_or_default())),
        ),
        _ => None,
    }
}
