//! Heuristic trading levels derived from a reconciled quote.
//!
//! These are annotations, not advice: entry is the last price, the stop sits
//! a fixed percentage away, and targets are one and two times that risk.

use serde::{Deserialize, Serialize};

use crate::Quote;

pub const DEFAULT_RISK_PERCENT: f64 = 2.0;

/// Exclusive ceiling; at 50% the short 2R target would reach zero.
pub const MAX_RISK_PERCENT: f64 = 50.0;

/// Whether `risk_percent` lies in `(0, MAX_RISK_PERCENT)`.
pub fn is_valid_risk_percent(risk_percent: f64) -> bool {
    risk_percent.is_finite() && risk_percent > 0.0 && risk_percent < MAX_RISK_PERCENT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub bias: Bias,
    pub entry: f64,
    pub stop: f64,
    pub targets: [f64; 2],
    pub risk_percent: f64,
}

/// Levels for an available quote; `None` when the quote has no price or the
/// risk percent is not in `(0, 50)`. Within that range the stop and both
/// targets stay positive for either bias.
pub fn derive_levels(quote: &Quote, risk_percent: f64) -> Option<TradeLevels> {
    let entry = quote.price()?;
    if !is_valid_risk_percent(risk_percent) {
        return None;
    }

    let bias = if quote.change_percent >= 0.0 {
        Bias::Long
    } else {
        Bias::Short
    };
    let risk = entry * risk_percent / 100.0;
    let direction = match bias {
        Bias::Long => 1.0,
        Bias::Short => -1.0,
    };

    Some(TradeLevels {
        bias,
        entry,
        stop: round_price(entry - direction * risk),
        targets: [
            round_price(entry + direction * risk),
            round_price(entry + direction * 2.0 * risk),
        ],
        risk_percent,
    })
}

/// Two decimals above a dollar, four below.
fn round_price(value: f64) -> f64 {
    let scale = if value.abs() >= 1.0 { 100.0 } else { 10_000.0 };
    (value * scale).round() / scale
}
