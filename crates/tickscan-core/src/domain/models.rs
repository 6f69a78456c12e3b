use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{MarketSession, ProviderError, ProviderErrorKind, ProviderId, Symbol};

/// Canonical instrument class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    Equity,
    Etf,
    Crypto,
    Index,
    Other,
}

/// Partial quote as normalized by a single provider adapter.
///
/// Every field except `price` is optional; the reconciler merges fields
/// across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialQuote {
    pub provider: ProviderId,
    pub symbol: Symbol,
    pub price: f64,
    pub prior_close: Option<f64>,
    pub volume: Option<u64>,
    pub average_volume: Option<u64>,
    pub instrument_type: Option<InstrumentType>,
}

impl PartialQuote {
    /// Build a partial quote, rejecting prices that are not finite and positive.
    ///
    /// A zero price means "no price" and is reported as a malformed response.
    pub fn new(provider: ProviderId, symbol: Symbol, price: f64) -> Result<Self, ProviderError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(ProviderError::malformed(format!(
                "{provider} returned no usable price for {symbol} ({price})"
            )));
        }

        Ok(Self {
            provider,
            symbol,
            price,
            prior_close: None,
            volume: None,
            average_volume: None,
            instrument_type: None,
        })
    }

    pub fn with_prior_close(mut self, prior_close: Option<f64>) -> Self {
        self.prior_close = prior_close.filter(|value| value.is_finite() && *value > 0.0);
        self
    }

    pub fn with_volume(mut self, volume: Option<u64>) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_average_volume(mut self, average_volume: Option<u64>) -> Self {
        self.average_volume = average_volume.filter(|value| *value > 0);
        self
    }

    pub fn with_instrument_type(mut self, instrument_type: Option<InstrumentType>) -> Self {
        self.instrument_type = instrument_type;
        self
    }
}

/// Authoritative price state of a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceState {
    Available { value: f64 },
    Unavailable { reason: String },
}

/// Secondary-source price kept for display only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlternateQuote {
    pub source: ProviderId,
    pub price: f64,
}

/// Outcome of one provider step during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Skipped { reason: String },
    Failed { kind: ProviderErrorKind, message: String },
}

/// One entry of the ordered provider fold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub provider: ProviderId,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl SourceAttempt {
    pub fn succeeded(provider: ProviderId) -> Self {
        Self {
            provider,
            outcome: AttemptOutcome::Succeeded,
        }
    }

    pub fn skipped(provider: ProviderId, reason: impl Into<String>) -> Self {
        Self {
            provider,
            outcome: AttemptOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(provider: ProviderId, error: &ProviderError) -> Self {
        Self {
            provider,
            outcome: AttemptOutcome::Failed {
                kind: error.kind(),
                message: error.message().to_owned(),
            },
        }
    }
}

/// Reconciled quote handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: PriceState,
    pub change_percent: f64,
    pub prior_close: Option<f64>,
    pub instrument_type: InstrumentType,
    pub session: MarketSession,
    pub volume: u64,
    pub average_volume: Option<u64>,
    pub source_used: Option<ProviderId>,
    pub discrepancy_note: Option<String>,
    pub alternate_quote: Option<AlternateQuote>,
    #[serde(with = "time::serde::rfc3339")]
    pub as_of: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<SourceAttempt>,
}

impl Quote {
    /// Failure-state quote: no price, no source, explicit reason.
    pub fn unavailable(
        symbol: Symbol,
        reason: impl Into<String>,
        instrument_type: InstrumentType,
        session: MarketSession,
        as_of: OffsetDateTime,
        attempts: Vec<SourceAttempt>,
    ) -> Self {
        Self {
            symbol,
            price: PriceState::Unavailable {
                reason: reason.into(),
            },
            change_percent: 0.0,
            prior_close: None,
            instrument_type,
            session,
            volume: 0,
            average_volume: None,
            source_used: None,
            discrepancy_note: None,
            alternate_quote: None,
            as_of,
            attempts,
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self.price {
            PriceState::Available { value } => Some(value),
            PriceState::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.price, PriceState::Available { .. })
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.price {
            PriceState::Available { .. } => None,
            PriceState::Unavailable { reason } => Some(reason),
        }
    }
}

/// Percentage change of `price` against `prior_close`.
///
/// Returns 0 when the reference is missing, zero, negative or not finite.
pub fn change_percent(price: f64, prior_close: Option<f64>) -> f64 {
    match prior_close {
        Some(reference) if reference.is_finite() && reference > 0.0 => {
            (price - reference) / reference * 100.0
        }
        _ => 0.0,
    }
}

/// Scan-pass wrapper around a reconciled quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCandidate {
    pub quote: Quote,
    pub relative_volume: Option<f64>,
    pub score: f64,
    pub float_shares: Option<u64>,
    pub headline: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("valid symbol")
    }

    #[test]
    fn zero_price_is_not_a_quote() {
        let err = PartialQuote::new(ProviderId::Yahoo, symbol(), 0.0).expect_err("must fail");
        assert_eq!(err.kind(), ProviderErrorKind::MalformedResponse);
    }

    #[test]
    fn change_percent_defaults_to_zero_without_reference() {
        assert_eq!(change_percent(10.0, None), 0.0);
        assert_eq!(change_percent(10.0, Some(0.0)), 0.0);
        assert!((change_percent(11.0, Some(10.0)) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn partial_quote_drops_non_positive_references() {
        let partial = PartialQuote::new(ProviderId::Polygon, symbol(), 5.0)
            .expect("valid price")
            .with_prior_close(Some(0.0))
            .with_average_volume(Some(0));

        assert_eq!(partial.prior_close, None);
        assert_eq!(partial.average_volume, None);
    }

    #[test]
    fn unavailable_quote_serializes_status_and_reason() {
        let quote = Quote::unavailable(
            symbol(),
            "all providers failed",
            InstrumentType::Equity,
            MarketSession::Closed,
            OffsetDateTime::UNIX_EPOCH,
            Vec::new(),
        );

        let json = serde_json::to_value(&quote).expect("serializable");
        assert_eq!(json["price"]["status"], "unavailable");
        assert_eq!(json["price"]["reason"], "all providers failed");
        assert!(quote.price().is_none());
    }
}
