//! Provider adapter contract and its typed failure.
//!
//! Every upstream quote source implements [`QuoteProvider`]. Adapters never
//! panic across this boundary: each call resolves to either a normalized
//! value or a [`ProviderError`] naming the cause.
//!
//! | Call | Required | Description |
//! |------|----------|-------------|
//! | [`fetch_quote`](QuoteProvider::fetch_quote) | yes | Price, volume and whatever else the payload carries |
//! | [`fetch_prior_close`](QuoteProvider::fetch_prior_close) | no | Previous session close |
//! | [`fetch_average_volume`](QuoteProvider::fetch_average_volume) | no | Average daily volume |
//! | [`fetch_news_headline`](QuoteProvider::fetch_news_headline) | no | Most recent headline |
//! | [`fetch_float`](QuoteProvider::fetch_float) | no | Float / shares outstanding |
//!
//! Optional calls default to [`ProviderErrorKind::Unsupported`].

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{PartialQuote, ProviderId, Symbol};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Timeout,
    RateLimited,
    NotFound,
    MalformedResponse,
    Unavailable,
    NotConfigured,
    Unsupported,
}

/// Structured provider error folded into reconciliation attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    retryable: bool,
}

impl ProviderError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::MalformedResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    /// Unavailable, but retrying will not help (auth rejected, bad request).
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unavailable,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_configured(provider: ProviderId) -> Self {
        Self {
            kind: ProviderErrorKind::NotConfigured,
            message: format!("provider '{provider}' is not configured"),
            retryable: false,
        }
    }

    pub fn unsupported(provider: ProviderId, call: &str) -> Self {
        Self {
            kind: ProviderErrorKind::Unsupported,
            message: format!("provider '{provider}' does not support {call}"),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Timeout => "provider.timeout",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::NotFound => "provider.not_found",
            ProviderErrorKind::MalformedResponse => "provider.malformed_response",
            ProviderErrorKind::Unavailable => "provider.unavailable",
            ProviderErrorKind::NotConfigured => "provider.not_configured",
            ProviderErrorKind::Unsupported => "provider.unsupported",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Quote provider contract.
///
/// Implementations must be `Send + Sync`; the reconciler shares them across
/// concurrent scan tasks.
pub trait QuoteProvider: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Whether this provider serves the symbol at all.
    ///
    /// Unsupported symbols are skipped by the reconciler without penalty.
    fn supports(&self, symbol: &Symbol) -> bool {
        let _ = symbol;
        true
    }

    /// Fetches the latest quote.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the upstream times out, throttles,
    /// does not know the symbol, or answers with an unusable payload.
    fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, PartialQuote>;

    /// Fetches the previous session's closing price.
    fn fetch_prior_close<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, f64> {
        let _ = symbol;
        Box::pin(async move { Err(ProviderError::unsupported(self.id(), "prior close")) })
    }

    /// Fetches the average daily volume.
    fn fetch_average_volume<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, u64> {
        let _ = symbol;
        Box::pin(async move { Err(ProviderError::unsupported(self.id(), "average volume")) })
    }

    /// Fetches the most recent news headline, `None` when there is no news.
    fn fetch_news_headline<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<String>> {
        let _ = symbol;
        Box::pin(async move { Err(ProviderError::unsupported(self.id(), "news")) })
    }

    /// Fetches float (or the closest shares-outstanding proxy).
    fn fetch_float<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, u64> {
        let _ = symbol;
        Box::pin(async move { Err(ProviderError::unsupported(self.id(), "float")) })
    }
}
