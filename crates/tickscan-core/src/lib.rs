//! # Tickscan Core
//!
//! Quote resolution, session classification and universe scanning for the
//! tickscan market-quote bot.
//!
//! ## Overview
//!
//! - **Provider adapters** for Polygon (keyed) and Yahoo (keyless), each with
//!   bounded retry, a per-adapter call pacer and a circuit breaker
//! - **Quote reconciler** folding providers in priority order into one
//!   authoritative [`Quote`], flagging cross-provider disagreement
//! - **Session and relative-volume estimator**, pure functions over an
//!   injectable [`Clock`]
//! - **Universe scanner** filtering, scoring and ranking candidates
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Polygon and Yahoo adapters |
//! | [`cache`] | Optional TTL quote cache |
//! | [`circuit_breaker`] | Per-provider circuit breaker |
//! | [`config`] | Environment-driven configuration |
//! | [`domain`] | Symbols, partial and reconciled quotes, scan candidates |
//! | [`error`] | Validation and core errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`levels`] | Heuristic entry/stop/target levels |
//! | [`provider`] | Provider contract and typed provider errors |
//! | [`reconcile`] | Cross-provider reconciliation |
//! | [`retry`] | Bounded retry policy |
//! | [`rvol`] | Relative volume |
//! | [`scanner`] | Universe scanning and scoring strategies |
//! | [`session`] | Market session, exchange timezone, clocks |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Minimum inter-call gap |
//! | [`transport`] | Paced, retried, circuit-broken HTTP calls |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tickscan_core::{QuoteReconciler, TickscanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TickscanConfig::from_env()?;
//!     let reconciler = QuoteReconciler::from_config(&config);
//!
//!     let quote = reconciler.resolve_raw("$brk.b").await?;
//!     match quote.price() {
//!         Some(price) => println!("{} {price:.2} ({:+.2}%)", quote.symbol, quote.change_percent),
//!         None => println!("{} unavailable", quote.symbol),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Bot      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Universe Scanner│────▶│ Session / RVOL   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Quote Reconciler│────▶│ Quote Cache      │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Provider Adapter│────▶│ Transport        │
//! │ (Polygon/Yahoo) │     │ pacer, retry, CB │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Invalid input is rejected with [`ValidationError`] before any network
//! call. Provider failures never escape as errors from reconciliation: they
//! are recorded in [`Quote::attempts`] and, when every provider fails, the
//! quote carries [`PriceState::Unavailable`] with the reason.
//!
//! ## Security
//!
//! - The Polygon key is sent as a bearer header, never in a URL
//! - Keys are hidden from `Debug` output and never logged

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod levels;
pub mod provider;
pub mod reconcile;
pub mod retry;
pub mod rvol;
pub mod scanner;
pub mod session;
pub mod source;
pub mod throttling;
pub mod transport;

// Adapter implementations
pub use adapters::{PolygonAdapter, YahooAdapter};

// Caching
pub use cache::{CacheMode, QuoteCache};

// Circuit breaker
pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::TickscanConfig;

// Domain models
pub use domain::{
    change_percent, AlternateQuote, AttemptOutcome, InstrumentType, PartialQuote, PriceState,
    Quote, ScanCandidate, SourceAttempt, Symbol,
};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    ApiKey, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Trading levels
pub use levels::{derive_levels, is_valid_risk_percent, Bias, TradeLevels};

// Provider contract
pub use provider::{ProviderError, ProviderErrorKind, ProviderFuture, QuoteProvider};

// Reconciliation
pub use reconcile::{QuoteReconciler, QuoteReconcilerBuilder};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Relative volume
pub use rvol::relative_volume;

// Scanning
pub use scanner::{
    GapScore, MomentumScore, ScanFilters, ScanReport, ScanRequest, ScoreStrategy, ScoringPolicy,
    SkippedSymbol, UniverseScanner, UnknownRvolPolicy,
};

// Session
pub use session::{
    classify, Clock, ExchangeTimezone, FixedClock, MarketSession, SessionSnapshot, SystemClock,
};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::CallPacer;

// Transport
pub use transport::ProviderTransport;
