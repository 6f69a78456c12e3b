//! # Domain Models
//!
//! Canonical domain types for tickscan.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Normalized, validated ticker or currency pair |
//! | [`PartialQuote`] | One provider's normalized view of a symbol |
//! | [`Quote`] | Reconciled, immutable quote handed to presentation |
//! | [`ScanCandidate`] | Quote plus scan-derived relative volume and score |
//!
//! Construction validates invariants: symbols pass the format check before
//! any lookup, and a price of zero never becomes an available quote.

mod models;
mod symbol;

pub use models::{
    change_percent, AlternateQuote, AttemptOutcome, InstrumentType, PartialQuote, PriceState,
    Quote, ScanCandidate, SourceAttempt,
};
pub use symbol::{normalize, Symbol};
