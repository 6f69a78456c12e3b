use thiserror::Error;

/// Validation and contract errors exposed by `tickscan-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol body length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of polygon, yahoo")]
    InvalidSource { value: String },
    #[error("invalid timezone '{value}', expected America/New_York, UTC or a +HH:MM offset")]
    InvalidTimezone { value: String },
    #[error("invalid scoring strategy '{value}', expected one of momentum, gap")]
    InvalidScoring { value: String },

    #[error("price band is inverted: low {low} > high {high}")]
    InvertedPriceBand { low: f64, high: f64 },
    #[error("result count must be greater than zero")]
    ZeroResultCount,
    #[error("risk percent {value} must be greater than 0 and less than 50")]
    InvalidRiskPercent { value: f64 },

    #[error("invalid value '{value}' for configuration key {key}: {reason}")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Errors from loading core state out of the process environment.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("environment variable {key} is not valid unicode")]
    Environment { key: String },

    #[error("configuration could not be loaded: {reason}")]
    Config { reason: String },
}
