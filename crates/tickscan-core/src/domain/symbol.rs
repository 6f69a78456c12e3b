use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_BODY_LEN: usize = 11;

/// Quote currencies accepted as a trailing pair suffix (`BTC-USD`, `ETH-USDT`).
const PAIR_SUFFIXES: [&str; 8] = ["USDT", "USDC", "USD", "EUR", "GBP", "JPY", "BTC", "ETH"];

/// Normalized market symbol/ticker.
///
/// Normalization trims whitespace, strips a chat cashtag (`$TSLA`), uppercases,
/// and maps the class-share separator `.` and pair separator `/` to `-`.
/// The result is then checked: one leading letter, up to 10 further
/// letters/digits/dots/hyphens, and an optional currency-pair suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse, normalize and validate a raw symbol.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let normalized = normalize(input);
        if normalized.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        if let Some(first) = normalized.chars().next() {
            if !first.is_ascii_alphabetic() {
                return Err(ValidationError::SymbolInvalidStart { ch: first });
            }
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '.' || ch == '-';
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        let body = match pair_suffix(&normalized) {
            Some(suffix) => &normalized[..normalized.len() - suffix.len() - 1],
            None => normalized.as_str(),
        };
        let len = body.chars().count();
        if len > MAX_BODY_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_BODY_LEN,
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the symbol ends in a recognized currency-pair suffix.
    pub fn is_currency_pair(&self) -> bool {
        pair_suffix(&self.0).is_some()
    }
}

/// Canonical form of a raw symbol without validating it.
///
/// Applying it twice yields the same result as applying it once.
pub fn normalize(input: &str) -> String {
    input
        .trim_start_matches(|ch: char| ch == '$' || ch.is_whitespace())
        .trim_end()
        .chars()
        .map(|ch| match ch {
            '.' | '/' => '-',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

fn pair_suffix(normalized: &str) -> Option<&'static str> {
    let (base, quote) = normalized.rsplit_once('-')?;
    if base.is_empty() {
        return None;
    }
    PAIR_SUFFIXES.iter().copied().find(|suffix| *suffix == quote)
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
