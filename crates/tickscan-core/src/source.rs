use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in quotes and attempt records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Polygon,
    Yahoo,
}

impl ProviderId {
    /// Default priority order: the keyed, higher-fidelity feed first.
    pub const ALL: [Self; 2] = [Self::Polygon, Self::Yahoo];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Polygon => "polygon",
            Self::Yahoo => "yahoo",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "polygon" => Ok(Self::Polygon),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" Polygon ".parse::<ProviderId>(), Ok(ProviderId::Polygon));
        assert_eq!("YAHOO".parse::<ProviderId>(), Ok(ProviderId::Yahoo));
        assert!(matches!(
            "iex".parse::<ProviderId>(),
            Err(ValidationError::InvalidSource { .. })
        ));
    }
}
