use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A secondhand-bike marketplace the pipeline collects from.
///
/// Declaration order is the order targets are emitted per (model, year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Buycycle,
    Bikeflip,
    Kleinanzeigen,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Buycycle, Source::Bikeflip, Source::Kleinanzeigen];

    /// The value stored in `market_history.source_platform`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Buycycle => "buycycle",
            Source::Bikeflip => "bikeflip",
            Source::Kleinanzeigen => "kleinanzeigen",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buycycle" => Ok(Source::Buycycle),
            "bikeflip" => Ok(Source::Bikeflip),
            "kleinanzeigen" => Ok(Source::Kleinanzeigen),
            other => Err(CoreError::UnknownSource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Bikeflip".parse::<Source>().unwrap(), Source::Bikeflip);
        assert_eq!(" BUYCYCLE ".parse::<Source>().unwrap(), Source::Buycycle);
    }

    #[test]
    fn rejects_unknown_platform() {
        let err = "ebay".parse::<Source>().unwrap_err();
        assert!(err.to_string().contains("ebay"));
    }

    #[test]
    fn declaration_order_is_stable() {
        let mut shuffled = vec![Source::Kleinanzeigen, Source::Buycycle, Source::Bikeflip];
        shuffled.sort();
        assert_eq!(shuffled, Source::ALL.to_vec());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Source::Kleinanzeigen).unwrap();
        assert_eq!(json, "\"kleinanzeigen\"");
    }
}
