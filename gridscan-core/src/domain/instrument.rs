use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which market universe a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    /// Exchange-traded funds.
    Etf,
    /// Individual listed shares.
    Equity,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Etf => "etf",
            AssetClass::Equity => "equity",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "etf" | "etfs" | "fund" => Ok(AssetClass::Etf),
            "equity" | "equities" | "stock" | "stocks" => Ok(AssetClass::Equity),
            other => Err(format!("unknown asset class '{other}' (expected etf or equity)")),
        }
    }
}

/// One entry of a market listing: exchange code plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    pub name: String,
}

impl Instrument {
    /// Build an instrument, trimming stray whitespace from both fields.
    pub fn new(code: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            code: code.as_ref().trim().to_string(),
            name: name.as_ref().trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_asset_class_aliases() {
        assert_eq!("ETF".parse::<AssetClass>().unwrap(), AssetClass::Etf);
        assert_eq!("stocks".parse::<AssetClass>().unwrap(), AssetClass::Equity);
        assert!("bond".parse::<AssetClass>().is_err());
    }

    #[test]
    fn instrument_trims_fields() {
        let inst = Instrument::new(" 510300 ", "沪深300ETF\t");
        assert_eq!(inst.code, "510300");
        assert_eq!(inst.name, "沪深300ETF");
    }
}
