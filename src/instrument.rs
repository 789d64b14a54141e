//! Market symbols.
//!
//! The Go source and the teacher crate both special-case a closed set of
//! trading pairs (`BTC-USD`, `ETH-USD`). This engine generalizes that to a
//! simple string-keyed registry instead — any symbol can be a market, as
//! long as it's registered with the [`crate::exchange::Exchange`] before
//! use. `Market` keeps the teacher's `Pair` ergonomics (serde as a bare
//! string, `Display`/`FromStr`, usable as a map key and as an axum path
//! segment) without baking in a fixed enum of assets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated market symbol, e.g. `"BTC-USD"`.
///
/// Symbols must be non-empty, ASCII, and contain only uppercase letters,
/// digits and `-`. This is a syntactic check only — whether the symbol is
/// actually tradable is a registry question the `Exchange` answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Market(String);

impl Market {
    pub fn code(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), String> {
        if s.is_empty() {
            return Err("market symbol must not be empty".into());
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(format!("unsupported symbol `{s}`"));
        }
        Ok(())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)?;
        Ok(Market(s.to_string()))
    }
}

impl TryFrom<String> for Market {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Market(s))
    }
}

impl From<Market> for String {
    fn from(m: Market) -> Self {
        m.0
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two markets seeded by the CLI/simulator demos; not a closed set — any
/// `Market` registered with the exchange at runtime works just as well.
pub fn btc_usd() -> Market {
    Market::from_str("BTC-USD").expect("literal is valid")
}

pub fn eth_usd() -> Market {
    Market::from_str("ETH-USD").expect("literal is valid")
}
