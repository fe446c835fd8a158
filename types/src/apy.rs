//! Annual percentage yield, expressed in basis points.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseError;

/// Basis points denominator (100% = 10_000 bps).
pub const BASIS_POINTS_DENOMINATOR: u32 = 10_000;

/// Highest accepted APY (1000% = 100_000 bps).
pub const MAX_APY_BPS: u32 = 100_000;

/// A fixed simple-interest rate. `Apy::from_percent(10)` is 1000 bps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Apy(u32);

impl Apy {
    /// Policy rate for coin stakes (10%).
    pub const COIN_DEFAULT: Self = Self(1_000);
    /// Policy rate for NFT stakes (15%).
    pub const NFT_DEFAULT: Self = Self(1_500);

    pub fn from_bps(bps: u32) -> Result<Self, ParseError> {
        if bps == 0 || bps > MAX_APY_BPS {
            return Err(ParseError::ApyOutOfRange(bps));
        }
        Ok(Self(bps))
    }

    /// Whole-percent constructor for policy constants.
    pub fn from_percent(percent: u32) -> Result<Self, ParseError> {
        Self::from_bps(percent.saturating_mul(100))
    }

    pub fn bps(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Apy {
    type Error = ParseError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        Self::from_bps(bps)
    }
}

impl From<Apy> for u32 {
    fn from(apy: Apy) -> u32 {
        apy.0
    }
}

impl fmt::Display for Apy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_converts_to_bps() {
        assert_eq!(Apy::from_percent(10).unwrap().bps(), 1_000);
        assert_eq!(Apy::from_percent(15).unwrap().bps(), 1_500);
    }

    #[test]
    fn zero_and_excessive_rates_rejected() {
        assert_eq!(Apy::from_bps(0), Err(ParseError::ApyOutOfRange(0)));
        assert!(Apy::from_bps(MAX_APY_BPS).is_ok());
        assert!(Apy::from_bps(MAX_APY_BPS + 1).is_err());
    }

    #[test]
    fn display_shows_percent() {
        assert_eq!(Apy::from_bps(1_000).unwrap().to_string(), "10%");
        assert_eq!(Apy::from_bps(1_250).unwrap().to_string(), "12.50%");
    }
}
