//! CAN token amounts.
//!
//! Amounts are fixed-point integers (u128) to avoid floating-point errors.
//! The smallest unit is 1 raw; `1 CAN = 10^6 raw`.
//!
//! Human-readable serializers (JSON) see a decimal string such as `"12.5"`,
//! binary serializers (bincode) see the raw integer.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::error::ParseError;

/// Number of decimal places carried by a [`CanAmount`].
pub const CAN_DECIMALS: u32 = 6;

/// Raw units per whole CAN token.
pub const CAN_UNIT: u128 = 1_000_000;

/// A non-negative CAN token quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanAmount(u128);

impl CanAmount {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u128::MAX);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Build an amount from whole tokens.
    pub const fn from_can(units: u128) -> Self {
        Self(units * CAN_UNIT)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Whole tokens, truncating the fractional part.
    pub fn to_can(&self) -> u128 {
        self.0 / CAN_UNIT
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Decimal rendering without unit and without trailing fractional zeros.
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / CAN_UNIT;
        let frac = self.0 % CAN_UNIT;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:0width$}", frac, width = CAN_DECIMALS as usize);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    /// Parse a decimal string (`"250"`, `"0.01"`, `"12.345678"`).
    pub fn from_decimal_str(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::EmptyAmount);
        }
        if s.starts_with('-') {
            return Err(ParseError::NegativeAmount(s.to_string()));
        }
        let s = s.strip_prefix('+').unwrap_or(s);

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseError::MalformedAmount(s.to_string()));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseError::MalformedAmount(s.to_string()));
        }
        if frac.len() > CAN_DECIMALS as usize {
            return Err(ParseError::TooPrecise(s.to_string()));
        }

        let whole_raw = if whole.is_empty() {
            0u128
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| ParseError::AmountOverflow(s.to_string()))?
        };
        let frac_raw = if frac.is_empty() {
            0u128
        } else {
            let scale = 10u128.pow(CAN_DECIMALS - frac.len() as u32);
            frac.parse::<u128>()
                .map_err(|_| ParseError::MalformedAmount(s.to_string()))?
                * scale
        };

        whole_raw
            .checked_mul(CAN_UNIT)
            .and_then(|w| w.checked_add(frac_raw))
            .map(Self)
            .ok_or_else(|| ParseError::AmountOverflow(s.to_string()))
    }
}

impl Add for CanAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for CanAmount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl std::iter::Sum for CanAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, CanAmount::saturating_add)
    }
}

impl FromStr for CanAmount {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

impl fmt::Display for CanAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} CAN", self.to_decimal_string())
    }
}

impl Serialize for CanAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_decimal_string())
        } else {
            serializer.serialize_u128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for CanAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(DecimalVisitor)
        } else {
            u128::deserialize(deserializer).map(Self)
        }
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = CanAmount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative decimal CAN amount")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        CanAmount::from_decimal_str(v).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!("250".parse::<CanAmount>().unwrap(), CanAmount::from_can(250));
        assert_eq!("0.01".parse::<CanAmount>().unwrap(), CanAmount::new(10_000));
        assert_eq!("12.345678".parse::<CanAmount>().unwrap(), CanAmount::new(12_345_678));
        assert_eq!(".5".parse::<CanAmount>().unwrap(), CanAmount::new(500_000));
        assert_eq!("7.".parse::<CanAmount>().unwrap(), CanAmount::from_can(7));
    }

    #[test]
    fn rejects_negative_and_malformed_amounts() {
        assert!(matches!(
            "-10".parse::<CanAmount>(),
            Err(ParseError::NegativeAmount(_))
        ));
        assert!(matches!("".parse::<CanAmount>(), Err(ParseError::EmptyAmount)));
        assert!(matches!("abc".parse::<CanAmount>(), Err(ParseError::MalformedAmount(_))));
        assert!(matches!(".".parse::<CanAmount>(), Err(ParseError::MalformedAmount(_))));
        assert!(matches!(
            "1.0000001".parse::<CanAmount>(),
            Err(ParseError::TooPrecise(_))
        ));
    }

    #[test]
    fn decimal_rendering_trims_trailing_zeros() {
        assert_eq!(CanAmount::from_can(100).to_decimal_string(), "100");
        assert_eq!(CanAmount::new(1_500_000).to_decimal_string(), "1.5");
        assert_eq!(CanAmount::new(10_000).to_decimal_string(), "0.01");
        assert_eq!(CanAmount::new(1).to_decimal_string(), "0.000001");
        assert_eq!(CanAmount::new(2_500_000).to_string(), "2.5 CAN");
    }

    #[test]
    fn json_uses_decimal_strings() {
        let json = serde_json::to_string(&CanAmount::new(1_250_000)).unwrap();
        assert_eq!(json, "\"1.25\"");
        let back: CanAmount = serde_json::from_str("\"1.25\"").unwrap();
        assert_eq!(back, CanAmount::new(1_250_000));
        assert!(serde_json::from_str::<CanAmount>("\"-3\"").is_err());
    }

    #[test]
    fn bincode_uses_raw_integer() {
        let bytes = bincode::serialize(&CanAmount::new(42)).unwrap();
        assert_eq!(bytes.len(), 16);
        let back: CanAmount = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.raw(), 42);
    }

    #[test]
    fn sum_saturates() {
        let total: CanAmount = [CanAmount::MAX, CanAmount::new(1)].into_iter().sum();
        assert_eq!(total, CanAmount::MAX);
    }
}
