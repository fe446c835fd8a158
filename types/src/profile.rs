//! Account profiles and membership tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{AccountId, CanAmount, ParseError, Timestamp};

/// A user's profile row: spendable balance plus membership data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: AccountId,
    pub username: Option<String>,
    /// Spendable CAN. Mutated only by atomic deltas inside the store.
    pub balance: CanAmount,
    pub membership_tier: Option<MembershipTier>,
    /// Sum of CAN spent on membership tiers.
    pub total_invested: CanAmount,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Profile {
    /// A fresh profile with a zero balance.
    pub fn new(id: AccountId, now: Timestamp) -> Self {
        Self {
            id,
            username: None,
            balance: CanAmount::ZERO,
            membership_tier: None,
            total_invested: CanAmount::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Membership packages sold in the tier shop, ordered from lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl MembershipTier {
    pub const ALL: [MembershipTier; 4] = [Self::Bronze, Self::Silver, Self::Gold, Self::Platinum];

    /// Package price in CAN.
    pub fn price(&self) -> CanAmount {
        match self {
            Self::Bronze => CanAmount::from_can(50),
            Self::Silver => CanAmount::from_can(250),
            Self::Gold => CanAmount::from_can(750),
            Self::Platinum => CanAmount::from_can(2_500),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

impl FromStr for MembershipTier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            other => Err(ParseError::UnknownTier(other.to_string())),
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
