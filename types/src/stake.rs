//! Stake records: coin stakes and NFT stakes share one shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{AccountId, Apy, CanAmount, ParseError, StakeId, Timestamp};

/// What is locked by a stake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StakeAsset {
    /// Fungible CAN tokens debited from the owner's balance.
    Coin,
    /// An NFT; the principal is its appraised value.
    Nft { nft_id: String, nft_name: String },
}

impl StakeAsset {
    pub fn kind(&self) -> StakeKind {
        match self {
            Self::Coin => StakeKind::Coin,
            Self::Nft { .. } => StakeKind::Nft,
        }
    }
}

/// Tag distinguishing the two stake tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeKind {
    Coin,
    Nft,
}

impl StakeKind {
    /// Name of the logical table holding this kind of stake.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Coin => "staking_coin",
            Self::Nft => "staking_nft",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coin => "coin",
            Self::Nft => "nft",
        }
    }
}

impl FromStr for StakeKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coin" => Ok(Self::Coin),
            "nft" => Ok(Self::Nft),
            other => Err(ParseError::UnknownAsset(other.to_string())),
        }
    }
}

impl fmt::Display for StakeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a stake.
///
/// Under the infinite-lock model stakes stay `Active` forever; `Closed` is
/// kept so fixed-term variants can be added without a schema change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeStatus {
    Active,
    Closed,
}

/// A persisted stake.
///
/// The pending reward is deliberately absent: it is a function of wall-clock
/// time and is recomputed from `staked_since` on every read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub id: StakeId,
    pub owner: AccountId,
    pub asset: StakeAsset,
    pub principal: CanAmount,
    pub apy: Apy,
    /// Start of the current accrual window. Only a successful claim moves it.
    pub staked_since: Timestamp,
    pub status: StakeStatus,
    pub created_at: Timestamp,
}

impl Stake {
    pub fn kind(&self) -> StakeKind {
        self.asset.kind()
    }

    pub fn is_active(&self) -> bool {
        self.status == StakeStatus::Active
    }
}
