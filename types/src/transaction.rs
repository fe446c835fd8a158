//! Transaction log entries (the `transactions` table).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{AccountId, CanAmount, ParseError, Timestamp, TransactionId};

/// What a transaction log entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Faucet or administrative credit.
    Deposit,
    /// Coins moved from the balance into a coin stake.
    Stake,
    /// An NFT locked into an NFT stake (no balance movement).
    NftStake,
    /// Staking reward credited to the balance.
    Claim,
    /// Membership tier bought with balance.
    TierPurchase,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Stake => "stake",
            Self::NftStake => "nft_stake",
            Self::Claim => "claim",
            Self::TierPurchase => "tier_purchase",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "stake" => Ok(Self::Stake),
            "nft_stake" => Ok(Self::NftStake),
            "claim" => Ok(Self::Claim),
            "tier_purchase" => Ok(Self::TierPurchase),
            other => Err(ParseError::UnknownTransactionKind(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
}

/// One row of the transaction log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account: AccountId,
    pub kind: TransactionKind,
    pub amount: CanAmount,
    /// Investment phase the entry belongs to, when sold during one.
    pub phase: Option<u8>,
    pub status: TransactionStatus,
    pub created_at: Timestamp,
}
