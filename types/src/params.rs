//! Staking policy parameters.
//!
//! Every field has a serde default so a config file only has to name what it
//! overrides.

use serde::{Deserialize, Serialize};

use crate::{Apy, CanAmount};

/// An NFT that may be staked, with its appraised value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftListing {
    pub id: String,
    pub name: String,
    pub value: CanAmount,
}

/// Policy constants applied by the staking engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// APY applied to new coin stakes.
    #[serde(default = "default_coin_apy")]
    pub coin_apy: Apy,

    /// APY applied to new NFT stakes.
    #[serde(default = "default_nft_apy")]
    pub nft_apy: Apy,

    /// Smallest reward a claim may pay out. Default: 0.01 CAN.
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: CanAmount,

    /// How many times a claim re-reads the stake after losing a
    /// compare-and-swap race before giving up.
    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: u32,

    /// Investment phase stamped on new transaction log entries.
    #[serde(default)]
    pub current_phase: Option<u8>,

    /// NFTs accepted for staking.
    #[serde(default = "default_nft_catalog")]
    pub nft_catalog: Vec<NftListing>,

    /// Total CAN supply reported in the network statistics.
    #[serde(default = "default_total_supply")]
    pub total_supply: CanAmount,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_coin_apy() -> Apy {
    Apy::COIN_DEFAULT
}

fn default_nft_apy() -> Apy {
    Apy::NFT_DEFAULT
}

fn default_dust_threshold() -> CanAmount {
    CanAmount::new(10_000)
}

fn default_max_claim_attempts() -> u32 {
    3
}

fn default_total_supply() -> CanAmount {
    CanAmount::from_can(1_000_000_000)
}

fn default_nft_catalog() -> Vec<NftListing> {
    vec![
        NftListing {
            id: "nft-1".to_string(),
            name: "Premium Business NFT".to_string(),
            value: CanAmount::from_can(50_000),
        },
        NftListing {
            id: "nft-2".to_string(),
            name: "Elite Investment NFT".to_string(),
            value: CanAmount::from_can(100_000),
        },
        NftListing {
            id: "nft-3".to_string(),
            name: "Diamond Tier NFT".to_string(),
            value: CanAmount::from_can(250_000),
        },
    ]
}

// ── Impl ───────────────────────────────────────────────────────────────

impl StakingParams {
    /// Look up an NFT in the staking catalog.
    pub fn nft(&self, id: &str) -> Option<&NftListing> {
        self.nft_catalog.iter().find(|n| n.id == id)
    }
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            coin_apy: default_coin_apy(),
            nft_apy: default_nft_apy(),
            dust_threshold: default_dust_threshold(),
            max_claim_attempts: default_max_claim_attempts(),
            current_phase: None,
            nft_catalog: default_nft_catalog(),
            total_supply: default_total_supply(),
        }
    }
}
