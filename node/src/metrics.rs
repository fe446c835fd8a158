//! Prometheus metrics for the staking node.
//!
//! [`NodeMetrics`] owns the process [`Registry`]. Its counters are driven by
//! the engine's transaction log events, so every committed balance movement
//! is counted exactly once. The HTTP layer registers its own request
//! counters on the same registry and renders it at `GET /metrics`.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

use can_staking::StakingEvent;
use can_types::{TransactionKind, TransactionRecord};

/// Central collection of node-level metrics.
pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Stakes opened, labelled by asset (`coin` or `nft`).
    pub stakes_opened: IntCounterVec,
    pub claims_settled: IntCounter,
    pub deposits: IntCounter,
    pub tier_purchases: IntCounter,
    /// Rewards credited since start, in raw units.
    pub rewards_paid_raw: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub active_sessions: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics under a new [`Registry`].
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let stakes_opened = register_int_counter_vec_with_registry!(
            Opts::new("can_stakes_opened_total", "Stakes opened, by asset"),
            &["asset"],
            registry
        )?;
        let claims_settled = register_int_counter_with_registry!(
            Opts::new("can_claims_settled_total", "Reward claims paid out"),
            registry
        )?;
        let deposits = register_int_counter_with_registry!(
            Opts::new("can_deposits_total", "Faucet and administrative credits"),
            registry
        )?;
        let tier_purchases = register_int_counter_with_registry!(
            Opts::new("can_tier_purchases_total", "Membership tiers bought"),
            registry
        )?;
        let rewards_paid_raw = register_int_counter_with_registry!(
            Opts::new(
                "can_rewards_paid_raw_total",
                "Staking rewards credited since start, in raw units"
            ),
            registry
        )?;
        let active_sessions = register_int_gauge_with_registry!(
            Opts::new("can_active_sessions", "Sessions currently registered"),
            registry
        )?;

        Ok(Self {
            registry,
            stakes_opened,
            claims_settled,
            deposits,
            tier_purchases,
            rewards_paid_raw,
            active_sessions,
        })
    }

    /// Count one engine event. Only transaction log entries move counters.
    pub fn observe(&self, event: &StakingEvent) {
        if let StakingEvent::TransactionInserted(record) = event {
            self.record(record);
        }
    }

    fn record(&self, record: &TransactionRecord) {
        match record.kind {
            TransactionKind::Stake => self.stakes_opened.with_label_values(&["coin"]).inc(),
            TransactionKind::NftStake => self.stakes_opened.with_label_values(&["nft"]).inc(),
            TransactionKind::Claim => {
                self.claims_settled.inc();
                let raw = u64::try_from(record.amount.raw()).unwrap_or(u64::MAX);
                self.rewards_paid_raw.inc_by(raw);
            }
            TransactionKind::Deposit => self.deposits.inc(),
            TransactionKind::TierPurchase => self.tier_purchases.inc(),
        }
    }
}
