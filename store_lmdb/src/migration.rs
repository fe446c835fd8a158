//! Database schema migration engine.
//!
//! Tracks a monotonically increasing schema version in the meta database and
//! runs sequential migration functions to bring an older database up to date.

use can_store::ledger::{totals_credit, totals_lock};
use can_types::{LedgerTotals, Profile, Stake, Timestamp};

use crate::{LmdbEnvironment, LmdbError};

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    /// Check the stored schema version and run any needed migrations.
    ///
    /// - Version 0 means a fresh database (no version stored yet).
    /// - If the stored version matches `CURRENT_SCHEMA_VERSION`, this is a no-op.
    /// - If the stored version is *higher* than what this code supports, the
    ///   database was written by a newer release and we refuse to open it.
    pub fn run(env: &LmdbEnvironment) -> Result<(), LmdbError> {
        let current = env.schema_version()?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = current, "database schema is up to date");
            return Ok(());
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Schema(format!(
                "database schema version {} is newer than supported version {}",
                current, CURRENT_SCHEMA_VERSION
            )));
        }

        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_migration(env, version, version + 1)?;
        }

        env.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }
}

fn run_migration(env: &LmdbEnvironment, from: u32, to: u32) -> Result<(), LmdbError> {
    match (from, to) {
        // Initial schema, nothing to migrate from a blank slate.
        (0, 1) => Ok(()),
        (1, 2) => backfill_totals(env),
        _ => Err(LmdbError::Schema(format!(
            "unknown migration: {} -> {}",
            from, to
        ))),
    }
}

/// Version 2 keeps running ledger totals. Rebuild them from the balances and
/// active stakes already on disk.
fn backfill_totals(env: &LmdbEnvironment) -> Result<(), LmdbError> {
    let mut wtxn = env.env().write_txn()?;
    let mut totals = LedgerTotals::default();
    let mut last_write = Timestamp::EPOCH;

    for entry in env.profiles_db.iter(&wtxn)? {
        let (_, bytes) = entry?;
        let profile: Profile = bincode::deserialize(bytes)?;
        totals_credit(&mut totals, profile.balance, profile.updated_at)
            .map_err(|e| LmdbError::Corruption(e.to_string()))?;
        last_write = last_write.max(profile.updated_at);
    }
    for entry in env.stakes_db.iter(&wtxn)? {
        let (_, bytes) = entry?;
        let stake: Stake = bincode::deserialize(bytes)?;
        if stake.is_active() {
            totals_lock(&mut totals, stake.principal, stake.created_at)
                .map_err(|e| LmdbError::Corruption(e.to_string()))?;
            last_write = last_write.max(stake.staked_since);
        }
    }
    totals.updated_at = last_write;

    env.put_totals_in(&mut wtxn, &totals)?;
    wtxn.commit()?;
    tracing::info!(
        circulating = %totals.circulating_supply,
        locked = %totals.value_locked,
        "ledger totals rebuilt"
    );
    Ok(())
}
