//! LMDB environment setup and shared record helpers.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use can_types::{AccountId, LedgerTotals, NewsId, StakeId};

use crate::migration::Migrator;
use crate::LmdbError;

/// Number of named databases the environment needs.
pub const MAX_DBS: u32 = 8;

/// Default map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const META_NEXT_STAKE_ID: &str = "next_stake_id";
const META_NEXT_TRANSACTION_ID: &str = "next_transaction_id";
const META_NEXT_NEWS_ID: &str = "next_news_id";
const STATS_TOTALS: &[u8] = b"ledger_totals";
const META_SCHEMA_VERSION: &str = "schema_version";

/// Wraps the LMDB environment and all database handles.
///
/// Key layout:
/// - `profiles`: `account_id` → bincode [`can_types::Profile`]
/// - `stakes`: `stake_id` (u64 BE) → bincode [`can_types::Stake`]
/// - `owner_stakes`: `account_id ++ 0x00 ++ stake_id` → empty (index)
/// - `transactions`: `transaction_id` (u64 BE) → bincode [`can_types::TransactionRecord`]
/// - `news`: `news_id` (u64 BE) → bincode [`can_types::NewsItem`]
/// - `event_registrations`: `news_id ++ account_id` → bincode [`can_types::EventRegistration`]
/// - `stats`: `ledger_totals` → bincode [`can_types::LedgerTotals`]
/// - `meta`: id sequences and schema version
pub struct LmdbEnvironment {
    env: Env,
    pub(crate) profiles_db: Database<Bytes, Bytes>,
    pub(crate) stakes_db: Database<Bytes, Bytes>,
    pub(crate) owner_stakes_db: Database<Bytes, Bytes>,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
    pub(crate) news_db: Database<Bytes, Bytes>,
    pub(crate) registrations_db: Database<Bytes, Bytes>,
    pub(crate) stats_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, then bring the
    /// schema up to date.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: each data directory is opened by exactly one environment in
        // this process, and the files are not modified by other programs.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(MAX_DBS))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let profiles_db = env.create_database(&mut wtxn, Some("profiles"))?;
        let stakes_db = env.create_database(&mut wtxn, Some("stakes"))?;
        let owner_stakes_db = env.create_database(&mut wtxn, Some("owner_stakes"))?;
        let transactions_db = env.create_database(&mut wtxn, Some("transactions"))?;
        let news_db = env.create_database(&mut wtxn, Some("news"))?;
        let registrations_db = env.create_database(&mut wtxn, Some("event_registrations"))?;
        let stats_db = env.create_database(&mut wtxn, Some("stats"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let store = Self {
            env,
            profiles_db,
            stakes_db,
            owner_stakes_db,
            transactions_db,
            news_db,
            registrations_db,
            stats_db,
            meta_db,
        };
        Migrator::run(&store)?;
        tracing::info!(path = %path.display(), "LMDB environment opened");
        Ok(store)
    }

    /// Open with the default database count and map size.
    pub fn open_default(path: &Path) -> Result<Self, LmdbError> {
        Self::open(path, MAX_DBS, DEFAULT_MAP_SIZE)
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    // ── Meta ───────────────────────────────────────────────────────────

    pub fn schema_version(&self) -> Result<u32, LmdbError> {
        let rtxn = self.env.read_txn()?;
        match self.meta_db.get(&rtxn, META_SCHEMA_VERSION.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Corruption("schema version is not 4 bytes".to_string())
                })?;
                Ok(u32::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn set_schema_version(&self, version: u32) -> Result<(), LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        self.meta_db.put(
            &mut wtxn,
            META_SCHEMA_VERSION.as_bytes(),
            &version.to_be_bytes(),
        )?;
        wtxn.commit()?;
        Ok(())
    }

    /// Reserve the next stake id inside the caller's write transaction.
    pub(crate) fn next_stake_id(&self, wtxn: &mut RwTxn) -> Result<StakeId, LmdbError> {
        self.next_sequence(wtxn, META_NEXT_STAKE_ID).map(StakeId::new)
    }

    pub(crate) fn next_transaction_id(
        &self,
        wtxn: &mut RwTxn,
    ) -> Result<can_types::TransactionId, LmdbError> {
        self.next_sequence(wtxn, META_NEXT_TRANSACTION_ID)
            .map(can_types::TransactionId::new)
    }

    pub(crate) fn next_news_id(&self, wtxn: &mut RwTxn) -> Result<NewsId, LmdbError> {
        self.next_sequence(wtxn, META_NEXT_NEWS_ID).map(NewsId::new)
    }

    /// Ledger totals as seen by `txn`; zero before the first write.
    pub(crate) fn totals_in(&self, txn: &RoTxn) -> Result<LedgerTotals, LmdbError> {
        Ok(read_record(&self.stats_db, txn, STATS_TOTALS)?.unwrap_or_default())
    }

    pub(crate) fn put_totals_in(
        &self,
        wtxn: &mut RwTxn,
        totals: &LedgerTotals,
    ) -> Result<(), LmdbError> {
        write_record(&self.stats_db, wtxn, STATS_TOTALS, totals)
    }

    fn next_sequence(&self, wtxn: &mut RwTxn, key: &str) -> Result<u64, LmdbError> {
        let current = match self.meta_db.get(wtxn, key.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Corruption(format!("sequence {key} is not 8 bytes"))
                })?;
                u64::from_be_bytes(arr)
            }
            None => 1,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| LmdbError::Corruption(format!("sequence {key} exhausted")))?;
        self.meta_db
            .put(wtxn, key.as_bytes(), &next.to_be_bytes())?;
        Ok(current)
    }
}

// ── Record helpers ─────────────────────────────────────────────────────

pub(crate) fn read_record<T: DeserializeOwned>(
    db: &Database<Bytes, Bytes>,
    txn: &RoTxn,
    key: &[u8],
) -> Result<Option<T>, LmdbError> {
    match db.get(txn, key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn write_record<T: Serialize>(
    db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn,
    key: &[u8],
    value: &T,
) -> Result<(), LmdbError> {
    let bytes = bincode::serialize(value)?;
    db.put(wtxn, key, &bytes)?;
    Ok(())
}

/// Prefix shared by every index entry of one owner.
///
/// Account ids never contain control characters, so the `0x00` separator
/// keeps `alice` from matching `alice2`.
pub(crate) fn owner_prefix(owner: &AccountId) -> Vec<u8> {
    let raw = owner.as_str().as_bytes();
    let mut key = Vec::with_capacity(raw.len() + 1);
    key.extend_from_slice(raw);
    key.push(0);
    key
}

pub(crate) fn owner_stake_key(owner: &AccountId, id: StakeId) -> Vec<u8> {
    let mut key = owner_prefix(owner);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub(crate) fn registration_key(event: NewsId, account: &AccountId) -> Vec<u8> {
    let raw = account.as_str().as_bytes();
    let mut key = Vec::with_capacity(8 + raw.len());
    key.extend_from_slice(&event.to_be_bytes());
    key.extend_from_slice(raw);
    key
}

/// Decode the stake id suffix of an `owner_stakes` key.
pub(crate) fn stake_id_from_index_key(key: &[u8]) -> Result<StakeId, LmdbError> {
    let start = key
        .len()
        .checked_sub(8)
        .ok_or_else(|| LmdbError::Corruption("owner index key too short".to_string()))?;
    let arr: [u8; 8] = key[start..]
        .try_into()
        .map_err(|_| LmdbError::Corruption("owner index key too short".to_string()))?;
    Ok(StakeId::new(u64::from_be_bytes(arr)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_directory_and_sets_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db");
        let env = LmdbEnvironment::open(&path, MAX_DBS, 16 * 1024 * 1024).unwrap();
        assert_eq!(
            env.schema_version().unwrap(),
            crate::migration::CURRENT_SCHEMA_VERSION
        );
    }

    #[test]
    fn sequences_start_at_one_and_increase() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), MAX_DBS, 16 * 1024 * 1024).unwrap();
        let mut wtxn = env.env().write_txn().unwrap();
        assert_eq!(env.next_stake_id(&mut wtxn).unwrap(), StakeId::new(1));
        assert_eq!(env.next_stake_id(&mut wtxn).unwrap(), StakeId::new(2));
        assert_eq!(env.next_transaction_id(&mut wtxn).unwrap().get(), 1);
        assert_eq!(env.next_news_id(&mut wtxn).unwrap(), NewsId::new(1));
        wtxn.commit().unwrap();
    }

    #[test]
    fn owner_keys_round_trip_the_stake_id() {
        let owner = AccountId::new("alice").unwrap();
        let key = owner_stake_key(&owner, StakeId::new(42));
        assert!(key.starts_with(&owner_prefix(&owner)));
        assert_eq!(stake_id_from_index_key(&key).unwrap(), StakeId::new(42));
    }

    #[test]
    fn registration_keys_group_by_event() {
        let key = registration_key(NewsId::new(7), &AccountId::new("alice").unwrap());
        assert!(key.starts_with(&NewsId::new(7).to_be_bytes()));
        assert!(key.ends_with(b"alice"));
    }
}
