//! Nullable store — thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use can_store::ledger::{
    apply_claim, apply_tier_purchase, check_nft_unique, check_registration, credit_profile,
    debit_profile, make_transaction, totals_credit, totals_debit, totals_open_stake,
};
use can_store::{
    BalanceChanged, ClaimSettled, ClaimSettlement, NewStake, NewsQuery, NewsStore, ProfileStore,
    StakeOpened, StakeStore, StakingLedger, StatsStore, StoreError, TransactionQuery,
    TransactionStore,
};
use can_types::{
    AccountId, CanAmount, EventRegistration, LedgerTotals, MembershipTier, NewsDraft, NewsId,
    NewsItem, Profile, Stake, StakeId, StakeKind, Timestamp, TransactionId, TransactionKind,
    TransactionRecord,
};

#[derive(Default)]
struct Tables {
    profiles: HashMap<AccountId, Profile>,
    stakes: BTreeMap<StakeId, Stake>,
    transactions: Vec<TransactionRecord>,
    news: BTreeMap<NewsId, NewsItem>,
    registrations: BTreeMap<(NewsId, AccountId), EventRegistration>,
    totals: LedgerTotals,
    last_stake_id: u64,
    last_transaction_id: u64,
    last_news_id: u64,
    injected: VecDeque<StoreError>,
    stake_reads_fail: bool,
}

impl Tables {
    /// Pop the next injected failure, if any. Every ledger write calls this
    /// first, so a failure leaves the tables untouched.
    fn take_injected(&mut self) -> Result<(), StoreError> {
        match self.injected.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn registrations_for(&self, event: NewsId) -> usize {
        self.registrations
            .keys()
            .filter(|(id, _)| *id == event)
            .count()
    }

    fn next_stake_id(&mut self) -> StakeId {
        self.last_stake_id += 1;
        StakeId::new(self.last_stake_id)
    }

    fn append(
        &mut self,
        account: &AccountId,
        kind: TransactionKind,
        amount: CanAmount,
        phase: Option<u8>,
        now: Timestamp,
    ) -> TransactionRecord {
        self.last_transaction_id += 1;
        let record = make_transaction(
            TransactionId::new(self.last_transaction_id),
            account,
            kind,
            amount,
            phase,
            now,
        );
        self.transactions.push(record.clone());
        record
    }
}

/// An in-memory implementation of every store trait.
///
/// All tables sit behind one mutex, so each ledger operation is atomic in
/// the same way a single LMDB write transaction is.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next ledger write fail with `err` before touching any table.
    /// Calls queue up: the failures are returned in order.
    pub fn inject_failure(&self, err: StoreError) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.injected.push_back(err);
        }
    }

    /// Make the next `count` ledger writes fail with a backend error.
    pub fn fail_next_writes(&self, count: usize) {
        for _ in 0..count {
            self.inject_failure(StoreError::Backend("injected failure".to_string()));
        }
    }

    /// While set, every stake read fails with a backend error. Writes are
    /// unaffected.
    pub fn fail_stake_reads(&self, failing: bool) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.stake_reads_fail = failing;
        }
    }

    /// Seed a profile directly, bypassing the transaction log.
    pub fn put_profile(&self, profile: Profile) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.profiles.insert(profile.id.clone(), profile);
        }
    }

    /// Overwrite a stored stake as if another writer had changed it.
    pub fn put_stake(&self, stake: Stake) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.last_stake_id = tables.last_stake_id.max(stake.id.get());
            tables.stakes.insert(stake.id, stake);
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("null store mutex poisoned".to_string()))
    }
}

impl ProfileStore for NullStore {
    fn get_profile(&self, id: &AccountId) -> Result<Profile, StoreError> {
        self.tables()?
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))
    }

    fn profile_exists(&self, id: &AccountId) -> Result<bool, StoreError> {
        Ok(self.tables()?.profiles.contains_key(id))
    }

    fn profile_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables()?.profiles.len() as u64)
    }
}

impl NullStore {
    fn stake_tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        let tables = self.tables()?;
        if tables.stake_reads_fail {
            return Err(StoreError::Backend("stake read failed".to_string()));
        }
        Ok(tables)
    }
}

impl StakeStore for NullStore {
    fn get_stake(&self, id: StakeId) -> Result<Stake, StoreError> {
        self.stake_tables()?
            .stakes
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("stake {id}")))
    }

    fn stakes_for_owner(
        &self,
        owner: &AccountId,
        kind: Option<StakeKind>,
    ) -> Result<Vec<Stake>, StoreError> {
        Ok(self
            .stake_tables()?
            .stakes
            .values()
            .rev()
            .filter(|s| s.owner == *owner && kind.map_or(true, |k| s.kind() == k))
            .cloned()
            .collect())
    }

    fn stake_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables()?.stakes.len() as u64)
    }
}

impl TransactionStore for NullStore {
    fn get_transaction(&self, id: TransactionId) -> Result<TransactionRecord, StoreError> {
        self.tables()?
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))
    }

    fn recent_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .tables()?
            .transactions
            .iter()
            .rev()
            .filter(|t| query.matches(t))
            .take(query.limit)
            .cloned()
            .collect())
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables()?.transactions.len() as u64)
    }
}

impl NewsStore for NullStore {
    fn get_news(&self, id: NewsId) -> Result<NewsItem, StoreError> {
        self.tables()?
            .news
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("news {id}")))
    }

    fn recent_news(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, StoreError> {
        Ok(self
            .tables()?
            .news
            .values()
            .rev()
            .filter(|n| query.matches(n))
            .take(query.limit)
            .cloned()
            .collect())
    }

    fn news_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables()?.news.len() as u64)
    }

    fn is_registered(&self, event: NewsId, account: &AccountId) -> Result<bool, StoreError> {
        Ok(self
            .tables()?
            .registrations
            .contains_key(&(event, account.clone())))
    }

    fn registration_count(&self, event: NewsId) -> Result<u64, StoreError> {
        Ok(self.tables()?.registrations_for(event) as u64)
    }
}

impl StatsStore for NullStore {
    fn ledger_totals(&self) -> Result<LedgerTotals, StoreError> {
        Ok(self.tables()?.totals)
    }
}

impl StakingLedger for NullStore {
    fn ensure_profile(&self, id: &AccountId, now: Timestamp) -> Result<Profile, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;
        Ok(tables
            .profiles
            .entry(id.clone())
            .or_insert_with(|| Profile::new(id.clone(), now))
            .clone())
    }

    fn set_username(
        &self,
        id: &AccountId,
        username: Option<String>,
        now: Timestamp,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;
        let profile = tables
            .profiles
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
        profile.username = username;
        profile.updated_at = now;
        Ok(profile.clone())
    }

    fn credit(
        &self,
        id: &AccountId,
        amount: CanAmount,
        phase: Option<u8>,
        now: Timestamp,
    ) -> Result<BalanceChanged, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;
        let mut profile = tables
            .profiles
            .get(id)
            .cloned()
            .unwrap_or_else(|| Profile::new(id.clone(), now));
        credit_profile(&mut profile, amount, now)?;
        let mut totals = tables.totals;
        totals_credit(&mut totals, amount, now)?;

        tables.profiles.insert(id.clone(), profile.clone());
        tables.totals = totals;
        let transaction = tables.append(id, TransactionKind::Deposit, amount, phase, now);
        Ok(BalanceChanged {
            profile,
            transaction,
        })
    }

    fn open_stake(&self, new: &NewStake) -> Result<StakeOpened, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;

        let (mut profile, profile_created) = match tables.profiles.get(&new.owner) {
            Some(profile) => (profile.clone(), false),
            None if new.debits_balance() => {
                return Err(StoreError::InsufficientFunds {
                    needed: new.principal,
                    available: CanAmount::ZERO,
                });
            }
            None => (Profile::new(new.owner.clone(), new.now), true),
        };
        if new.debits_balance() {
            debit_profile(&mut profile, new.principal, new.now)?;
        } else {
            check_nft_unique(new, tables.stakes.values())?;
        }
        let mut totals = tables.totals;
        totals_open_stake(&mut totals, new)?;

        let id = tables.next_stake_id();
        let stake = new.to_stake(id);
        tables.stakes.insert(id, stake.clone());
        tables.profiles.insert(new.owner.clone(), profile.clone());
        tables.totals = totals;
        let transaction = tables.append(
            &new.owner,
            new.transaction_kind(),
            new.principal,
            new.phase,
            new.now,
        );
        Ok(StakeOpened {
            stake,
            profile,
            profile_created,
            transaction,
        })
    }

    fn settle_claim(&self, settlement: &ClaimSettlement) -> Result<ClaimSettled, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;

        let mut stake = tables
            .stakes
            .get(&settlement.stake_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("stake {}", settlement.stake_id)))?;
        apply_claim(&mut stake, settlement)?;
        let mut profile = tables
            .profiles
            .get(&settlement.owner)
            .cloned()
            .unwrap_or_else(|| Profile::new(settlement.owner.clone(), settlement.now));
        credit_profile(&mut profile, settlement.reward, settlement.now)?;
        let mut totals = tables.totals;
        totals_credit(&mut totals, settlement.reward, settlement.now)?;

        tables.stakes.insert(stake.id, stake.clone());
        tables.totals = totals;
        tables
            .profiles
            .insert(settlement.owner.clone(), profile.clone());
        let transaction = tables.append(
            &settlement.owner,
            TransactionKind::Claim,
            settlement.reward,
            settlement.phase,
            settlement.now,
        );
        Ok(ClaimSettled {
            stake,
            profile,
            transaction,
        })
    }

    fn purchase_tier(
        &self,
        id: &AccountId,
        tier: MembershipTier,
        phase: Option<u8>,
        now: Timestamp,
    ) -> Result<BalanceChanged, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;
        let mut profile =
            tables
                .profiles
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::InsufficientFunds {
                    needed: tier.price(),
                    available: CanAmount::ZERO,
                })?;
        apply_tier_purchase(&mut profile, tier, now)?;
        totals_debit(&mut tables.totals, tier.price(), now);
        tables.profiles.insert(id.clone(), profile.clone());
        let transaction = tables.append(id, TransactionKind::TierPurchase, tier.price(), phase, now);
        Ok(BalanceChanged {
            profile,
            transaction,
        })
    }

    fn publish_news(&self, draft: &NewsDraft, now: Timestamp) -> Result<NewsItem, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;
        tables.last_news_id += 1;
        let id = NewsId::new(tables.last_news_id);
        let item = draft.clone().into_item(id, now);
        tables.news.insert(id, item.clone());
        Ok(item)
    }

    fn register_for_event(
        &self,
        event: NewsId,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<EventRegistration, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;
        let item = tables
            .news
            .get(&event)
            .ok_or_else(|| StoreError::NotFound(format!("event {event}")))?;
        let key = (event, account.clone());
        check_registration(
            item,
            account,
            tables.registrations.contains_key(&key),
            tables.registrations_for(event) as u64,
        )?;
        let registration = EventRegistration {
            event_id: event,
            account: account.clone(),
            registered_at: now,
        };
        tables.registrations.insert(key, registration.clone());
        Ok(registration)
    }

    fn cancel_registration(
        &self,
        event: NewsId,
        account: &AccountId,
    ) -> Result<EventRegistration, StoreError> {
        let mut tables = self.tables()?;
        tables.take_injected()?;
        tables
            .registrations
            .remove(&(event, account.clone()))
            .ok_or_else(|| {
                StoreError::NotFound(format!("registration of {account} for event {event}"))
            })
    }
}
