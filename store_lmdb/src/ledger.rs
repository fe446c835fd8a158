//! LMDB implementation of StakingLedger.
//!
//! Every method opens one write transaction, applies the shared row
//! transitions from `can_store::ledger`, and commits. Returning early with an
//! error drops the transaction, which aborts it, so a failed check never
//! leaves a partial write behind.

use heed::{RoTxn, RwTxn};

use can_store::ledger::{
    apply_claim, apply_tier_purchase, check_nft_unique, check_registration, credit_profile,
    debit_profile, make_transaction, totals_credit, totals_debit, totals_open_stake,
};
use can_store::{
    BalanceChanged, ClaimSettled, ClaimSettlement, NewStake, StakeOpened, StakingLedger,
    StoreError,
};
use can_types::{
    AccountId, CanAmount, EventRegistration, MembershipTier, NewsDraft, NewsId, NewsItem,
    Profile, Stake, StakeId, Timestamp, TransactionKind, TransactionRecord,
};

use crate::environment::{
    owner_prefix, owner_stake_key, read_record, registration_key, stake_id_from_index_key,
    write_record,
};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    fn profile_in(&self, txn: &RoTxn, id: &AccountId) -> Result<Option<Profile>, LmdbError> {
        read_record(&self.profiles_db, txn, id.as_str().as_bytes())
    }

    fn put_profile_in(&self, wtxn: &mut RwTxn, profile: &Profile) -> Result<(), LmdbError> {
        write_record(
            &self.profiles_db,
            wtxn,
            profile.id.as_str().as_bytes(),
            profile,
        )
    }

    fn stake_in(&self, txn: &RoTxn, id: StakeId) -> Result<Option<Stake>, LmdbError> {
        read_record(&self.stakes_db, txn, &id.to_be_bytes())
    }

    fn owner_stakes_in(&self, txn: &RoTxn, owner: &AccountId) -> Result<Vec<Stake>, LmdbError> {
        let prefix = owner_prefix(owner);
        let mut stakes = Vec::new();
        for entry in self.owner_stakes_db.prefix_iter(txn, prefix.as_slice())? {
            let (key, _) = entry?;
            let id = stake_id_from_index_key(key)?;
            let stake = self.stake_in(txn, id)?.ok_or_else(|| {
                LmdbError::Corruption(format!("owner index points at missing stake {id}"))
            })?;
            stakes.push(stake);
        }
        Ok(stakes)
    }

    fn put_stake_in(&self, wtxn: &mut RwTxn, stake: &Stake) -> Result<(), LmdbError> {
        write_record(&self.stakes_db, wtxn, &stake.id.to_be_bytes(), stake)
    }

    pub(crate) fn news_in(&self, txn: &RoTxn, id: NewsId) -> Result<Option<NewsItem>, LmdbError> {
        read_record(&self.news_db, txn, &id.to_be_bytes())
    }

    pub(crate) fn registration_count_in(&self, txn: &RoTxn, event: NewsId) -> Result<u64, LmdbError> {
        let mut count = 0;
        for entry in self
            .registrations_db
            .prefix_iter(txn, event.to_be_bytes().as_slice())?
        {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn append_transaction(
        &self,
        wtxn: &mut RwTxn,
        account: &AccountId,
        kind: TransactionKind,
        amount: CanAmount,
        phase: Option<u8>,
        now: Timestamp,
    ) -> Result<TransactionRecord, LmdbError> {
        let id = self.next_transaction_id(wtxn)?;
        let record = make_transaction(id, account, kind, amount, phase, now);
        write_record(&self.transactions_db, wtxn, &id.to_be_bytes(), &record)?;
        Ok(record)
    }
}

impl StakingLedger for LmdbEnvironment {
    fn ensure_profile(&self, id: &AccountId, now: Timestamp) -> Result<Profile, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        if let Some(existing) = self.profile_in(&wtxn, id)? {
            return Ok(existing);
        }
        let profile = Profile::new(id.clone(), now);
        self.put_profile_in(&mut wtxn, &profile)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::debug!(account = %id, "profile created");
        Ok(profile)
    }

    fn set_username(
        &self,
        id: &AccountId,
        username: Option<String>,
        now: Timestamp,
    ) -> Result<Profile, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let mut profile = self
            .profile_in(&wtxn, id)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
        profile.username = username;
        profile.updated_at = now;
        self.put_profile_in(&mut wtxn, &profile)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(profile)
    }

    fn credit(
        &self,
        id: &AccountId,
        amount: CanAmount,
        phase: Option<u8>,
        now: Timestamp,
    ) -> Result<BalanceChanged, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let mut profile = self
            .profile_in(&wtxn, id)?
            .unwrap_or_else(|| Profile::new(id.clone(), now));
        credit_profile(&mut profile, amount, now)?;
        let mut totals = self.totals_in(&wtxn)?;
        totals_credit(&mut totals, amount, now)?;

        self.put_profile_in(&mut wtxn, &profile)?;
        self.put_totals_in(&mut wtxn, &totals)?;
        let transaction =
            self.append_transaction(&mut wtxn, id, TransactionKind::Deposit, amount, phase, now)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(BalanceChanged {
            profile,
            transaction,
        })
    }

    fn open_stake(&self, new: &NewStake) -> Result<StakeOpened, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;

        let (mut profile, profile_created) = match self.profile_in(&wtxn, &new.owner)? {
            Some(profile) => (profile, false),
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
            let existing = self.owner_stakes_in(&wtxn, &new.owner)?;
            check_nft_unique(new, &existing)?;
        }
        let mut totals = self.totals_in(&wtxn)?;
        totals_open_stake(&mut totals, new)?;

        let stake_id = self.next_stake_id(&mut wtxn)?;
        let stake = new.to_stake(stake_id);
        self.put_stake_in(&mut wtxn, &stake)?;
        self.owner_stakes_db
            .put(&mut wtxn, &owner_stake_key(&new.owner, stake_id), &[])
            .map_err(LmdbError::from)?;
        self.put_profile_in(&mut wtxn, &profile)?;
        self.put_totals_in(&mut wtxn, &totals)?;
        let transaction = self.append_transaction(
            &mut wtxn,
            &new.owner,
            new.transaction_kind(),
            new.principal,
            new.phase,
            new.now,
        )?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(stake = %stake_id, owner = %new.owner, principal = %new.principal, "stake opened");
        Ok(StakeOpened {
            stake,
            profile,
            profile_created,
            transaction,
        })
    }

    fn settle_claim(&self, settlement: &ClaimSettlement) -> Result<ClaimSettled, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;

        let mut stake = self
            .stake_in(&wtxn, settlement.stake_id)?
            .ok_or_else(|| StoreError::NotFound(format!("stake {}", settlement.stake_id)))?;
        apply_claim(&mut stake, settlement)?;

        let mut profile = self
            .profile_in(&wtxn, &settlement.owner)?
            .unwrap_or_else(|| Profile::new(settlement.owner.clone(), settlement.now));
        credit_profile(&mut profile, settlement.reward, settlement.now)?;
        let mut totals = self.totals_in(&wtxn)?;
        totals_credit(&mut totals, settlement.reward, settlement.now)?;

        self.put_stake_in(&mut wtxn, &stake)?;
        self.put_profile_in(&mut wtxn, &profile)?;
        self.put_totals_in(&mut wtxn, &totals)?;
        let transaction = self.append_transaction(
            &mut wtxn,
            &settlement.owner,
            TransactionKind::Claim,
            settlement.reward,
            settlement.phase,
            settlement.now,
        )?;
        wtxn.commit().map_err(LmdbError::from)?;

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
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let mut profile =
            self.profile_in(&wtxn, id)?
                .ok_or_else(|| StoreError::InsufficientFunds {
                    needed: tier.price(),
                    available: CanAmount::ZERO,
                })?;
        apply_tier_purchase(&mut profile, tier, now)?;
        let mut totals = self.totals_in(&wtxn)?;
        totals_debit(&mut totals, tier.price(), now);

        self.put_profile_in(&mut wtxn, &profile)?;
        self.put_totals_in(&mut wtxn, &totals)?;
        let transaction = self.append_transaction(
            &mut wtxn,
            id,
            TransactionKind::TierPurchase,
            tier.price(),
            phase,
            now,
        )?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(BalanceChanged {
            profile,
            transaction,
        })
    }

    fn publish_news(&self, draft: &NewsDraft, now: Timestamp) -> Result<NewsItem, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let id = self.next_news_id(&mut wtxn)?;
        let item = draft.clone().into_item(id, now);
        write_record(&self.news_db, &mut wtxn, &id.to_be_bytes(), &item)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::debug!(news = %id, kind = %item.kind, "news published");
        Ok(item)
    }

    fn register_for_event(
        &self,
        event: NewsId,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<EventRegistration, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let item = self
            .news_in(&wtxn, event)?
            .ok_or_else(|| StoreError::NotFound(format!("event {event}")))?;
        let key = registration_key(event, account);
        let already = self
            .registrations_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        let count = self.registration_count_in(&wtxn, event)?;
        check_registration(&item, account, already, count)?;

        let registration = EventRegistration {
            event_id: event,
            account: account.clone(),
            registered_at: now,
        };
        write_record(&self.registrations_db, &mut wtxn, &key, &registration)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(registration)
    }

    fn cancel_registration(
        &self,
        event: NewsId,
        account: &AccountId,
    ) -> Result<EventRegistration, StoreError> {
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        let key = registration_key(event, account);
        let registration: EventRegistration = read_record(&self.registrations_db, &wtxn, &key)?
            .ok_or_else(|| {
                StoreError::NotFound(format!("registration of {account} for event {event}"))
            })?;
        self.registrations_db
            .delete(&mut wtxn, &key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_store::{
        NewsQuery, NewsStore, ProfileStore, StakeStore, StatsStore, TransactionQuery,
        TransactionStore,
    };
    use can_types::{Apy, NewsKind, StakeAsset, StakeKind};
    use std::sync::Arc;

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 8, 64 * 1024 * 1024).expect("open env");
        (dir, env)
    }

    fn alice() -> AccountId {
        AccountId::new("alice").unwrap()
    }

    fn coin_stake(owner: &AccountId, principal: u128, now: u64) -> NewStake {
        NewStake {
            owner: owner.clone(),
            asset: StakeAsset::Coin,
            principal: CanAmount::from_can(principal),
            apy: Apy::COIN_DEFAULT,
            phase: Some(2),
            now: Timestamp::new(now),
        }
    }

    fn nft_stake(owner: &AccountId, nft_id: &str) -> NewStake {
        NewStake {
            owner: owner.clone(),
            asset: StakeAsset::Nft {
                nft_id: nft_id.to_string(),
                nft_name: "Premium Business NFT".to_string(),
            },
            principal: CanAmount::from_can(50_000),
            apy: Apy::NFT_DEFAULT,
            phase: None,
            now: Timestamp::new(10),
        }
    }

    #[test]
    fn open_coin_stake_debits_inserts_and_logs_atomically() {
        let (_dir, env) = temp_env();
        env.credit(&alice(), CanAmount::from_can(1_000), None, Timestamp::new(1))
            .unwrap();

        let opened = env.open_stake(&coin_stake(&alice(), 400, 5)).unwrap();
        assert_eq!(opened.stake.id, StakeId::new(1));
        assert_eq!(opened.profile.balance, CanAmount::from_can(600));
        assert_eq!(opened.transaction.kind, TransactionKind::Stake);
        assert_eq!(opened.transaction.phase, Some(2));

        assert_eq!(env.balance(&alice()).unwrap(), CanAmount::from_can(600));
        assert_eq!(env.get_stake(StakeId::new(1)).unwrap(), opened.stake);
        assert_eq!(env.transaction_count().unwrap(), 2);
    }

    #[test]
    fn insufficient_balance_writes_nothing() {
        let (_dir, env) = temp_env();
        env.credit(&alice(), CanAmount::from_can(100), None, Timestamp::new(1))
            .unwrap();

        let err = env.open_stake(&coin_stake(&alice(), 500, 5)).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));
        assert_eq!(env.balance(&alice()).unwrap(), CanAmount::from_can(100));
        assert_eq!(env.stake_count().unwrap(), 0);
        assert_eq!(env.transaction_count().unwrap(), 1);

        // The aborted transaction must not have consumed a stake id.
        env.credit(&alice(), CanAmount::from_can(500), None, Timestamp::new(2))
            .unwrap();
        let opened = env.open_stake(&coin_stake(&alice(), 500, 6)).unwrap();
        assert_eq!(opened.stake.id, StakeId::new(1));
    }

    #[test]
    fn stakes_for_owner_are_newest_first_and_filtered() {
        let (_dir, env) = temp_env();
        let bob = AccountId::new("bob").unwrap();
        env.credit(&alice(), CanAmount::from_can(1_000), None, Timestamp::new(1))
            .unwrap();
        env.credit(&bob, CanAmount::from_can(1_000), None, Timestamp::new(1))
            .unwrap();

        env.open_stake(&coin_stake(&alice(), 10, 2)).unwrap();
        env.open_stake(&coin_stake(&bob, 10, 3)).unwrap();
        env.open_stake(&nft_stake(&alice(), "nft-1")).unwrap();
        env.open_stake(&coin_stake(&alice(), 20, 4)).unwrap();

        let all: Vec<u64> = env
            .stakes_for_owner(&alice(), None)
            .unwrap()
            .iter()
            .map(|s| s.id.get())
            .collect();
        assert_eq!(all, vec![4, 3, 1]);

        let coins = env.stakes_for_owner(&alice(), Some(StakeKind::Coin)).unwrap();
        assert_eq!(coins.len(), 2);
        assert!(coins.iter().all(|s| s.kind() == StakeKind::Coin));
    }

    #[test]
    fn nft_stake_leaves_balance_and_rejects_duplicates() {
        let (_dir, env) = temp_env();
        env.credit(&alice(), CanAmount::from_can(5), None, Timestamp::new(1))
            .unwrap();

        let opened = env.open_stake(&nft_stake(&alice(), "nft-1")).unwrap();
        assert_eq!(opened.profile.balance, CanAmount::from_can(5));
        assert_eq!(opened.transaction.kind, TransactionKind::NftStake);

        let err = env.open_stake(&nft_stake(&alice(), "nft-1")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(env.stake_count().unwrap(), 1);
    }

    #[test]
    fn settle_claim_is_compare_and_swap() {
        let (_dir, env) = temp_env();
        env.credit(&alice(), CanAmount::from_can(1_000), None, Timestamp::new(0))
            .unwrap();
        let stake = env.open_stake(&coin_stake(&alice(), 1_000, 100)).unwrap().stake;

        let settlement = ClaimSettlement {
            stake_id: stake.id,
            owner: alice(),
            expected_since: Timestamp::new(100),
            reward: CanAmount::from_can(3),
            phase: None,
            now: Timestamp::new(500),
        };
        let settled = env.settle_claim(&settlement).unwrap();
        assert_eq!(settled.stake.staked_since, Timestamp::new(500));
        assert_eq!(settled.profile.balance, CanAmount::from_can(3));

        // Same expected window again: the first claim already moved it.
        let err = env.settle_claim(&settlement).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(env.balance(&alice()).unwrap(), CanAmount::from_can(3));
    }

    #[test]
    fn settle_claim_hides_foreign_stakes() {
        let (_dir, env) = temp_env();
        env.credit(&alice(), CanAmount::from_can(10), None, Timestamp::new(0))
            .unwrap();
        let stake = env.open_stake(&coin_stake(&alice(), 10, 0)).unwrap().stake;

        let settlement = ClaimSettlement {
            stake_id: stake.id,
            owner: AccountId::new("mallory").unwrap(),
            expected_since: stake.staked_since,
            reward: CanAmount::from_can(1),
            phase: None,
            now: Timestamp::new(100),
        };
        assert!(matches!(
            env.settle_claim(&settlement),
            Err(StoreError::NotFound(_))
        ));
        assert!(!env.profile_exists(&AccountId::new("mallory").unwrap()).unwrap());
    }

    #[test]
    fn concurrent_settlements_credit_once() {
        let (_dir, env) = temp_env();
        let env = Arc::new(env);
        env.credit(&alice(), CanAmount::from_can(1_000), None, Timestamp::new(0))
            .unwrap();
        let stake = env.open_stake(&coin_stake(&alice(), 1_000, 0)).unwrap().stake;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let env = Arc::clone(&env);
                let settlement = ClaimSettlement {
                    stake_id: stake.id,
                    owner: alice(),
                    expected_since: stake.staked_since,
                    reward: CanAmount::from_can(100),
                    phase: None,
                    now: Timestamp::new(1_000),
                };
                std::thread::spawn(move || env.settle_claim(&settlement).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(env.balance(&alice()).unwrap(), CanAmount::from_can(100));
    }

    #[test]
    fn tier_purchase_and_transaction_queries() {
        let (_dir, env) = temp_env();
        env.credit(&alice(), CanAmount::from_can(300), Some(1), Timestamp::new(1))
            .unwrap();
        let changed = env
            .purchase_tier(&alice(), MembershipTier::Silver, Some(2), Timestamp::new(2))
            .unwrap();
        assert_eq!(changed.profile.balance, CanAmount::from_can(50));
        assert_eq!(changed.profile.membership_tier, Some(MembershipTier::Silver));

        let err = env
            .purchase_tier(&alice(), MembershipTier::Gold, None, Timestamp::new(3))
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));

        let latest = env.recent_transactions(&TransactionQuery::latest(10)).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].kind, TransactionKind::TierPurchase);

        let phase_one = env
            .recent_transactions(&TransactionQuery {
                phase: Some(1),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(phase_one.len(), 1);
        assert_eq!(phase_one[0].kind, TransactionKind::Deposit);

        assert!(env
            .recent_transactions(&TransactionQuery::latest(0))
            .unwrap()
            .is_empty());
    }

    fn meetup(max_attendees: Option<u32>) -> NewsDraft {
        NewsDraft {
            kind: NewsKind::Event,
            title: "Investor meetup".into(),
            description: "Quarterly investor meetup".into(),
            content: None,
            image_url: None,
            location: Some("Hanoi".into()),
            starts_at: Some(Timestamp::new(1_000)),
            ends_at: Some(Timestamp::new(2_000)),
            max_attendees,
            featured: true,
        }
    }

    #[test]
    fn nft_stake_reports_a_created_profile() {
        let (_dir, env) = temp_env();
        let opened = env.open_stake(&nft_stake(&alice(), "nft-2")).unwrap();
        assert!(opened.profile_created);
        assert!(env.profile_exists(&alice()).unwrap());

        let again = env.open_stake(&nft_stake(&alice(), "nft-3")).unwrap();
        assert!(!again.profile_created);
    }

    #[test]
    fn totals_move_with_every_write() {
        let (_dir, env) = temp_env();
        assert_eq!(env.ledger_totals().unwrap().circulating_supply, CanAmount::ZERO);

        env.credit(&alice(), CanAmount::from_can(1_000), None, Timestamp::new(1))
            .unwrap();
        let stake = env.open_stake(&coin_stake(&alice(), 400, 2)).unwrap().stake;
        env.open_stake(&nft_stake(&alice(), "nft-1")).unwrap();
        env.settle_claim(&ClaimSettlement {
            stake_id: stake.id,
            owner: alice(),
            expected_since: stake.staked_since,
            reward: CanAmount::from_can(5),
            phase: None,
            now: Timestamp::new(30),
        })
        .unwrap();
        env.purchase_tier(&alice(), MembershipTier::Bronze, None, Timestamp::new(40))
            .unwrap();

        let totals = env.ledger_totals().unwrap();
        let expected = CanAmount::from_can(1_000 - 400 + 5) - MembershipTier::Bronze.price();
        assert_eq!(totals.circulating_supply, expected);
        assert_eq!(totals.circulating_supply, env.balance(&alice()).unwrap());
        assert_eq!(totals.value_locked, CanAmount::from_can(50_400));
        assert_eq!(totals.updated_at, Timestamp::new(40));
    }

    #[test]
    fn overflowing_credit_is_rejected_untouched() {
        let (_dir, env) = temp_env();
        env.credit(&alice(), CanAmount::MAX, None, Timestamp::new(1))
            .unwrap();
        let err = env
            .credit(&alice(), CanAmount::new(1), None, Timestamp::new(2))
            .unwrap_err();
        assert!(matches!(err, StoreError::Overflow(_)));
        assert_eq!(env.balance(&alice()).unwrap(), CanAmount::MAX);
        assert_eq!(env.transaction_count().unwrap(), 1);
    }

    #[test]
    fn news_is_listed_newest_first() {
        let (_dir, env) = temp_env();
        let first = env.publish_news(&meetup(None), Timestamp::new(1)).unwrap();
        let mut announcement = meetup(None);
        announcement.kind = NewsKind::Announcement;
        announcement.featured = false;
        let second = env.publish_news(&announcement, Timestamp::new(2)).unwrap();

        assert_eq!(first.id, NewsId::new(1));
        assert_eq!(env.get_news(second.id).unwrap(), second);
        assert_eq!(env.news_count().unwrap(), 2);

        let all: Vec<u64> = env
            .recent_news(&NewsQuery::latest(10))
            .unwrap()
            .iter()
            .map(|n| n.id.get())
            .collect();
        assert_eq!(all, vec![2, 1]);

        let events = env
            .recent_news(&NewsQuery {
                kind: Some(NewsKind::Event),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(events, vec![first]);

        let featured = env
            .recent_news(&NewsQuery {
                featured_only: true,
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(featured.len(), 1);
        assert!(env.recent_news(&NewsQuery::latest(0)).unwrap().is_empty());
    }

    #[test]
    fn registrations_are_unique_and_capped() {
        let (_dir, env) = temp_env();
        let bob = AccountId::new("bob").unwrap();
        let carol = AccountId::new("carol").unwrap();
        let event = env.publish_news(&meetup(Some(2)), Timestamp::new(1)).unwrap();

        env.register_for_event(event.id, &alice(), Timestamp::new(5))
            .unwrap();
        assert!(matches!(
            env.register_for_event(event.id, &alice(), Timestamp::new(6)),
            Err(StoreError::Duplicate(_))
        ));
        env.register_for_event(event.id, &bob, Timestamp::new(7))
            .unwrap();
        assert!(matches!(
            env.register_for_event(event.id, &carol, Timestamp::new(8)),
            Err(StoreError::CapacityReached(_))
        ));
        assert_eq!(env.registration_count(event.id).unwrap(), 2);
        assert!(env.is_registered(event.id, &bob).unwrap());
        assert!(!env.is_registered(event.id, &carol).unwrap());

        let cancelled = env.cancel_registration(event.id, &bob).unwrap();
        assert_eq!(cancelled.registered_at, Timestamp::new(7));
        assert!(matches!(
            env.cancel_registration(event.id, &bob),
            Err(StoreError::NotFound(_))
        ));
        env.register_for_event(event.id, &carol, Timestamp::new(9))
            .unwrap();
        assert_eq!(env.registration_count(event.id).unwrap(), 2);

        assert!(matches!(
            env.register_for_event(NewsId::new(99), &alice(), Timestamp::new(10)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 8, 64 * 1024 * 1024).unwrap();
            env.credit(&alice(), CanAmount::from_can(42), None, Timestamp::new(1))
                .unwrap();
            env.set_username(&alice(), Some("Alice".into()), Timestamp::new(2))
                .unwrap();
        }
        let env = LmdbEnvironment::open(dir.path(), 8, 64 * 1024 * 1024).unwrap();
        let profile = env.get_profile(&alice()).unwrap();
        assert_eq!(profile.balance, CanAmount::from_can(42));
        assert_eq!(profile.username.as_deref(), Some("Alice"));
    }
}
