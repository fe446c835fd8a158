//! Bridge from engine events to the WebSocket change feed.

use can_staking::StakingEvent;
use can_types::{Stake, StakeKind};
use can_websocket::{ChangeKind, Table, WsState};

fn stake_table(stake: &Stake) -> Table {
    match stake.kind() {
        StakeKind::Coin => Table::StakingCoin,
        StakeKind::Nft => Table::StakingNft,
    }
}

/// Publish one engine event as a row change. Returns how many connections
/// received it. Publication is fire-and-forget: the change is already
/// committed when the event fires.
pub fn publish_event(ws: &WsState, event: &StakingEvent) -> usize {
    let account = event.account();
    match event {
        StakingEvent::ProfileChanged(profile) => {
            let kind = if profile.created_at == profile.updated_at {
                ChangeKind::Insert
            } else {
                ChangeKind::Update
            };
            ws.publish_change(Table::Profiles, kind, account, profile, profile.updated_at)
        }
        StakingEvent::StakeInserted(stake) => ws.publish_change(
            stake_table(stake),
            ChangeKind::Insert,
            account,
            stake,
            stake.created_at,
        ),
        StakingEvent::StakeUpdated(stake) => ws.publish_change(
            stake_table(stake),
            ChangeKind::Update,
            account,
            stake,
            stake.staked_since,
        ),
        StakingEvent::TransactionInserted(record) => ws.publish_change(
            Table::Transactions,
            ChangeKind::Insert,
            account,
            record,
            record.created_at,
        ),
        StakingEvent::NewsPublished(item) => ws.publish_change(
            Table::NewsEvents,
            ChangeKind::Insert,
            account,
            item,
            item.created_at,
        ),
        StakingEvent::RegistrationInserted(registration) => ws.publish_change(
            Table::EventRegistrations,
            ChangeKind::Insert,
            account,
            registration,
            registration.registered_at,
        ),
        StakingEvent::RegistrationDeleted(registration) => ws.publish_change(
            Table::EventRegistrations,
            ChangeKind::Delete,
            account,
            registration,
            registration.registered_at,
        ),
        StakingEvent::StatsChanged(stats) => ws.publish_change(
            Table::NetworkStats,
            ChangeKind::Update,
            account,
            stats,
            stats.updated_at,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_types::{
        AccountId, Apy, CanAmount, EventRegistration, NetworkStats, NewsId, Profile, StakeAsset,
        StakeId, StakeStatus, Timestamp,
    };

    fn nft_stake() -> Stake {
        Stake {
            id: StakeId::new(4),
            owner: AccountId::new("alice").unwrap(),
            asset: StakeAsset::Nft {
                nft_id: "nft-1".into(),
                nft_name: "Premium Business NFT".into(),
            },
            principal: CanAmount::from_can(50_000),
            apy: Apy::NFT_DEFAULT,
            staked_since: Timestamp::new(90),
            status: StakeStatus::Active,
            created_at: Timestamp::new(10),
        }
    }

    #[tokio::test]
    async fn stake_events_land_on_their_table() {
        let ws = WsState::new(8);
        let mut nft_rx = ws.sender_for(Table::StakingNft).subscribe();

        assert_eq!(publish_event(&ws, &StakingEvent::StakeUpdated(nft_stake())), 1);
        let change = nft_rx.recv().await.unwrap();
        assert_eq!(change.event, ChangeKind::Update);
        assert_eq!(change.timestamp, Timestamp::new(90));
        assert_eq!(change.row["asset"]["nft_id"], "nft-1");
        assert_eq!(change.account.as_ref().map(AccountId::as_str), Some("alice"));
    }

    #[tokio::test]
    async fn new_profiles_are_inserts() {
        let ws = WsState::new(8);
        let mut rx = ws.sender_for(Table::Profiles).subscribe();

        let mut profile = Profile::new(AccountId::new("bob").unwrap(), Timestamp::new(5));
        publish_event(&ws, &StakingEvent::ProfileChanged(profile.clone()));
        assert_eq!(rx.recv().await.unwrap().event, ChangeKind::Insert);

        profile.updated_at = Timestamp::new(6);
        publish_event(&ws, &StakingEvent::ProfileChanged(profile));
        assert_eq!(rx.recv().await.unwrap().event, ChangeKind::Update);
    }

    #[tokio::test]
    async fn cancelled_registrations_are_deletes() {
        let ws = WsState::new(8);
        let mut rx = ws.sender_for(Table::EventRegistrations).subscribe();
        let registration = EventRegistration {
            event_id: NewsId::new(3),
            account: AccountId::new("carol").unwrap(),
            registered_at: Timestamp::new(40),
        };

        publish_event(&ws, &StakingEvent::RegistrationDeleted(registration));
        let change = rx.recv().await.unwrap();
        assert_eq!(change.event, ChangeKind::Delete);
        assert_eq!(change.row["event_id"], 3);
        assert_eq!(change.account.as_ref().map(AccountId::as_str), Some("carol"));
    }

    #[tokio::test]
    async fn stats_rows_have_no_owner() {
        let ws = WsState::new(8);
        let mut rx = ws.sender_for(Table::NetworkStats).subscribe();
        let stats = NetworkStats {
            total_supply: CanAmount::from_can(1_000),
            circulating_supply: CanAmount::from_can(10),
            total_value_locked: CanAmount::ZERO,
            total_holders: 1,
            total_transactions: 1,
            current_phase: Some(1),
            updated_at: Timestamp::new(77),
        };

        publish_event(&ws, &StakingEvent::StatsChanged(stats));
        let change = rx.recv().await.unwrap();
        assert_eq!(change.table, Table::NetworkStats);
        assert_eq!(change.account, None);
        assert_eq!(change.timestamp, Timestamp::new(77));
        assert_eq!(change.row["circulating_supply"], "10");
    }
}
