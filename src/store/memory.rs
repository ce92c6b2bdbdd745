use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::errors::{Result, StoreError};
use super::{AddMemberOutcome, LedgerStore, PointsChange, SquadUpdate, UserUpdate};
use crate::models::{
    ActionRecord, InvitationStatus, Squad, SquadInvitation, User, UserRef,
};

/// In-memory ledger store used by tests and local development.
///
/// Sharded maps give the same consistency boundary a document store does:
/// each record is mutated under its own entry lock, so the atomic-increment
/// and add-to-set contracts of [`LedgerStore`] hold under concurrency.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    wallet_index: DashMap<String, String>,
    referral_code_index: DashMap<String, String>,
    squads: DashMap<String, Squad>,
    invitations: DashMap<String, SquadInvitation>,
    actions: Mutex<Vec<ActionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_id(&self, user: &UserRef) -> Option<String> {
        match user {
            UserRef::Id(id) => self.users.contains_key(id).then(|| id.clone()),
            UserRef::Wallet(wallet) => {
                self.wallet_index.get(wallet).map(|entry| entry.value().clone())
            }
        }
    }

    /// Snapshot of every logged action, oldest first.
    pub fn all_actions(&self) -> Vec<ActionRecord> {
        self.actions.lock().clone()
    }

    /// Logged actions for one ledger identifier, oldest first.
    pub fn actions_for(&self, identifier: &str) -> Vec<ActionRecord> {
        self.actions
            .lock()
            .iter()
            .filter(|record| record.wallet_address == identifier)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_user(&self, user: &UserRef) -> Result<Option<User>> {
        let id = match self.resolve_id(user) {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>> {
        let id = match self.referral_code_index.get(code) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        if let Some(wallet) = &user.wallet_address {
            match self.wallet_index.entry(wallet.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::IntegrityError(format!(
                        "wallet address already registered: {wallet}"
                    )));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(user.id.clone());
                }
            }
        }
        if let Some(code) = &user.referral_code {
            match self.referral_code_index.entry(code.clone()) {
                Entry::Occupied(_) => {
                    if let Some(wallet) = &user.wallet_address {
                        self.wallet_index.remove(wallet);
                    }
                    return Err(StoreError::IntegrityError(format!(
                        "referral code already taken: {code}"
                    )));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(user.id.clone());
                }
            }
        }
        debug!(user_id = %user.id, "inserting user");
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &UserRef, update: UserUpdate) -> Result<bool> {
        let id = match self.resolve_id(user) {
            Some(id) => id,
            None => return Ok(false),
        };
        let mut entry = match self.users.get_mut(&id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        if let Some(share) = update.points_share {
            entry.points_share = share;
        }
        if let Some(total) = update.total_estimated_airdrop {
            entry.total_estimated_airdrop = total;
        }
        if let Some(initial) = update.initial_airdrop_amount {
            entry.initial_airdrop_amount = initial;
        }
        if let Some(action) = update.add_completed_action {
            entry.completed_actions.insert(action);
        }
        if let Some((action, at)) = update.last_action_at {
            entry.last_action_at.insert(action, at);
        }
        if let Some(boosts) = update.referral_boosts {
            entry.active_referral_boosts = boosts;
        }
        if update.increment_referrals_made {
            entry.referrals_made += 1;
        }
        if let Some(squad_id) = update.squad_id {
            entry.squad_id = squad_id;
        }
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn increment_user_points(
        &self,
        user: &UserRef,
        delta: i64,
        floor: Option<i64>,
    ) -> Result<Option<PointsChange>> {
        let id = match self.resolve_id(user) {
            Some(id) => id,
            None => return Ok(None),
        };
        let mut entry = match self.users.get_mut(&id) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let previous = entry.points;
        let mut current = previous.saturating_add(delta);
        if let Some(floor) = floor {
            if current < floor {
                current = floor;
            }
        }
        entry.points = current;
        entry.updated_at = Utc::now();
        Ok(Some(PointsChange { previous, current }))
    }

    async fn set_referral_code(&self, user: &UserRef, code: &str) -> Result<bool> {
        let id = match self.resolve_id(user) {
            Some(id) => id,
            None => return Ok(false),
        };
        let mut entry = match self.users.get_mut(&id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        if entry.referral_code.is_some() {
            return Ok(false);
        }
        match self.referral_code_index.entry(code.to_string()) {
            Entry::Occupied(_) => {
                return Err(StoreError::IntegrityError(format!(
                    "referral code already taken: {code}"
                )));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(id.clone());
            }
        }
        entry.referral_code = Some(code.to_string());
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_referred_by(&self, user: &UserRef, referrer_id: &str) -> Result<bool> {
        let id = match self.resolve_id(user) {
            Some(id) => id,
            None => return Ok(false),
        };
        let mut entry = match self.users.get_mut(&id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        if entry.referred_by.is_some() {
            return Ok(false);
        }
        entry.referred_by = Some(referrer_id.to_string());
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn aggregate_total_points(&self) -> Result<i64> {
        Ok(self.users.iter().map(|entry| entry.points).sum())
    }

    async fn insert_action(&self, record: &ActionRecord) -> Result<()> {
        debug!(
            identifier = %record.wallet_address,
            action = %record.action,
            points = record.points_awarded,
            "appending action record"
        );
        self.actions.lock().push(record.clone());
        Ok(())
    }

    async fn find_squad(&self, squad_id: &str) -> Result<Option<Squad>> {
        Ok(self.squads.get(squad_id).map(|entry| entry.value().clone()))
    }

    async fn find_squad_by_name(&self, name: &str) -> Result<Option<Squad>> {
        Ok(self
            .squads
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|entry| entry.value().clone()))
    }

    async fn insert_squad(&self, squad: &Squad) -> Result<()> {
        debug!(squad_id = %squad.squad_id, name = %squad.name, "inserting squad");
        self.squads.insert(squad.squad_id.clone(), squad.clone());
        Ok(())
    }

    async fn update_squad(&self, squad_id: &str, update: SquadUpdate) -> Result<bool> {
        let mut entry = match self.squads.get_mut(squad_id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        if let Some(leader) = update.leader_wallet_address {
            entry.leader_wallet_address = leader;
        }
        if let Some(tier) = update.tier {
            entry.tier = tier;
        }
        if let Some(max_members) = update.max_members {
            entry.max_members = max_members;
        }
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn increment_squad_points(&self, squad_id: &str, delta: i64) -> Result<bool> {
        let mut entry = match self.squads.get_mut(squad_id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        entry.total_squad_points = entry.total_squad_points.saturating_add(delta);
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn add_squad_member(&self, squad_id: &str, wallet: &str) -> Result<AddMemberOutcome> {
        let mut entry = match self.squads.get_mut(squad_id) {
            Some(entry) => entry,
            None => return Ok(AddMemberOutcome::SquadNotFound),
        };
        if entry.is_member(wallet) {
            return Ok(AddMemberOutcome::AlreadyMember);
        }
        if entry.is_full() {
            return Ok(AddMemberOutcome::SquadFull);
        }
        entry.member_wallet_addresses.push(wallet.to_string());
        entry.updated_at = Utc::now();
        Ok(AddMemberOutcome::Added)
    }

    async fn remove_squad_member(&self, squad_id: &str, wallet: &str) -> Result<bool> {
        let mut entry = match self.squads.get_mut(squad_id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        let before = entry.member_wallet_addresses.len();
        entry.member_wallet_addresses.retain(|member| member != wallet);
        let removed = entry.member_wallet_addresses.len() < before;
        if removed {
            entry.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn delete_squad(&self, squad_id: &str) -> Result<bool> {
        Ok(self.squads.remove(squad_id).is_some())
    }

    async fn find_invitation(&self, invitation_id: &str) -> Result<Option<SquadInvitation>> {
        Ok(self
            .invitations
            .get(invitation_id)
            .map(|entry| entry.value().clone()))
    }

    async fn find_pending_invitation(
        &self,
        squad_id: &str,
        invitee_wallet: &str,
    ) -> Result<Option<SquadInvitation>> {
        Ok(self
            .invitations
            .iter()
            .find(|entry| {
                entry.squad_id == squad_id
                    && entry.invitee_wallet_address == invitee_wallet
                    && entry.status == InvitationStatus::Pending
            })
            .map(|entry| entry.value().clone()))
    }

    async fn insert_invitation(&self, invitation: &SquadInvitation) -> Result<()> {
        self.invitations
            .insert(invitation.invitation_id.clone(), invitation.clone());
        Ok(())
    }

    async fn update_invitation_status(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> Result<bool> {
        let mut entry = match self.invitations.get_mut(invitation_id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn seeded_user(wallet: &str, points: i64) -> User {
        let mut user = User::new(Some(wallet.to_string()));
        user.points = points;
        user
    }

    #[tokio::test]
    async fn increment_clamps_at_floor() {
        let store = MemoryStore::new();
        store.insert_user(&seeded_user("w1", 30)).await.unwrap();

        let change = store
            .increment_user_points(&UserRef::wallet("w1"), -50, Some(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.previous, 30);
        assert_eq!(change.current, 0);
        assert_eq!(change.applied_delta(), -30);

        // No floor: the balance may go negative
        let change = store
            .increment_user_points(&UserRef::wallet("w1"), -10, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.current, -10);
    }

    #[tokio::test]
    async fn increment_for_unknown_user_is_none() {
        let store = MemoryStore::new();
        let change = store
            .increment_user_points(&UserRef::wallet("nobody"), 5, Some(0))
            .await
            .unwrap();
        assert!(change.is_none());
    }

    #[tokio::test]
    async fn concurrent_increments_commute() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(&seeded_user("w1", 0)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .increment_user_points(&UserRef::wallet("w1"), 1, Some(0))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let user = store
            .find_user(&UserRef::wallet("w1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.points, 100);
    }

    #[tokio::test]
    async fn duplicate_wallet_is_an_integrity_error() {
        let store = MemoryStore::new();
        store.insert_user(&seeded_user("w1", 0)).await.unwrap();
        let err = store.insert_user(&seeded_user("w1", 0)).await.unwrap_err();
        assert!(err.is_integrity_error());
    }

    #[tokio::test]
    async fn referral_code_is_write_once_and_unique() {
        let store = MemoryStore::new();
        store.insert_user(&seeded_user("w1", 0)).await.unwrap();
        store.insert_user(&seeded_user("w2", 0)).await.unwrap();

        assert!(store
            .set_referral_code(&UserRef::wallet("w1"), "abcd1234")
            .await
            .unwrap());
        // Already set: no-op
        assert!(!store
            .set_referral_code(&UserRef::wallet("w1"), "ffff0000")
            .await
            .unwrap());
        // Same code for another user: integrity error
        let err = store
            .set_referral_code(&UserRef::wallet("w2"), "abcd1234")
            .await
            .unwrap_err();
        assert!(err.is_integrity_error());

        let found = store
            .find_user_by_referral_code("abcd1234")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.wallet_address.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn member_add_is_capacity_guarded() {
        let store = MemoryStore::new();
        let squad = Squad::new("alpha".into(), None, "w1".into(), 0, 1, 2);
        store.insert_squad(&squad).await.unwrap();

        assert_eq!(
            store.add_squad_member(&squad.squad_id, "w2").await.unwrap(),
            AddMemberOutcome::Added
        );
        assert_eq!(
            store.add_squad_member(&squad.squad_id, "w2").await.unwrap(),
            AddMemberOutcome::AlreadyMember
        );
        assert_eq!(
            store.add_squad_member(&squad.squad_id, "w3").await.unwrap(),
            AddMemberOutcome::SquadFull
        );
        assert_eq!(
            store.add_squad_member("missing", "w3").await.unwrap(),
            AddMemberOutcome::SquadNotFound
        );
    }

    #[tokio::test]
    async fn completed_actions_update_has_set_semantics() {
        use crate::models::ActionType;

        let store = MemoryStore::new();
        store.insert_user(&seeded_user("w1", 0)).await.unwrap();

        for _ in 0..2 {
            store
                .update_user(
                    &UserRef::wallet("w1"),
                    UserUpdate {
                        add_completed_action: Some(ActionType::FollowedOnX),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let user = store
            .find_user(&UserRef::wallet("w1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.completed_actions.len(), 1);
    }
}
