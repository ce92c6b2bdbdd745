#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use air_rewards::domain::{
    AirdropService, PointsEngine, ReferralService, SocialActionService, SquadService,
};
use air_rewards::events::{EventPublisher, PublishError, Topic};
use air_rewards::models::{
    ActionRecord, InvitationStatus, Squad, SquadInvitation, User, UserRef,
};
use air_rewards::notify::{Notification, NotificationKind, NotificationSink, NotifyError};
use air_rewards::store::{
    AddMemberOutcome, LedgerStore, MemoryStore, PointsChange, Result as StoreResult, SquadUpdate,
    StoreError, UserUpdate,
};
use air_rewards::RewardsConfig;

/// Publisher double that records every event for assertions.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(Topic, Value)>>,
}

impl RecordingPublisher {
    pub fn topics(&self) -> Vec<Topic> {
        self.events.lock().iter().map(|(topic, _)| *topic).collect()
    }

    pub fn payloads_for(&self, topic: Topic) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn count(&self, topic: Topic) -> usize {
        self.payloads_for(topic).len()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: Topic, payload: Value) -> Result<(), PublishError> {
        self.events.lock().push((topic, payload));
        Ok(())
    }
}

/// Publisher double that always fails, for best-effort semantics tests.
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _topic: Topic, _payload: Value) -> Result<(), PublishError> {
        Err(PublishError::Unavailable("broker down".to_string()))
    }
}

/// Notification sink double that records everything delivered.
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn for_recipient(&self, wallet: &str) -> Vec<Notification> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.recipient_wallet_address == wallet)
            .cloned()
            .collect()
    }

    pub fn kinds_for(&self, wallet: &str) -> Vec<NotificationKind> {
        self.for_recipient(wallet).iter().map(|n| n.kind).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.notifications.lock().push(notification);
        Ok(())
    }
}

/// Store wrapper that can be told to fail specific operations, for testing
/// the engine's partial-failure ordering.
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_insert_action: AtomicBool,
    pub fail_increment_squad_points: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_insert_action: AtomicBool::new(false),
            fail_increment_squad_points: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn operation_failed(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn find_user(&self, user: &UserRef) -> StoreResult<Option<User>> {
        self.inner.find_user(user).await
    }

    async fn find_user_by_referral_code(&self, code: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_referral_code(code).await
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }

    async fn update_user(&self, user: &UserRef, update: UserUpdate) -> StoreResult<bool> {
        self.inner.update_user(user, update).await
    }

    async fn increment_user_points(
        &self,
        user: &UserRef,
        delta: i64,
        floor: Option<i64>,
    ) -> StoreResult<Option<PointsChange>> {
        self.inner.increment_user_points(user, delta, floor).await
    }

    async fn set_referral_code(&self, user: &UserRef, code: &str) -> StoreResult<bool> {
        self.inner.set_referral_code(user, code).await
    }

    async fn set_referred_by(&self, user: &UserRef, referrer_id: &str) -> StoreResult<bool> {
        self.inner.set_referred_by(user, referrer_id).await
    }

    async fn aggregate_total_points(&self) -> StoreResult<i64> {
        self.inner.aggregate_total_points().await
    }

    async fn insert_action(&self, record: &ActionRecord) -> StoreResult<()> {
        if Self::operation_failed(&self.fail_insert_action) {
            return Err(StoreError::OperationFailed(
                "injected action-log failure".to_string(),
            ));
        }
        self.inner.insert_action(record).await
    }

    async fn find_squad(&self, squad_id: &str) -> StoreResult<Option<Squad>> {
        self.inner.find_squad(squad_id).await
    }

    async fn find_squad_by_name(&self, name: &str) -> StoreResult<Option<Squad>> {
        self.inner.find_squad_by_name(name).await
    }

    async fn insert_squad(&self, squad: &Squad) -> StoreResult<()> {
        self.inner.insert_squad(squad).await
    }

    async fn update_squad(&self, squad_id: &str, update: SquadUpdate) -> StoreResult<bool> {
        self.inner.update_squad(squad_id, update).await
    }

    async fn increment_squad_points(&self, squad_id: &str, delta: i64) -> StoreResult<bool> {
        if Self::operation_failed(&self.fail_increment_squad_points) {
            return Err(StoreError::OperationFailed(
                "injected squad-increment failure".to_string(),
            ));
        }
        self.inner.increment_squad_points(squad_id, delta).await
    }

    async fn add_squad_member(
        &self,
        squad_id: &str,
        wallet: &str,
    ) -> StoreResult<AddMemberOutcome> {
        self.inner.add_squad_member(squad_id, wallet).await
    }

    async fn remove_squad_member(&self, squad_id: &str, wallet: &str) -> StoreResult<bool> {
        self.inner.remove_squad_member(squad_id, wallet).await
    }

    async fn delete_squad(&self, squad_id: &str) -> StoreResult<bool> {
        self.inner.delete_squad(squad_id).await
    }

    async fn find_invitation(
        &self,
        invitation_id: &str,
    ) -> StoreResult<Option<SquadInvitation>> {
        self.inner.find_invitation(invitation_id).await
    }

    async fn find_pending_invitation(
        &self,
        squad_id: &str,
        invitee_wallet: &str,
    ) -> StoreResult<Option<SquadInvitation>> {
        self.inner
            .find_pending_invitation(squad_id, invitee_wallet)
            .await
    }

    async fn insert_invitation(&self, invitation: &SquadInvitation) -> StoreResult<()> {
        self.inner.insert_invitation(invitation).await
    }

    async fn update_invitation_status(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> StoreResult<bool> {
        self.inner.update_invitation_status(invitation_id, status).await
    }
}

/// Wires the full pipeline over an in-memory store with recording doubles.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: Arc<RewardsConfig>,
    pub engine: PointsEngine,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(RewardsConfig::default())
    }

    pub fn with_config(config: RewardsConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = Arc::new(config);
        let engine = PointsEngine::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
            Arc::clone(&config),
        );
        Self {
            store,
            publisher,
            notifier,
            config,
            engine,
        }
    }

    pub fn squads(&self) -> SquadService {
        SquadService::new(
            Arc::clone(&self.store) as Arc<dyn LedgerStore>,
            Arc::clone(&self.publisher) as Arc<dyn EventPublisher>,
            Arc::clone(&self.notifier) as Arc<dyn NotificationSink>,
            Arc::clone(&self.config),
        )
    }

    pub fn referrals(&self) -> ReferralService {
        ReferralService::new(self.engine.clone())
    }

    pub fn social(&self) -> SocialActionService {
        SocialActionService::new(self.engine.clone())
    }

    pub fn airdrop(&self) -> AirdropService {
        AirdropService::new(self.engine.clone())
    }

    /// Inserts a user with the given wallet and points balance.
    pub async fn seed_user(&self, wallet: &str, points: i64) -> User {
        let mut user = User::new(Some(wallet.to_string()));
        user.points = points;
        self.store
            .insert_user(&user)
            .await
            .expect("seed user insert");
        user
    }

    pub async fn fetch_user(&self, wallet: &str) -> User {
        self.store
            .find_user(&UserRef::wallet(wallet))
            .await
            .expect("fetch user")
            .expect("user should exist")
    }

    pub async fn fetch_squad(&self, squad_id: &str) -> Squad {
        self.store
            .find_squad(squad_id)
            .await
            .expect("fetch squad")
            .expect("squad should exist")
    }
}
