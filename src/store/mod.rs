pub mod errors;
pub mod memory;

pub use errors::{Result, StoreError};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{
    ActionRecord, ActionType, InvitationStatus, ReferralBoost, Squad, SquadInvitation, User,
    UserRef,
};

/// Before/after balances returned by an atomic point increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsChange {
    pub previous: i64,
    pub current: i64,
}

impl PointsChange {
    /// The delta actually applied, after any floor clamping.
    pub fn applied_delta(&self) -> i64 {
        self.current - self.previous
    }
}

/// Typed partial update for a user record. `None` fields are left untouched;
/// the backend applies the whole update against one document atomically.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub points_share: Option<Decimal>,
    pub total_estimated_airdrop: Option<Decimal>,
    pub initial_airdrop_amount: Option<Decimal>,
    /// Set-semantics add to `completed_actions` (no duplicates).
    pub add_completed_action: Option<ActionType>,
    /// Stamp the last successful award time for a cooldown-gated action.
    pub last_action_at: Option<(ActionType, DateTime<Utc>)>,
    /// Full replacement of the active boost list.
    pub referral_boosts: Option<Vec<ReferralBoost>>,
    pub increment_referrals_made: bool,
    /// `Some(None)` clears the squad link, `Some(Some(id))` sets it.
    pub squad_id: Option<Option<String>>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.points_share.is_none()
            && self.total_estimated_airdrop.is_none()
            && self.initial_airdrop_amount.is_none()
            && self.add_completed_action.is_none()
            && self.last_action_at.is_none()
            && self.referral_boosts.is_none()
            && !self.increment_referrals_made
            && self.squad_id.is_none()
    }
}

/// Typed partial update for a squad record.
#[derive(Debug, Clone, Default)]
pub struct SquadUpdate {
    pub leader_wallet_address: Option<String>,
    pub tier: Option<u8>,
    pub max_members: Option<u32>,
}

/// Outcome of a capacity-guarded member add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMemberOutcome {
    Added,
    AlreadyMember,
    SquadFull,
    SquadNotFound,
}

/// Document-store collaborator holding user, action-log, squad and
/// invitation records.
///
/// Contract notes binding every backend:
/// - Absence is expressed in return position (`Option`, `bool`, outcome
///   enums), never as a `StoreError`.
/// - `increment_*` operations and `add_squad_member` are atomic at the
///   document level, so concurrent awards and joins commute without
///   engine-side locking.
/// - Write-once setters (`set_referral_code`, `set_referred_by`) return
///   `false` without modifying anything when the field is already set.
/// - Implementations own their I/O timeouts; a timed-out call surfaces as
///   `StoreError::Timeout`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_user(&self, user: &UserRef) -> Result<Option<User>>;

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>>;

    /// Inserts a new user. Duplicate wallet addresses or referral codes are
    /// integrity errors.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Applies a typed partial update. Returns `false` when the user does
    /// not exist.
    async fn update_user(&self, user: &UserRef, update: UserUpdate) -> Result<bool>;

    /// Atomically adds `delta` to the user's points, clamping the result at
    /// `floor` when one is given. Returns `None` when the user does not
    /// exist.
    async fn increment_user_points(
        &self,
        user: &UserRef,
        delta: i64,
        floor: Option<i64>,
    ) -> Result<Option<PointsChange>>;

    /// Write-once referral code assignment; also enforces code uniqueness.
    async fn set_referral_code(&self, user: &UserRef, code: &str) -> Result<bool>;

    /// Write-once referrer back-reference.
    async fn set_referred_by(&self, user: &UserRef, referrer_id: &str) -> Result<bool>;

    /// Community-wide sum of user points.
    async fn aggregate_total_points(&self) -> Result<i64>;

    /// Appends one immutable entry to the action log.
    async fn insert_action(&self, record: &ActionRecord) -> Result<()>;

    async fn find_squad(&self, squad_id: &str) -> Result<Option<Squad>>;

    /// Case-insensitive lookup by squad name, for duplicate-name rejection.
    async fn find_squad_by_name(&self, name: &str) -> Result<Option<Squad>>;

    async fn insert_squad(&self, squad: &Squad) -> Result<()>;

    async fn update_squad(&self, squad_id: &str, update: SquadUpdate) -> Result<bool>;

    /// Atomically adds `delta` to the squad's aggregate total. Returns
    /// `false` when the squad does not exist.
    async fn increment_squad_points(&self, squad_id: &str, delta: i64) -> Result<bool>;

    /// Adds a member if and only if the squad is below its member cap.
    async fn add_squad_member(&self, squad_id: &str, wallet: &str) -> Result<AddMemberOutcome>;

    /// Removes a member. Returns `false` when the squad or membership was
    /// absent.
    async fn remove_squad_member(&self, squad_id: &str, wallet: &str) -> Result<bool>;

    async fn delete_squad(&self, squad_id: &str) -> Result<bool>;

    async fn find_invitation(&self, invitation_id: &str) -> Result<Option<SquadInvitation>>;

    /// Pending invitation for a (squad, invitee) pair, if one exists.
    async fn find_pending_invitation(
        &self,
        squad_id: &str,
        invitee_wallet: &str,
    ) -> Result<Option<SquadInvitation>>;

    async fn insert_invitation(&self, invitation: &SquadInvitation) -> Result<()>;

    async fn update_invitation_status(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> Result<bool>;
}
