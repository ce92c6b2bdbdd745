use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::ActionType;

/// How callers address a user: by wallet address (the primary key once a
/// wallet is linked) or by internal id (for accounts created from a social
/// identity before any wallet exists).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRef {
    Wallet(String),
    Id(String),
}

impl UserRef {
    pub fn wallet(address: impl Into<String>) -> Self {
        Self::Wallet(address.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wallet(address) => write!(f, "wallet:{address}"),
            Self::Id(id) => write!(f, "id:{id}"),
        }
    }
}

/// Referral bonus multiplier granted to a referrer, consumed one use per
/// successful referral and removed when `remaining_uses` reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralBoost {
    pub boost_id: String,
    /// Fractional multiplier applied to the base referral bonus (0.5 = +50%).
    pub value: Decimal,
    pub remaining_uses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ReferralBoost {
    pub fn new(value: Decimal, remaining_uses: u32, description: Option<String>) -> Self {
        Self {
            boost_id: Uuid::new_v4().to_string(),
            value,
            remaining_uses,
            description,
        }
    }
}

/// A platform user as held in the ledger store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub wallet_address: Option<String>,
    pub x_user_id: Option<String>,
    pub points: i64,
    pub referral_code: Option<String>,
    /// Internal id of the referrer; write-once.
    pub referred_by: Option<String>,
    pub referrals_made: u32,
    pub active_referral_boosts: Vec<ReferralBoost>,
    /// One-time actions already credited (set membership, not multiplicity).
    pub completed_actions: BTreeSet<ActionType>,
    /// Last successful award per cooldown-gated action.
    pub last_action_at: HashMap<ActionType, DateTime<Utc>>,
    pub squad_id: Option<String>,
    pub initial_airdrop_amount: Decimal,
    /// Share of the community airdrop pool implied by current points.
    pub points_share: Decimal,
    pub total_estimated_airdrop: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Fresh zero-point user, as created on first touch.
    pub fn new(wallet_address: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            wallet_address,
            x_user_id: None,
            points: 0,
            referral_code: None,
            referred_by: None,
            referrals_made: 0,
            active_referral_boosts: Vec::new(),
            completed_actions: BTreeSet::new(),
            last_action_at: HashMap::new(),
            squad_id: None,
            initial_airdrop_amount: Decimal::ZERO,
            points_share: Decimal::ZERO,
            total_estimated_airdrop: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Best identifier for audit records and event payloads: wallet address
    /// when linked, then social id, then internal id.
    pub fn ledger_identifier(&self) -> &str {
        self.wallet_address
            .as_deref()
            .or(self.x_user_id.as_deref())
            .unwrap_or(&self.id)
    }

    /// Canonical store reference for this user.
    pub fn user_ref(&self) -> UserRef {
        match &self.wallet_address {
            Some(address) => UserRef::Wallet(address.clone()),
            None => UserRef::Id(self.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_user_starts_empty() {
        let user = User::new(Some("wallet-1".into()));
        assert_eq!(user.points, 0);
        assert!(user.completed_actions.is_empty());
        assert!(user.referral_code.is_none());
        assert_eq!(user.points_share, Decimal::ZERO);
    }

    #[test]
    fn ledger_identifier_prefers_wallet_then_social_then_id() {
        let mut user = User::new(Some("wallet-1".into()));
        user.x_user_id = Some("x-99".into());
        assert_eq!(user.ledger_identifier(), "wallet-1");

        user.wallet_address = None;
        assert_eq!(user.ledger_identifier(), "x-99");

        user.x_user_id = None;
        assert_eq!(user.ledger_identifier(), user.id);
    }

    #[test]
    fn user_ref_falls_back_to_internal_id() {
        let user = User::new(None);
        assert_eq!(user.user_ref(), UserRef::Id(user.id.clone()));
    }

    #[test]
    fn boost_serializes_multiplier_exactly() {
        let boost = ReferralBoost::new(dec!(0.5), 2, None);
        let json = serde_json::to_value(&boost).unwrap();
        assert_eq!(json["value"], serde_json::json!("0.5"));
        assert_eq!(json["remaining_uses"], serde_json::json!(2));
    }
}
