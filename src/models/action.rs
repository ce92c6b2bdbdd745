use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Point-affecting action types known to the award pipeline.
///
/// The wire form (`as_str`) is the snake_case string stored in action
/// records, `completed_actions` sets and event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    InitialConnection,
    FollowedOnX,
    JoinedTelegram,
    SharedOnX,
    ReferralBonus,
    ReferralPowerupBonus,
    NftMint,
    AirdropTierBronze,
    AirdropTierSilver,
    AirdropTierGold,
    AirdropTierDiamond,
    AirdropTierMaster,
    AirdropTierGrandmaster,
    AirdropTierLegend,
    AdminAdjustment,
}

impl ActionType {
    /// String representation stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialConnection => "initial_connection",
            Self::FollowedOnX => "followed_on_x",
            Self::JoinedTelegram => "joined_telegram",
            Self::SharedOnX => "shared_on_x",
            Self::ReferralBonus => "referral_bonus",
            Self::ReferralPowerupBonus => "referral_powerup_bonus",
            Self::NftMint => "nft_mint",
            Self::AirdropTierBronze => "airdrop_tier_bronze",
            Self::AirdropTierSilver => "airdrop_tier_silver",
            Self::AirdropTierGold => "airdrop_tier_gold",
            Self::AirdropTierDiamond => "airdrop_tier_diamond",
            Self::AirdropTierMaster => "airdrop_tier_master",
            Self::AirdropTierGrandmaster => "airdrop_tier_grandmaster",
            Self::AirdropTierLegend => "airdrop_tier_legend",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reverse of `as_str`, used when decoding stored action strings.
static ACTION_TYPE_BY_NAME: Lazy<HashMap<&'static str, ActionType>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for action in [
        ActionType::InitialConnection,
        ActionType::FollowedOnX,
        ActionType::JoinedTelegram,
        ActionType::SharedOnX,
        ActionType::ReferralBonus,
        ActionType::ReferralPowerupBonus,
        ActionType::NftMint,
        ActionType::AirdropTierBronze,
        ActionType::AirdropTierSilver,
        ActionType::AirdropTierGold,
        ActionType::AirdropTierDiamond,
        ActionType::AirdropTierMaster,
        ActionType::AirdropTierGrandmaster,
        ActionType::AirdropTierLegend,
        ActionType::AdminAdjustment,
    ] {
        m.insert(action.as_str(), action);
    }
    m
});

impl FromStr for ActionType {
    type Err = UnknownActionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTION_TYPE_BY_NAME
            .get(s)
            .copied()
            .ok_or_else(|| UnknownActionType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActionType(pub String);

impl fmt::Display for UnknownActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action type: {}", self.0)
    }
}

impl std::error::Error for UnknownActionType {}

/// One immutable entry in the append-only action log.
///
/// `action` holds the action-type string when the award carried one,
/// otherwise the free-form award reason (legacy audit convention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Wallet address when known, otherwise the user's internal id.
    pub wallet_address: String,
    pub action: String,
    pub points_awarded: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
