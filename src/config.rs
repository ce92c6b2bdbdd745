use std::collections::{BTreeSet, HashMap};
use std::time::Duration as StdDuration;

use chrono::Duration;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::ActionType;

/// Squad tier threshold: squads at or above `min_points` are at least
/// `tier`, with the given member cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquadTierRule {
    pub min_points: i64,
    pub tier: u8,
    pub max_members: u32,
}

/// One rung of the airdrop bracket ladder: token allocations at or above
/// `min_amount` credit `points` via the one-time `action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirdropTierRule {
    pub min_amount: i64,
    pub points: i64,
    pub action: ActionType,
}

/// A mintable asset tier and its point cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTier {
    pub tier: u8,
    pub points_cost: i64,
    pub name: String,
}

/// Default point values per action type.
static DEFAULT_ACTION_POINTS: Lazy<HashMap<ActionType, i64>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(ActionType::InitialConnection, 100);
    m.insert(ActionType::FollowedOnX, 50);
    m.insert(ActionType::JoinedTelegram, 50);
    m.insert(ActionType::SharedOnX, 20);
    m.insert(ActionType::ReferralBonus, 20);
    m
});

/// Every tunable consumed by the award engine, estimator, idempotency guard
/// and the membership/referral call sites, consolidated in one place.
#[derive(Debug, Clone)]
pub struct RewardsConfig {
    /// Community airdrop pool the points-share estimate is scaled against.
    pub airdrop_pool_size: Decimal,
    /// Ascending squad tier thresholds.
    pub squad_tiers: Vec<SquadTierRule>,
    /// Descending airdrop bracket ladder (highest threshold first).
    pub airdrop_tiers: Vec<AirdropTierRule>,
    /// Points granted per awardable action.
    pub action_points: HashMap<ActionType, i64>,
    /// Actions creditable at most once per user.
    pub one_time_actions: BTreeSet<ActionType>,
    /// Minimum interval between successive awards of repeatable actions.
    pub cooldowns: HashMap<ActionType, Duration>,
    pub referral_base_bonus: i64,
    pub referral_code_length: usize,
    pub referral_code_max_attempts: u32,
    pub squad_name_min_len: usize,
    pub squad_name_max_len: usize,
    /// Lowercased substrings rejected in squad names and descriptions.
    pub banned_squad_words: Vec<String>,
    /// Mintable asset tiers, looked up by tier number.
    pub asset_tiers: Vec<AssetTier>,
    /// Upper bound on a single event publish attempt.
    pub publish_timeout: StdDuration,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        let mut one_time: BTreeSet<ActionType> = [
            ActionType::InitialConnection,
            ActionType::FollowedOnX,
            ActionType::JoinedTelegram,
        ]
        .into();
        let mut cooldowns = HashMap::new();
        cooldowns.insert(ActionType::SharedOnX, Duration::hours(24));

        let airdrop_tiers = vec![
            AirdropTierRule {
                min_amount: 1_000_000_000,
                points: 10_000,
                action: ActionType::AirdropTierLegend,
            },
            AirdropTierRule {
                min_amount: 500_000_000,
                points: 5_000,
                action: ActionType::AirdropTierGrandmaster,
            },
            AirdropTierRule {
                min_amount: 100_000_000,
                points: 1_000,
                action: ActionType::AirdropTierMaster,
            },
            AirdropTierRule {
                min_amount: 10_000_000,
                points: 500,
                action: ActionType::AirdropTierDiamond,
            },
            AirdropTierRule {
                min_amount: 1_000_000,
                points: 300,
                action: ActionType::AirdropTierGold,
            },
            AirdropTierRule {
                min_amount: 100_000,
                points: 150,
                action: ActionType::AirdropTierSilver,
            },
            AirdropTierRule {
                min_amount: 10_000,
                points: 50,
                action: ActionType::AirdropTierBronze,
            },
        ];
        for rule in &airdrop_tiers {
            one_time.insert(rule.action);
        }

        Self {
            airdrop_pool_size: dec!(1_000_000_000),
            squad_tiers: vec![
                SquadTierRule {
                    min_points: 1_000,
                    tier: 1,
                    max_members: 10,
                },
                SquadTierRule {
                    min_points: 5_000,
                    tier: 2,
                    max_members: 50,
                },
                SquadTierRule {
                    min_points: 10_000,
                    tier: 3,
                    max_members: 100,
                },
            ],
            airdrop_tiers,
            action_points: DEFAULT_ACTION_POINTS.clone(),
            one_time_actions: one_time,
            cooldowns,
            referral_base_bonus: 20,
            referral_code_length: 8,
            referral_code_max_attempts: 10,
            squad_name_min_len: 3,
            squad_name_max_len: 30,
            banned_squad_words: Vec::new(),
            asset_tiers: vec![
                AssetTier {
                    tier: 1,
                    points_cost: 1_000,
                    name: "Bronze AIR NFT".to_string(),
                },
                AssetTier {
                    tier: 2,
                    points_cost: 5_000,
                    name: "Silver AIR NFT".to_string(),
                },
                AssetTier {
                    tier: 3,
                    points_cost: 10_000,
                    name: "Gold AIR NFT".to_string(),
                },
            ],
            publish_timeout: StdDuration::from_secs(5),
        }
    }
}

impl RewardsConfig {
    /// Load configuration from environment variables, falling back to the
    /// platform defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.airdrop_pool_size = std::env::var("AIRDROP_POINTS_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
            .unwrap_or(config.airdrop_pool_size);

        for rule in config.squad_tiers.iter_mut() {
            rule.min_points = std::env::var(format!("TIER_{}_POINTS", rule.tier))
                .unwrap_or_default()
                .parse::<i64>()
                .unwrap_or(rule.min_points);
            rule.max_members = std::env::var(format!("TIER_{}_MAX_MEMBERS", rule.tier))
                .unwrap_or_default()
                .parse::<u32>()
                .unwrap_or(rule.max_members);
        }

        config.referral_base_bonus = std::env::var("POINTS_REFERRAL_BONUS_FOR_REFERRER")
            .unwrap_or_default()
            .parse::<i64>()
            .unwrap_or(config.referral_base_bonus);

        if let Some(initial) = std::env::var("POINTS_INITIAL_CONNECTION")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            config
                .action_points
                .insert(ActionType::InitialConnection, initial);
        }

        if let Some(hours) = std::env::var("SHARE_ON_X_COOLDOWN_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            config
                .cooldowns
                .insert(ActionType::SharedOnX, Duration::hours(hours));
        }

        if let Ok(words) = std::env::var("SQUAD_NAME_BANNED_WORDS") {
            config.banned_squad_words = words
                .split(',')
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect();
        }

        config
    }

    /// Points granted for `action`, if it is awardable at all.
    pub fn points_for(&self, action: ActionType) -> Option<i64> {
        self.action_points.get(&action).copied()
    }

    pub fn initial_connection_bonus(&self) -> i64 {
        self.points_for(ActionType::InitialConnection).unwrap_or(0)
    }

    pub fn is_one_time(&self, action: ActionType) -> bool {
        self.one_time_actions.contains(&action)
    }

    pub fn cooldown_for(&self, action: ActionType) -> Option<Duration> {
        self.cooldowns.get(&action).copied()
    }

    pub fn asset_tier(&self, tier: u8) -> Option<&AssetTier> {
        self.asset_tiers.iter().find(|t| t.tier == tier)
    }

    /// Minimum points required to create a squad (the lowest tier threshold).
    pub fn squad_creation_min_points(&self) -> i64 {
        self.squad_tiers
            .iter()
            .map(|rule| rule.min_points)
            .min()
            .unwrap_or(0)
    }
}
