// Domain layer - award pipeline business logic with no transport concerns.
// These modules contain the engine, the pure estimator/guard policies and
// the orchestration call sites built on top of them.

pub mod airdrop;
pub mod awards;
pub mod estimator;
pub mod guard;
pub mod mint;
pub mod referrals;
pub mod social;
pub mod squads;

use crate::store::StoreError;

/// Engine-level error taxonomy.
///
/// "Already processed" outcomes (one-time duplicates, active cooldowns) are
/// not errors; operations surface them as informational results instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient points: need {required}, have {available}")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("minting failed: {0}")]
    Mint(String),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

// Re-export commonly used types and functions
pub use airdrop::{AirdropService, AllocationOutcome};
pub use awards::{AwardOptions, AwardReceipt, PointsEngine};
pub use estimator::{
    classify_airdrop_tier, classify_squad_tier, estimate_points_share, estimate_total_airdrop,
    SquadTierInfo,
};
pub use guard::{ActionGuard, AwardPolicy, GuardDecision};
pub use mint::{AssetMinter, MintError, MintOutcome, MintReceipt, SimulatedMinter};
pub use referrals::{ReferralOutcome, ReferralService};
pub use social::{SocialActionOutcome, SocialActionService};
pub use squads::{SquadLeaveOutcome, SquadService};
