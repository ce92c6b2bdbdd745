//! Airdrop allocation intake. Records the first allocation snapshot for a
//! wallet, refreshes the derived estimate fields, and credits the matching
//! one-time allocation-tier award.

use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use crate::domain::awards::{AwardOptions, PointsEngine};
use crate::domain::estimator::{classify_airdrop_tier, estimate_points_share, estimate_total_airdrop};
use crate::domain::EngineError;
use crate::models::{ActionType, User, UserRef};
use crate::store::UserUpdate;

/// State after recording an allocation, for caller messaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    /// The snapshot on record (the stored first one, not necessarily the
    /// amount just submitted).
    pub initial_airdrop_amount: Decimal,
    pub points_share: Decimal,
    pub total_estimated_airdrop: Decimal,
    /// Tier action matched by the allocation, when any threshold is met.
    pub tier_action: Option<ActionType>,
    /// Points credited by this call; zero when the tier was already
    /// credited earlier or no tier matched.
    pub tier_points_awarded: i64,
    pub total_points: i64,
}

/// Intake for externally computed airdrop allocations.
#[derive(Clone)]
pub struct AirdropService {
    engine: PointsEngine,
}

impl AirdropService {
    pub fn new(engine: PointsEngine) -> Self {
        Self { engine }
    }

    /// Records an allocation snapshot for `wallet` and credits the matching
    /// allocation-tier award.
    ///
    /// This function:
    /// 1. Loads or creates the user (zero points on first touch).
    /// 2. Stores `initial_airdrop_amount` once; the first recorded snapshot
    ///    wins and later submissions leave it unchanged.
    /// 3. Recomputes `points_share` and `total_estimated_airdrop` from the
    ///    current community total.
    /// 4. Classifies the allocation against the tier ladder and routes the
    ///    matching one-time award through the engine; a tier credited by an
    ///    earlier call is a no-op.
    #[tracing::instrument(skip(self), fields(wallet = %wallet, amount = %amount))]
    pub async fn record_allocation(
        &self,
        wallet: &str,
        amount: Decimal,
    ) -> Result<AllocationOutcome, EngineError> {
        if amount < Decimal::ZERO {
            return Err(EngineError::Validation(
                "allocation amount cannot be negative".to_string(),
            ));
        }

        let user_ref = UserRef::wallet(wallet);
        let user = match self.engine.store().find_user(&user_ref).await? {
            Some(user) => user,
            None => {
                let user = User::new(Some(wallet.to_string()));
                info!(wallet = %wallet, "creating user on first touch");
                self.engine.store().insert_user(&user).await?;
                user
            }
        };

        let first_snapshot = user.initial_airdrop_amount.is_zero() && !amount.is_zero();
        let effective_initial = if first_snapshot {
            amount
        } else {
            user.initial_airdrop_amount
        };

        let config = self.engine.config();
        let community_total = self.engine.store().aggregate_total_points().await?;
        let points_share =
            estimate_points_share(user.points, community_total, config.airdrop_pool_size);
        let total_estimated =
            estimate_total_airdrop(effective_initial, Decimal::ZERO, points_share);

        self.engine
            .store()
            .update_user(
                &user_ref,
                UserUpdate {
                    initial_airdrop_amount: first_snapshot.then_some(effective_initial),
                    points_share: Some(points_share),
                    total_estimated_airdrop: Some(total_estimated),
                    ..Default::default()
                },
            )
            .await?;
        if first_snapshot {
            info!(wallet = %wallet, amount = %amount, "recorded initial airdrop allocation");
        }

        let mut tier_action = None;
        let mut tier_points_awarded = 0;
        let mut total_points = user.points;
        if let Some(rule) = classify_airdrop_tier(effective_initial, &config.airdrop_tiers) {
            tier_action = Some(rule.action);
            let options = AwardOptions::new("airdrop_tier_award")
                .with_action(rule.action)
                .with_metadata(json!({ "allocation": effective_initial.to_string() }));
            if let Some(receipt) = self
                .engine
                .add_points(&user_ref, rule.points, options)
                .await?
            {
                total_points = receipt.points;
                if receipt.applied {
                    tier_points_awarded = receipt.points - receipt.previous_points;
                }
            }
        }

        Ok(AllocationOutcome {
            initial_airdrop_amount: effective_initial,
            points_share,
            total_estimated_airdrop: total_estimated,
            tier_action,
            tier_points_awarded,
            total_points,
        })
    }
}
