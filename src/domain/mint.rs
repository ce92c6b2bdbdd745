//! Conversion of points into tiered assets through an injected minting
//! capability.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::AssetTier;
use crate::domain::awards::{AwardOptions, PointsEngine};
use crate::domain::EngineError;
use crate::events::{publish_best_effort, AssetMinted, Topic};
use crate::models::{ActionType, UserRef};

#[derive(Debug, Error)]
pub enum MintError {
    #[error("mint transaction failed: {0}")]
    Transaction(String),

    #[error("minting unavailable: {0}")]
    Unavailable(String),
}

/// Transaction reference returned by a confirmed mint.
#[derive(Debug, Clone)]
pub struct MintReceipt {
    pub tx_signature: String,
    pub asset_id: String,
}

/// External minting capability, opaque to the award pipeline.
#[async_trait]
pub trait AssetMinter: Send + Sync {
    /// Mints the tier asset for `wallet`. Returning `Ok` means the asset is
    /// confirmed and the point cost may be deducted.
    async fn mint(&self, wallet: &str, tier: &AssetTier) -> Result<MintReceipt, MintError>;
}

/// Minter that fabricates receipts locally, as the platform does until
/// on-chain minting ships.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedMinter;

#[async_trait]
impl AssetMinter for SimulatedMinter {
    async fn mint(&self, wallet: &str, tier: &AssetTier) -> Result<MintReceipt, MintError> {
        let receipt = MintReceipt {
            tx_signature: format!("sim_tx_{}", Uuid::new_v4().simple()),
            asset_id: format!("sim_nft_{}", Uuid::new_v4().simple()),
        };
        debug!(
            wallet = %wallet,
            tier = tier.tier,
            tx = %receipt.tx_signature,
            "simulated asset mint"
        );
        Ok(receipt)
    }
}

/// Result of a successful points-to-asset conversion.
#[derive(Debug, Clone)]
pub struct MintOutcome {
    pub tier: u8,
    pub tier_name: String,
    pub asset_id: String,
    pub tx_signature: String,
    pub points_spent: i64,
    pub points_remaining: i64,
}

impl PointsEngine {
    /// Converts points into the tier asset: verifies the cost is covered,
    /// mints through the injected capability, then deducts the cost.
    ///
    /// The deduction happens only after the mint confirms. If the deduction
    /// then fails, the asset already exists: the discrepancy is logged at
    /// ERROR for reconciliation and the failure is propagated unchanged.
    #[tracing::instrument(skip(self, minter, user), fields(user = %user, tier_id))]
    pub async fn convert_points_to_asset(
        &self,
        minter: &dyn AssetMinter,
        user: &UserRef,
        tier_id: u8,
    ) -> Result<MintOutcome, EngineError> {
        let tier = self
            .config()
            .asset_tier(tier_id)
            .cloned()
            .ok_or_else(|| EngineError::Validation(format!("unknown asset tier: {tier_id}")))?;

        let current = self
            .store()
            .find_user(user)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user not found: {user}")))?;

        if current.points < tier.points_cost {
            return Err(EngineError::InsufficientPoints {
                required: tier.points_cost,
                available: current.points,
            });
        }

        // Mint first; points leave the balance only for a confirmed asset.
        let receipt = minter
            .mint(current.ledger_identifier(), &tier)
            .await
            .map_err(|err| EngineError::Mint(err.to_string()))?;
        info!(
            tx = %receipt.tx_signature,
            asset = %receipt.asset_id,
            "asset minted, deducting points"
        );

        let deduction = self
            .add_points(
                user,
                -tier.points_cost,
                AwardOptions::new(format!("nft_minted:{}", tier.name))
                    .with_action(ActionType::NftMint)
                    .with_metadata(json!({
                        "tier": tier.tier,
                        "tier_name": tier.name,
                        "asset_id": receipt.asset_id,
                        "tx_signature": receipt.tx_signature,
                    })),
            )
            .await;

        let snapshot = match deduction {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                error!(
                    asset = %receipt.asset_id,
                    "user disappeared after mint, points not deducted, ledger discrepancy"
                );
                return Err(EngineError::Conflict(
                    "user disappeared after mint; points not deducted".to_string(),
                ));
            }
            Err(err) => {
                error!(
                    asset = %receipt.asset_id,
                    error = %err,
                    "point deduction failed after confirmed mint, ledger discrepancy"
                );
                return Err(err);
            }
        };

        publish_best_effort(
            self.publisher(),
            self.config().publish_timeout,
            Topic::AssetMinted,
            &AssetMinted {
                wallet_address: snapshot.ledger_identifier.clone(),
                tier_id: tier.tier,
                tier_name: tier.name.clone(),
                asset_id: receipt.asset_id.clone(),
                points_spent: tier.points_cost,
                tx_signature: receipt.tx_signature.clone(),
                timestamp: Utc::now(),
            },
        )
        .await;

        Ok(MintOutcome {
            tier: tier.tier,
            tier_name: tier.name,
            asset_id: receipt.asset_id,
            tx_signature: receipt.tx_signature,
            points_spent: tier.points_cost,
            points_remaining: snapshot.points,
        })
    }
}
