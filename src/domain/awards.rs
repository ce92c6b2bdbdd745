use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::RewardsConfig;
use crate::domain::estimator;
use crate::domain::guard::{ActionGuard, AwardPolicy};
use crate::domain::squads::recheck_squad_tier;
use crate::domain::EngineError;
use crate::events::{
    publish_best_effort, EventPublisher, SquadPointsUpdated, Topic, UserPointsUpdated,
};
use crate::models::{ActionRecord, ActionType, User, UserRef};
use crate::store::{LedgerStore, UserUpdate};

/// Options for a single award.
#[derive(Debug, Clone)]
pub struct AwardOptions {
    /// Human-readable cause, logged with the action record and events.
    pub reason: String,
    pub action: Option<ActionType>,
    pub metadata: Option<Value>,
    pub emit_event: bool,
    pub allow_negative_total: bool,
}

impl AwardOptions {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            action: None,
            metadata: None,
            emit_event: true,
            allow_negative_total: false,
        }
    }

    pub fn with_action(mut self, action: ActionType) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Suppress event emission for this award.
    pub fn silent(mut self) -> Self {
        self.emit_event = false;
        self
    }

    /// Administrative override: let the balance go below zero.
    pub fn allow_negative_total(mut self) -> Self {
        self.allow_negative_total = true;
        self
    }
}

/// Updated user snapshot returned from an award.
#[derive(Debug, Clone)]
pub struct AwardReceipt {
    pub user_id: String,
    pub ledger_identifier: String,
    pub previous_points: i64,
    pub points: i64,
    pub completed_actions: BTreeSet<ActionType>,
    pub points_share: Decimal,
    pub total_estimated_airdrop: Decimal,
    /// `false` when an already-credited one-time action made the call a
    /// no-op (nothing written, nothing emitted).
    pub applied: bool,
}

impl AwardReceipt {
    fn unchanged(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            ledger_identifier: user.ledger_identifier().to_string(),
            previous_points: user.points,
            points: user.points,
            completed_actions: user.completed_actions.clone(),
            points_share: user.points_share,
            total_estimated_airdrop: user.total_estimated_airdrop,
            applied: false,
        }
    }
}

/// The points award engine: applies signed point deltas to users, maintains
/// the action log and squad aggregates, refreshes derived airdrop estimates
/// and emits domain events.
///
/// One instance is constructed at process startup with its collaborators
/// injected, then shared by reference across call sites.
#[derive(Clone)]
pub struct PointsEngine {
    store: Arc<dyn LedgerStore>,
    publisher: Arc<dyn EventPublisher>,
    guard: ActionGuard,
    config: Arc<RewardsConfig>,
}

impl PointsEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        publisher: Arc<dyn EventPublisher>,
        config: Arc<RewardsConfig>,
    ) -> Self {
        let guard = ActionGuard::from_config(&config);
        Self {
            store,
            publisher,
            guard,
            config,
        }
    }

    pub fn guard(&self) -> &ActionGuard {
        &self.guard
    }

    pub fn config(&self) -> &RewardsConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub(crate) fn publisher(&self) -> &dyn EventPublisher {
        self.publisher.as_ref()
    }

    /// Applies a signed point delta to the user addressed by `user`.
    ///
    /// This function:
    /// 1. Loads the user; an unknown identifier is a soft failure (`Ok(None)`)
    /// 2. No-ops when a positive award carries an already-credited one-time action
    /// 3. Applies the delta via the store's atomic increment, clamping at 0
    ///    unless the caller opted into negative totals
    /// 4. Refreshes the derived airdrop estimate from the community-wide total
    /// 5. Records one-time action membership and appends one action record
    /// 6. Propagates the applied delta into the user's squad aggregate and
    ///    rechecks the squad tier on increases
    /// 7. Emits `squad.points.updated` / `user.points.updated` best-effort
    #[tracing::instrument(skip(self, user, options), fields(user = %user, reason = %options.reason))]
    pub async fn add_points(
        &self,
        user: &UserRef,
        points_delta: i64,
        options: AwardOptions,
    ) -> Result<Option<AwardReceipt>, EngineError> {
        // 1. Load the target; absence is a soft failure, not an error.
        let current = match self.store.find_user(user).await? {
            Some(current) => current,
            None => {
                warn!("award target not found, skipping");
                return Ok(None);
            }
        };

        // 2. Second line of defense behind the call-site guard: an
        // already-credited one-time action makes the whole call a no-op.
        if points_delta > 0 {
            if let Some(action) = options.action {
                if matches!(self.guard.policy_for(action), AwardPolicy::OneTime)
                    && current.completed_actions.contains(&action)
                {
                    info!(
                        action = action.as_str(),
                        "one-time action already credited, returning unchanged snapshot"
                    );
                    return Ok(Some(AwardReceipt::unchanged(&current)));
                }
            }
        }

        // 3. Atomic increment; the floor implements the clamp-at-zero rule.
        let floor = if options.allow_negative_total {
            None
        } else {
            Some(0)
        };
        let change = match self
            .store
            .increment_user_points(user, points_delta, floor)
            .await?
        {
            Some(change) => change,
            None => {
                warn!("award target vanished before increment, skipping");
                return Ok(None);
            }
        };

        // 4. Derived airdrop estimate against the community-wide total.
        let total_community_points = self.store.aggregate_total_points().await?;
        let points_share = estimator::estimate_points_share(
            change.current,
            total_community_points,
            self.config.airdrop_pool_size,
        );
        let total_estimated_airdrop = estimator::estimate_total_airdrop(
            current.initial_airdrop_amount,
            Decimal::ZERO,
            points_share,
        );

        let newly_completed = match options.action {
            Some(action) if points_delta > 0 && !current.completed_actions.contains(&action) => {
                Some(action)
            }
            _ => None,
        };

        let updated = self
            .store
            .update_user(
                user,
                UserUpdate {
                    points_share: Some(points_share),
                    total_estimated_airdrop: Some(total_estimated_airdrop),
                    add_completed_action: newly_completed,
                    ..Default::default()
                },
            )
            .await?;
        if !updated {
            warn!("user disappeared while refreshing derived fields");
        }

        // 5. Exactly one action record per mutation. The point change is
        // already durable, so a log failure is an audit gap to flag, never
        // a reason to abort.
        let record = ActionRecord {
            wallet_address: current.ledger_identifier().to_string(),
            action: options
                .action
                .map(|a| a.as_str().to_string())
                .unwrap_or_else(|| options.reason.clone()),
            points_awarded: change.applied_delta(),
            timestamp: Utc::now(),
            notes: Some(options.reason.clone()),
            metadata: options.metadata.clone(),
        };
        if let Err(err) = self.store.insert_action(&record).await {
            error!(
                error = %err,
                points_change = change.applied_delta(),
                "action log write failed after user update, ledger inconsistency"
            );
        }

        // 6. Squad aggregate moves by the delta that was actually applied.
        if let Some(squad_id) = &current.squad_id {
            if points_delta != 0 {
                let squad_delta = change.applied_delta();
                let modified = self
                    .store
                    .increment_squad_points(squad_id, squad_delta)
                    .await?;
                if modified {
                    if points_delta > 0 {
                        if let Err(err) =
                            recheck_squad_tier(self.store.as_ref(), &self.config, squad_id).await
                        {
                            warn!(
                                squad_id = %squad_id,
                                error = %err,
                                "squad tier recheck failed, continuing"
                            );
                        }
                    }
                    if options.emit_event {
                        publish_best_effort(
                            self.publisher.as_ref(),
                            self.config.publish_timeout,
                            Topic::SquadPointsUpdated,
                            &SquadPointsUpdated {
                                squad_id: squad_id.clone(),
                                points_change: squad_delta,
                                reason: format!("points_engine:{}", options.reason),
                                timestamp: Utc::now(),
                                responsible_user_id: current.ledger_identifier().to_string(),
                            },
                        )
                        .await;
                    }
                } else {
                    warn!(squad_id = %squad_id, "linked squad missing during aggregate update");
                }
            }
        }

        // 7. User-level event, best-effort.
        if options.emit_event {
            publish_best_effort(
                self.publisher.as_ref(),
                self.config.publish_timeout,
                Topic::UserPointsUpdated,
                &UserPointsUpdated {
                    wallet_address: current.ledger_identifier().to_string(),
                    old_points: change.previous,
                    new_points: change.current,
                    points_change: change.applied_delta(),
                    reason: options.reason.clone(),
                    timestamp: Utc::now(),
                    metadata: options.metadata,
                },
            )
            .await;
        }

        let mut completed_actions = current.completed_actions;
        if let Some(action) = newly_completed {
            completed_actions.insert(action);
        }

        Ok(Some(AwardReceipt {
            user_id: current.id,
            ledger_identifier: record.wallet_address,
            previous_points: change.previous,
            points: change.current,
            completed_actions,
            points_share,
            total_estimated_airdrop,
            applied: true,
        }))
    }

    /// Sets the balance to an absolute value by delegating the difference to
    /// [`add_points`](Self::add_points). Negative targets are rejected.
    #[tracing::instrument(skip(self, user, options), fields(user = %user))]
    pub async fn set_points(
        &self,
        user: &UserRef,
        absolute_points: i64,
        options: AwardOptions,
    ) -> Result<Option<AwardReceipt>, EngineError> {
        if absolute_points < 0 {
            return Err(EngineError::Validation(format!(
                "absolute point value must be non-negative, got {absolute_points}"
            )));
        }
        let current = match self.store.find_user(user).await? {
            Some(current) => current,
            None => {
                warn!("set-points target not found, skipping");
                return Ok(None);
            }
        };
        let delta = absolute_points - current.points;
        self.add_points(user, delta, options).await
    }
}
