//! Social engagement actions (follows, joins, shares) logged against the
//! points ledger. Guard rejections are reported as informational outcomes,
//! not errors, so callers can render "already done" and "come back later"
//! states without special-casing failures.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::awards::{AwardOptions, PointsEngine};
use crate::domain::guard::{AwardPolicy, GuardDecision};
use crate::domain::EngineError;
use crate::models::{ActionType, UserRef};
use crate::store::UserUpdate;

/// Result of attempting to log a social action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialActionOutcome {
    /// Points were awarded.
    Awarded {
        action: ActionType,
        points_awarded: i64,
        new_total: i64,
        completed_actions: BTreeSet<ActionType>,
        /// When the action can be performed again, for cooldown actions.
        next_available_at: Option<DateTime<Utc>>,
    },
    /// One-time action the user has already completed. Nothing was written.
    AlreadyCompleted { action: ActionType, points: i64 },
    /// Cooldown has not elapsed yet. Nothing was written.
    CoolingDown {
        action: ActionType,
        next_available_at: DateTime<Utc>,
    },
}

/// Logs social actions through the points engine, honoring one-time and
/// cooldown policies.
#[derive(Clone)]
pub struct SocialActionService {
    engine: PointsEngine,
}

impl SocialActionService {
    pub fn new(engine: PointsEngine) -> Self {
        Self { engine }
    }

    /// Logs one social action for `wallet`.
    ///
    /// This function:
    /// 1. Loads the user (missing user is an error here, social actions
    ///    require an onboarded account).
    /// 2. Looks up the configured point value for the action.
    /// 3. Evaluates the award policy; one-time repeats and active cooldowns
    ///    short-circuit with an informational outcome.
    /// 4. Awards the points through the engine.
    /// 5. Stamps the action timestamp for cooldown-gated actions.
    #[tracing::instrument(skip(self), fields(wallet = %wallet, action = %action))]
    pub async fn log_social_action(
        &self,
        wallet: &str,
        action: ActionType,
    ) -> Result<SocialActionOutcome, EngineError> {
        let user_ref = UserRef::wallet(wallet);
        let user = self
            .engine
            .store()
            .find_user(&user_ref)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user not found: {wallet}")))?;

        let points = self.engine.config().points_for(action).ok_or_else(|| {
            EngineError::Validation(format!("no points configured for action: {action}"))
        })?;

        let now = Utc::now();
        match self.engine.guard().evaluate(&user, action, now) {
            GuardDecision::Allow => {}
            GuardDecision::AlreadyCompleted => {
                return Ok(SocialActionOutcome::AlreadyCompleted {
                    action,
                    points: user.points,
                });
            }
            GuardDecision::CoolingDown { next_available_at } => {
                return Ok(SocialActionOutcome::CoolingDown {
                    action,
                    next_available_at,
                });
            }
        }

        let options = AwardOptions::new(format!("action:{action}")).with_action(action);
        let receipt = self
            .engine
            .add_points(&user_ref, points, options)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user not found: {wallet}")))?;
        if !receipt.applied {
            // Lost a race against a concurrent award of the same one-time
            // action; report it the same way as the pre-check.
            return Ok(SocialActionOutcome::AlreadyCompleted {
                action,
                points: receipt.points,
            });
        }

        let next_available_at = match self.engine.guard().policy_for(action) {
            AwardPolicy::Cooldown(interval) => {
                let updated = self
                    .engine
                    .store()
                    .update_user(
                        &user_ref,
                        UserUpdate {
                            last_action_at: Some((action, now)),
                            ..Default::default()
                        },
                    )
                    .await?;
                if !updated {
                    warn!(wallet = %wallet, action = %action, "failed to stamp cooldown timestamp");
                }
                Some(now + interval)
            }
            AwardPolicy::OneTime | AwardPolicy::Unrestricted => None,
        };

        Ok(SocialActionOutcome::Awarded {
            action,
            points_awarded: receipt.points - receipt.previous_points,
            new_total: receipt.points,
            completed_actions: receipt.completed_actions,
            next_available_at,
        })
    }
}
