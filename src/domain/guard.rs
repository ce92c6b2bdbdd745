//! Idempotency and cooldown policy for action-typed awards.
//!
//! The guard is consulted by call sites before they invoke the award engine;
//! the engine independently re-checks one-time membership as a second line
//! of defense. Cooldown state is evaluated lazily on each attempt by
//! comparing the stored last-performed timestamp, so no background expiry
//! job exists.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::RewardsConfig;
use crate::models::{ActionType, User};

/// Award gating policy for one action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardPolicy {
    /// Creditable at most once per user, tracked via `completed_actions`.
    OneTime,
    /// Repeatable after the given interval since the last successful award.
    Cooldown(Duration),
    /// Always awardable.
    Unrestricted,
}

/// Verdict for one `(user, action)` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    AlreadyCompleted,
    CoolingDown { next_available_at: DateTime<Utc> },
}

/// Policy table keyed by action type. Actions without an entry are
/// unrestricted.
#[derive(Debug, Clone)]
pub struct ActionGuard {
    policies: HashMap<ActionType, AwardPolicy>,
}

impl ActionGuard {
    /// Builds the table from config. An action listed both as one-time and
    /// with a cooldown is treated as one-time (the stricter rule).
    pub fn from_config(config: &RewardsConfig) -> Self {
        let mut policies = HashMap::new();
        for (&action, &interval) in &config.cooldowns {
            policies.insert(action, AwardPolicy::Cooldown(interval));
        }
        for &action in &config.one_time_actions {
            policies.insert(action, AwardPolicy::OneTime);
        }
        Self { policies }
    }

    pub fn policy_for(&self, action: ActionType) -> AwardPolicy {
        self.policies
            .get(&action)
            .copied()
            .unwrap_or(AwardPolicy::Unrestricted)
    }

    /// Evaluates whether `user` may be awarded `action` at instant `now`.
    pub fn evaluate(&self, user: &User, action: ActionType, now: DateTime<Utc>) -> GuardDecision {
        match self.policy_for(action) {
            AwardPolicy::Unrestricted => GuardDecision::Allow,
            AwardPolicy::OneTime => {
                if user.completed_actions.contains(&action) {
                    GuardDecision::AlreadyCompleted
                } else {
                    GuardDecision::Allow
                }
            }
            AwardPolicy::Cooldown(interval) => match user.last_action_at.get(&action) {
                Some(&last) => {
                    let next_available_at = last + interval;
                    if now >= next_available_at {
                        GuardDecision::Allow
                    } else {
                        GuardDecision::CoolingDown { next_available_at }
                    }
                }
                None => GuardDecision::Allow,
            },
        }
    }
}
