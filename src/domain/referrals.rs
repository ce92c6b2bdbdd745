//! Referral codes and referral registration. Codes are short lowercase hex
//! strings, unique store-wide and write-once per user. Registration pays the
//! referrer a base bonus plus an optional powerup bonus, both routed through
//! the points engine so every grant leaves an action record.

use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::awards::{AwardOptions, PointsEngine};
use crate::domain::EngineError;
use crate::events::{publish_best_effort, Topic, UserReferred};
use crate::models::{ActionType, User, UserRef};
use crate::store::UserUpdate;

const CODE_CHARS: &[u8] = b"0123456789abcdef";

fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Bonus amounts granted to the referrer by a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralOutcome {
    pub referrer_id: String,
    pub base_bonus: i64,
    pub powerup_bonus: i64,
    pub total_bonus: i64,
}

/// Referral-code issuance and referral registration over the points engine.
#[derive(Clone)]
pub struct ReferralService {
    engine: PointsEngine,
}

impl ReferralService {
    pub fn new(engine: PointsEngine) -> Self {
        Self { engine }
    }

    /// Returns the user's referral code, creating the user (with the
    /// one-time initial-connection bonus) and the code as needed. Codes are
    /// never reassigned once set.
    #[tracing::instrument(skip(self), fields(wallet = %wallet))]
    pub async fn get_or_create_referral_code(&self, wallet: &str) -> Result<String, EngineError> {
        let user_ref = UserRef::wallet(wallet);
        match self.engine.store().find_user(&user_ref).await? {
            Some(user) => {
                if let Some(code) = user.referral_code {
                    return Ok(code);
                }
            }
            None => {
                let user = User::new(Some(wallet.to_string()));
                info!(wallet = %wallet, "creating user on first touch");
                self.engine.store().insert_user(&user).await?;
                let bonus = self.engine.config().initial_connection_bonus();
                let options = AwardOptions::new("initial_connection")
                    .with_action(ActionType::InitialConnection);
                if self
                    .engine
                    .add_points(&user_ref, bonus, options)
                    .await?
                    .is_none()
                {
                    warn!(wallet = %wallet, "initial connection bonus skipped, user vanished");
                }
            }
        }
        self.assign_code(&user_ref).await
    }

    /// Generates a unique code and sets it on the user. Collisions with
    /// existing codes retry up to the configured attempt budget; the final
    /// fallback extends the last candidate by two characters.
    async fn assign_code(&self, user_ref: &UserRef) -> Result<String, EngineError> {
        let length = self.engine.config().referral_code_length;
        let attempts = self.engine.config().referral_code_max_attempts;
        let mut candidate = String::new();
        for _ in 0..attempts {
            candidate = random_code(length);
            match self.try_set_code(user_ref, &candidate).await? {
                Some(code) => return Ok(code),
                None => continue,
            }
        }
        candidate.push_str(&random_code(2));
        match self.try_set_code(user_ref, &candidate).await? {
            Some(code) => Ok(code),
            None => Err(EngineError::Conflict(
                "could not generate a unique referral code".to_string(),
            )),
        }
    }

    /// Attempts one candidate. `Ok(Some(code))` is the code now on the user
    /// (the candidate, or an existing one if another writer got there
    /// first); `Ok(None)` means the candidate collided and the caller
    /// should try another.
    async fn try_set_code(
        &self,
        user_ref: &UserRef,
        candidate: &str,
    ) -> Result<Option<String>, EngineError> {
        if self
            .engine
            .store()
            .find_user_by_referral_code(candidate)
            .await?
            .is_some()
        {
            return Ok(None);
        }
        match self.engine.store().set_referral_code(user_ref, candidate).await {
            Ok(true) => Ok(Some(candidate.to_string())),
            Ok(false) => {
                // Write-once refused: a concurrent call already set a code.
                let existing = self
                    .engine
                    .store()
                    .find_user(user_ref)
                    .await?
                    .and_then(|user| user.referral_code);
                match existing {
                    Some(code) => Ok(Some(code)),
                    None => Err(EngineError::Conflict(
                        "referral code assignment refused".to_string(),
                    )),
                }
            }
            Err(err) if err.is_integrity_error() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Registers `new_user_wallet` as referred via `referral_code`.
    ///
    /// This function:
    /// 1. Resolves the referrer by code and rejects self-referrals.
    /// 2. Rejects users that were already referred (`referred_by` is
    ///    write-once).
    /// 3. Consumes one use of the referrer's first active boost, if any, to
    ///    compute the powerup bonus.
    /// 4. Awards the base bonus (and the powerup bonus when positive)
    ///    through the engine, one action record each.
    /// 5. Persists the updated boost list and bumps `referrals_made`.
    /// 6. Creates the registering user if absent and sets `referred_by`.
    /// 7. Publishes `user.referred.success` best-effort.
    #[tracing::instrument(skip(self), fields(wallet = %new_user_wallet, code = %referral_code))]
    pub async fn register_referral(
        &self,
        new_user_wallet: &str,
        referral_code: &str,
    ) -> Result<ReferralOutcome, EngineError> {
        let referrer = self
            .engine
            .store()
            .find_user_by_referral_code(referral_code)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("unknown referral code: {referral_code}"))
            })?;
        if referrer.wallet_address.as_deref() == Some(new_user_wallet) {
            return Err(EngineError::Conflict(
                "cannot register with your own referral code".to_string(),
            ));
        }

        let registering = match self
            .engine
            .store()
            .find_user(&UserRef::wallet(new_user_wallet))
            .await?
        {
            Some(user) => {
                if user.referred_by.is_some() {
                    return Err(EngineError::Conflict(
                        "user was already referred".to_string(),
                    ));
                }
                user
            }
            None => {
                let user = User::new(Some(new_user_wallet.to_string()));
                info!(wallet = %new_user_wallet, "creating user on first touch");
                self.engine.store().insert_user(&user).await?;
                user
            }
        };

        let base = self.engine.config().referral_base_bonus;
        let mut boosts = referrer.active_referral_boosts.clone();
        let mut consumed_boost_id = None;
        let mut extra = 0i64;
        if let Some(position) = boosts.iter().position(|boost| boost.remaining_uses > 0) {
            let boost = &mut boosts[position];
            extra = (Decimal::from(base) * boost.value)
                .floor()
                .to_i64()
                .unwrap_or(0);
            consumed_boost_id = Some(boost.boost_id.clone());
            boost.remaining_uses -= 1;
            if boost.remaining_uses == 0 {
                boosts.remove(position);
            }
        }

        let referrer_ref = referrer.user_ref();
        let base_options = AwardOptions::new("referral_bonus")
            .with_action(ActionType::ReferralBonus)
            .with_metadata(json!({ "referred_wallet": new_user_wallet }));
        self.engine
            .add_points(&referrer_ref, base, base_options)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("referrer not found: {referrer_ref}"))
            })?;
        if extra > 0 {
            let powerup_options = AwardOptions::new("referral_powerup_bonus")
                .with_action(ActionType::ReferralPowerupBonus)
                .with_metadata(json!({
                    "referred_wallet": new_user_wallet,
                    "boost_id": consumed_boost_id,
                }));
            self.engine
                .add_points(&referrer_ref, extra, powerup_options)
                .await?
                .ok_or_else(|| {
                    EngineError::NotFound(format!("referrer not found: {referrer_ref}"))
                })?;
        }

        let updated = self
            .engine
            .store()
            .update_user(
                &referrer_ref,
                UserUpdate {
                    referral_boosts: consumed_boost_id.is_some().then_some(boosts),
                    increment_referrals_made: true,
                    ..Default::default()
                },
            )
            .await?;
        if !updated {
            warn!(referrer = %referrer_ref, "failed to persist referrer counters");
        }

        if !self
            .engine
            .store()
            .set_referred_by(&UserRef::wallet(new_user_wallet), &referrer.id)
            .await?
        {
            return Err(EngineError::Conflict(
                "user was already referred".to_string(),
            ));
        }

        info!(
            referrer_id = %referrer.id,
            base,
            extra,
            "referral registered"
        );
        publish_best_effort(
            self.engine.publisher(),
            self.engine.config().publish_timeout,
            Topic::UserReferred,
            &UserReferred {
                user_id: registering.id.clone(),
                referred_by_user_id: referrer.id.clone(),
                timestamp: Utc::now(),
            },
        )
        .await;

        Ok(ReferralOutcome {
            referrer_id: referrer.id,
            base_bonus: base,
            powerup_bonus: extra,
            total_bonus: base + extra,
        })
    }
}
