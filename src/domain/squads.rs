//! Squad membership transitions: create, join, leave and the invitation
//! lifecycle. Every membership change transfers the member's current points
//! into or out of the squad aggregate through atomic store increments.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::RewardsConfig;
use crate::domain::estimator::{classify_squad_tier, SquadTierInfo};
use crate::domain::EngineError;
use crate::events::{publish_best_effort, EventPublisher, SquadPointsUpdated, Topic};
use crate::models::{InvitationStatus, Squad, SquadInvitation, User, UserRef};
use crate::notify::{notify_best_effort, Notification, NotificationKind, NotificationSink};
use crate::store::{AddMemberOutcome, LedgerStore, SquadUpdate, UserUpdate};

/// Upgrades a squad's tier fields when its aggregate total now meets a
/// higher threshold. Tiers only move up here; nothing downgrades a squad
/// that later loses points.
pub(crate) async fn recheck_squad_tier(
    store: &dyn LedgerStore,
    config: &RewardsConfig,
    squad_id: &str,
) -> crate::store::Result<Option<SquadTierInfo>> {
    let squad = match store.find_squad(squad_id).await? {
        Some(squad) => squad,
        None => return Ok(None),
    };
    let classified = classify_squad_tier(squad.total_squad_points, &config.squad_tiers);
    if classified.tier > squad.tier {
        info!(
            squad_id = %squad_id,
            old_tier = squad.tier,
            new_tier = classified.tier,
            max_members = classified.max_members,
            "squad tier upgraded"
        );
        store
            .update_squad(
                squad_id,
                SquadUpdate {
                    tier: Some(classified.tier),
                    max_members: Some(classified.max_members),
                    ..Default::default()
                },
            )
            .await?;
        return Ok(Some(classified));
    }
    Ok(None)
}

/// What happened to the squad when a member left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquadLeaveOutcome {
    pub squad_id: String,
    pub disbanded: bool,
    pub new_leader: Option<String>,
}

/// Squad membership orchestration over the ledger store, with best-effort
/// events and member notifications.
#[derive(Clone)]
pub struct SquadService {
    store: Arc<dyn LedgerStore>,
    publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn NotificationSink>,
    config: Arc<RewardsConfig>,
}

impl SquadService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        publisher: Arc<dyn EventPublisher>,
        notifier: Arc<dyn NotificationSink>,
        config: Arc<RewardsConfig>,
    ) -> Self {
        Self {
            store,
            publisher,
            notifier,
            config,
        }
    }

    /// Creates a squad led by `leader_wallet`, seeded with the leader's
    /// current points as the aggregate total.
    #[tracing::instrument(skip(self, name, description), fields(leader = %leader_wallet, name = %name))]
    pub async fn create_squad(
        &self,
        leader_wallet: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Squad, EngineError> {
        let name = name.trim();
        self.validate_squad_text(name, description)?;

        let user = self.require_user(leader_wallet).await?;
        if user.squad_id.is_some() {
            return Err(EngineError::Conflict(
                "user already belongs to a squad".to_string(),
            ));
        }
        let min_points = self.config.squad_creation_min_points();
        if user.points < min_points {
            return Err(EngineError::InsufficientPoints {
                required: min_points,
                available: user.points,
            });
        }
        if self.store.find_squad_by_name(name).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "squad name already taken: {name}"
            )));
        }

        let tier_info = classify_squad_tier(user.points, &self.config.squad_tiers);
        let squad = Squad::new(
            name.to_string(),
            description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            leader_wallet.to_string(),
            user.points,
            tier_info.tier,
            tier_info.max_members,
        );
        self.store.insert_squad(&squad).await?;
        self.store
            .update_user(
                &UserRef::wallet(leader_wallet),
                UserUpdate {
                    squad_id: Some(Some(squad.squad_id.clone())),
                    ..Default::default()
                },
            )
            .await?;

        info!(squad_id = %squad.squad_id, initial_points = squad.total_squad_points, "squad created");
        if squad.total_squad_points > 0 {
            publish_best_effort(
                self.publisher.as_ref(),
                self.config.publish_timeout,
                Topic::SquadPointsUpdated,
                &SquadPointsUpdated {
                    squad_id: squad.squad_id.clone(),
                    points_change: squad.total_squad_points,
                    reason: "squad_created_with_initial_points".to_string(),
                    timestamp: Utc::now(),
                    responsible_user_id: leader_wallet.to_string(),
                },
            )
            .await;
        }

        Ok(squad)
    }

    /// Adds `wallet` to an open squad, transferring the member's current
    /// points into the aggregate.
    #[tracing::instrument(skip(self), fields(wallet = %wallet, squad_id = %squad_id))]
    pub async fn join_squad(&self, wallet: &str, squad_id: &str) -> Result<Squad, EngineError> {
        let user = self.require_user(wallet).await?;
        if user.squad_id.is_some() {
            return Err(EngineError::Conflict(
                "user already belongs to a squad".to_string(),
            ));
        }
        let squad = self
            .store
            .find_squad(squad_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("squad not found: {squad_id}")))?;

        match self.store.add_squad_member(squad_id, wallet).await? {
            AddMemberOutcome::Added => {}
            AddMemberOutcome::AlreadyMember => {
                return Err(EngineError::Conflict(
                    "user is already on the squad roster".to_string(),
                ));
            }
            AddMemberOutcome::SquadFull => {
                return Err(EngineError::Conflict("squad is full".to_string()));
            }
            AddMemberOutcome::SquadNotFound => {
                return Err(EngineError::NotFound(format!("squad not found: {squad_id}")));
            }
        }

        self.store
            .update_user(
                &UserRef::wallet(wallet),
                UserUpdate {
                    squad_id: Some(Some(squad_id.to_string())),
                    ..Default::default()
                },
            )
            .await?;

        self.transfer_points_in(squad_id, wallet, user.points, "user_joined_squad")
            .await?;
        self.notify_members_joined(&squad, wallet, None).await;

        let joined = self
            .store
            .find_squad(squad_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("squad not found: {squad_id}")))?;
        Ok(joined)
    }

    /// Removes `wallet` from their squad, decrementing the aggregate by the
    /// member's points. A departing leader promotes the next member, or the
    /// squad is deleted when nobody remains.
    #[tracing::instrument(skip(self), fields(wallet = %wallet))]
    pub async fn leave_squad(&self, wallet: &str) -> Result<SquadLeaveOutcome, EngineError> {
        let user = self.require_user(wallet).await?;
        let squad_id = user
            .squad_id
            .clone()
            .ok_or_else(|| EngineError::Conflict("user is not in a squad".to_string()))?;

        let squad = match self.store.find_squad(&squad_id).await? {
            Some(squad) => squad,
            None => {
                // Stale link: clear it so the user is not stuck.
                warn!(squad_id = %squad_id, "squad record missing, clearing stale membership link");
                self.store
                    .update_user(
                        &UserRef::wallet(wallet),
                        UserUpdate {
                            squad_id: Some(None),
                            ..Default::default()
                        },
                    )
                    .await?;
                return Err(EngineError::NotFound(format!(
                    "squad not found: {squad_id}; stale membership link cleared"
                )));
            }
        };

        self.store.remove_squad_member(&squad_id, wallet).await?;
        if user.points != 0 {
            self.store
                .increment_squad_points(&squad_id, -user.points)
                .await?;
        }
        self.store
            .update_user(
                &UserRef::wallet(wallet),
                UserUpdate {
                    squad_id: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        let remaining: Vec<String> = squad
            .member_wallet_addresses
            .iter()
            .filter(|member| member.as_str() != wallet)
            .cloned()
            .collect();

        let mut outcome = SquadLeaveOutcome {
            squad_id: squad_id.clone(),
            disbanded: false,
            new_leader: None,
        };

        if squad.leader_wallet_address == wallet {
            if let Some(next_leader) = remaining.first().cloned() {
                self.store
                    .update_squad(
                        &squad_id,
                        SquadUpdate {
                            leader_wallet_address: Some(next_leader.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(squad_id = %squad_id, new_leader = %next_leader, "squad leadership transferred");
                for member in &remaining {
                    notify_best_effort(
                        self.notifier.as_ref(),
                        Notification::new(
                            member,
                            NotificationKind::SquadLeaderChanged,
                            "New Squad Leader",
                            format!("{next_leader} is now the leader of {}", squad.name),
                        )
                        .about_squad(&squad_id, &squad.name)
                        .about_user(&next_leader),
                    )
                    .await;
                }
                outcome.new_leader = Some(next_leader);
            } else {
                self.store.delete_squad(&squad_id).await?;
                info!(squad_id = %squad_id, "squad disbanded, no members remain");
                notify_best_effort(
                    self.notifier.as_ref(),
                    Notification::new(
                        wallet,
                        NotificationKind::SquadDisbanded,
                        "Squad Disbanded",
                        format!("{} was disbanded after its last member left", squad.name),
                    )
                    .about_squad(&squad_id, &squad.name),
                )
                .await;
                outcome.disbanded = true;
                return Ok(outcome);
            }
        }

        for member in &remaining {
            notify_best_effort(
                self.notifier.as_ref(),
                Notification::new(
                    member,
                    NotificationKind::SquadMemberLeft,
                    "Member Left",
                    format!("{wallet} left {}", squad.name),
                )
                .about_squad(&squad_id, &squad.name)
                .about_user(wallet),
            )
            .await;
        }

        Ok(outcome)
    }

    /// Records a pending invitation for `wallet` to join `squad_id`, created
    /// when the user follows the squad's invite link. Users are created on
    /// first touch; an existing pending invitation is returned as-is.
    #[tracing::instrument(skip(self), fields(wallet = %wallet, squad_id = %squad_id))]
    pub async fn request_invitation(
        &self,
        wallet: &str,
        squad_id: &str,
    ) -> Result<SquadInvitation, EngineError> {
        let user = self.find_or_create_user(wallet).await?;
        if user.squad_id.is_some() {
            return Err(EngineError::Conflict(
                "user already belongs to a squad".to_string(),
            ));
        }
        let squad = self
            .store
            .find_squad(squad_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("squad not found: {squad_id}")))?;
        if squad.is_full() {
            return Err(EngineError::Conflict("squad is full".to_string()));
        }

        if let Some(existing) = self
            .store
            .find_pending_invitation(squad_id, wallet)
            .await?
        {
            return Ok(existing);
        }

        let invitation = SquadInvitation::new(&squad, wallet.to_string());
        self.store.insert_invitation(&invitation).await?;
        notify_best_effort(
            self.notifier.as_ref(),
            Notification::new(
                wallet,
                NotificationKind::SquadInviteReceived,
                "Squad Invitation",
                format!("You have been invited to join {}", squad.name),
            )
            .about_squad(&squad.squad_id, &squad.name)
            .about_invitation(&invitation.invitation_id),
        )
        .await;

        Ok(invitation)
    }

    /// Accepts a pending invitation. A user already in another squad leaves
    /// it implicitly first, including leader promotion or disbanding.
    #[tracing::instrument(skip(self), fields(wallet = %wallet, invitation_id = %invitation_id))]
    pub async fn accept_invitation(
        &self,
        wallet: &str,
        invitation_id: &str,
    ) -> Result<Squad, EngineError> {
        let invitation = self
            .store
            .find_invitation(invitation_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("invitation not found: {invitation_id}"))
            })?;
        if invitation.invitee_wallet_address != wallet {
            return Err(EngineError::Conflict(
                "invitation is addressed to another user".to_string(),
            ));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(EngineError::Conflict(format!(
                "invitation is {}",
                invitation.status.as_str()
            )));
        }

        let user = self.find_or_create_user(wallet).await?;
        let target_squad_id = invitation.squad_id.clone();

        if self.store.find_squad(&target_squad_id).await?.is_none() {
            self.store
                .update_invitation_status(invitation_id, InvitationStatus::Revoked)
                .await?;
            return Err(EngineError::NotFound(format!(
                "squad no longer exists: {target_squad_id}"
            )));
        }

        match &user.squad_id {
            Some(current) if *current == target_squad_id => {
                return Err(EngineError::Conflict(
                    "user is already a member of this squad".to_string(),
                ));
            }
            Some(_) => {
                // Implicit leave before joining the new squad. A stale link
                // (squad record already gone) is cleared by leave_squad and
                // must not block the accept.
                match self.leave_squad(wallet).await {
                    Ok(_) | Err(EngineError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
            None => {}
        }

        match self
            .store
            .add_squad_member(&target_squad_id, wallet)
            .await?
        {
            AddMemberOutcome::Added | AddMemberOutcome::AlreadyMember => {}
            AddMemberOutcome::SquadFull => {
                self.store
                    .update_invitation_status(invitation_id, InvitationStatus::Declined)
                    .await?;
                return Err(EngineError::Conflict("squad is full".to_string()));
            }
            AddMemberOutcome::SquadNotFound => {
                self.store
                    .update_invitation_status(invitation_id, InvitationStatus::Revoked)
                    .await?;
                return Err(EngineError::NotFound(format!(
                    "squad no longer exists: {target_squad_id}"
                )));
            }
        }

        self.store
            .update_user(
                &UserRef::wallet(wallet),
                UserUpdate {
                    squad_id: Some(Some(target_squad_id.clone())),
                    ..Default::default()
                },
            )
            .await?;
        self.transfer_points_in(
            &target_squad_id,
            wallet,
            user.points,
            "user_joined_squad_via_invite",
        )
        .await?;
        self.store
            .update_invitation_status(invitation_id, InvitationStatus::Accepted)
            .await?;

        let squad = self
            .store
            .find_squad(&target_squad_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("squad no longer exists: {target_squad_id}"))
            })?;

        notify_best_effort(
            self.notifier.as_ref(),
            Notification::new(
                &invitation.inviter_wallet_address,
                NotificationKind::SquadInviteAccepted,
                "Invitation Accepted",
                format!("{wallet} accepted your invitation to {}", squad.name),
            )
            .about_squad(&squad.squad_id, &squad.name)
            .about_user(wallet),
        )
        .await;
        self.notify_members_joined(&squad, wallet, Some(&invitation.inviter_wallet_address))
            .await;

        Ok(squad)
    }

    async fn require_user(&self, wallet: &str) -> Result<User, EngineError> {
        self.store
            .find_user(&UserRef::wallet(wallet))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user not found: {wallet}")))
    }

    async fn find_or_create_user(&self, wallet: &str) -> Result<User, EngineError> {
        if let Some(user) = self.store.find_user(&UserRef::wallet(wallet)).await? {
            return Ok(user);
        }
        let user = User::new(Some(wallet.to_string()));
        info!(wallet = %wallet, "creating user on first touch");
        self.store.insert_user(&user).await?;
        Ok(user)
    }

    /// Moves `points` into the squad aggregate and rechecks the tier, then
    /// announces the change on the bus.
    async fn transfer_points_in(
        &self,
        squad_id: &str,
        wallet: &str,
        points: i64,
        reason: &str,
    ) -> Result<(), EngineError> {
        if points == 0 {
            return Ok(());
        }
        self.store.increment_squad_points(squad_id, points).await?;
        if points > 0 {
            if let Err(err) = recheck_squad_tier(self.store.as_ref(), &self.config, squad_id).await
            {
                warn!(squad_id = %squad_id, error = %err, "squad tier recheck failed, continuing");
            }
        }
        publish_best_effort(
            self.publisher.as_ref(),
            self.config.publish_timeout,
            Topic::SquadPointsUpdated,
            &SquadPointsUpdated {
                squad_id: squad_id.to_string(),
                points_change: points,
                reason: reason.to_string(),
                timestamp: Utc::now(),
                responsible_user_id: wallet.to_string(),
            },
        )
        .await;
        Ok(())
    }

    async fn notify_members_joined(&self, squad: &Squad, new_member: &str, also_skip: Option<&str>) {
        for member in &squad.member_wallet_addresses {
            if member == new_member || Some(member.as_str()) == also_skip {
                continue;
            }
            notify_best_effort(
                self.notifier.as_ref(),
                Notification::new(
                    member,
                    NotificationKind::SquadMemberJoined,
                    "Member Joined",
                    format!("{new_member} joined {}", squad.name),
                )
                .about_squad(&squad.squad_id, &squad.name)
                .about_user(new_member),
            )
            .await;
        }
    }

    fn validate_squad_text(&self, name: &str, description: Option<&str>) -> Result<(), EngineError> {
        let length = name.chars().count();
        if length < self.config.squad_name_min_len || length > self.config.squad_name_max_len {
            return Err(EngineError::Validation(format!(
                "squad name must be {}-{} characters",
                self.config.squad_name_min_len, self.config.squad_name_max_len
            )));
        }
        let lowered_name = name.to_lowercase();
        let lowered_description = description.map(|d| d.to_lowercase());
        for word in &self.config.banned_squad_words {
            if lowered_name.contains(word.as_str())
                || lowered_description
                    .as_deref()
                    .is_some_and(|d| d.contains(word.as_str()))
            {
                return Err(EngineError::Validation(
                    "squad name or description contains a banned word".to_string(),
                ));
            }
        }
        Ok(())
    }
}
