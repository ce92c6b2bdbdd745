use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A team of users carrying an incrementally maintained aggregate point
/// total and a capacity tier derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Squad {
    pub squad_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub leader_wallet_address: String,
    pub member_wallet_addresses: Vec<String>,
    pub total_squad_points: i64,
    /// 0 means below the lowest tier threshold (ineligible).
    pub tier: u8,
    pub max_members: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Squad {
    /// New squad led (and solely populated) by `leader`, seeded with the
    /// leader's current points.
    pub fn new(
        name: String,
        description: Option<String>,
        leader_wallet: String,
        leader_points: i64,
        tier: u8,
        max_members: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            squad_id: Uuid::new_v4().to_string(),
            name,
            description,
            leader_wallet_address: leader_wallet.clone(),
            member_wallet_addresses: vec![leader_wallet],
            total_squad_points: leader_points,
            tier,
            max_members,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_member(&self, wallet: &str) -> bool {
        self.member_wallet_addresses.iter().any(|m| m == wallet)
    }

    pub fn is_full(&self) -> bool {
        self.member_wallet_addresses.len() as u32 >= self.max_members
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Revoked,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

/// An invitation for `invitee_wallet_address` to join a squad, created when
/// a user follows a squad's invite link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadInvitation {
    pub invitation_id: String,
    pub squad_id: String,
    pub squad_name: String,
    pub inviter_wallet_address: String,
    pub invitee_wallet_address: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SquadInvitation {
    pub fn new(squad: &Squad, invitee_wallet: String) -> Self {
        let now = Utc::now();
        Self {
            invitation_id: Uuid::new_v4().to_string(),
            squad_id: squad.squad_id.clone(),
            squad_name: squad.name.clone(),
            inviter_wallet_address: squad.leader_wallet_address.clone(),
            invitee_wallet_address: invitee_wallet,
            status: InvitationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_squad_contains_only_the_leader() {
        let squad = Squad::new("alpha".into(), None, "wallet-1".into(), 1200, 1, 10);
        assert_eq!(squad.member_wallet_addresses, vec!["wallet-1".to_string()]);
        assert_eq!(squad.leader_wallet_address, "wallet-1");
        assert_eq!(squad.total_squad_points, 1200);
        assert!(squad.is_member("wallet-1"));
        assert!(!squad.is_member("wallet-2"));
    }

    #[test]
    fn capacity_check_uses_max_members() {
        let mut squad = Squad::new("alpha".into(), None, "wallet-1".into(), 0, 1, 2);
        assert!(!squad.is_full());
        squad.member_wallet_addresses.push("wallet-2".into());
        assert!(squad.is_full());
    }

    #[test]
    fn invitation_inherits_squad_leader_as_inviter() {
        let squad = Squad::new("alpha".into(), None, "wallet-1".into(), 0, 1, 10);
        let invite = SquadInvitation::new(&squad, "wallet-9".into());
        assert_eq!(invite.inviter_wallet_address, "wallet-1");
        assert_eq!(invite.status, InvitationStatus::Pending);
        assert_eq!(invite.squad_name, "alpha");
    }
}
