use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Notification categories surfaced to members on squad transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SquadInviteReceived,
    SquadInviteAccepted,
    SquadMemberJoined,
    SquadMemberLeft,
    SquadLeaderChanged,
    SquadDisbanded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SquadInviteReceived => "squad_invite_received",
            Self::SquadInviteAccepted => "squad_invite_accepted",
            Self::SquadMemberJoined => "squad_member_joined",
            Self::SquadMemberLeft => "squad_member_left",
            Self::SquadLeaderChanged => "squad_leader_changed",
            Self::SquadDisbanded => "squad_disbanded",
        }
    }
}

/// One notification addressed to a single user.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub notification_id: String,
    pub recipient_wallet_address: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_squad_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_squad_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_user_wallet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_invitation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_id: Uuid::new_v4().to_string(),
            recipient_wallet_address: recipient.into(),
            kind,
            title: title.into(),
            message: message.into(),
            related_squad_id: None,
            related_squad_name: None,
            related_user_wallet: None,
            related_invitation_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn about_squad(mut self, squad_id: impl Into<String>, squad_name: impl Into<String>) -> Self {
        self.related_squad_id = Some(squad_id.into());
        self.related_squad_name = Some(squad_name.into());
        self
    }

    pub fn about_user(mut self, wallet: impl Into<String>) -> Self {
        self.related_user_wallet = Some(wallet.into());
        self
    }

    pub fn about_invitation(mut self, invitation_id: impl Into<String>) -> Self {
        self.related_invitation_id = Some(invitation_id.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failure: {0}")]
    Delivery(String),
}

/// Fire-and-forget per-user notification sink. Failures never abort the
/// operation that produced the notification.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Sink that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Delivers a notification, logging and swallowing any failure.
pub async fn notify_best_effort(sink: &dyn NotificationSink, notification: Notification) {
    let kind = notification.kind;
    let recipient = notification.recipient_wallet_address.clone();
    if let Err(err) = sink.notify(notification).await {
        warn!(
            kind = kind.as_str(),
            recipient = %recipient,
            error = %err,
            "notification delivery failed, continuing"
        );
    }
}
