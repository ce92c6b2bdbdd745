use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Topics the award pipeline publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    UserPointsUpdated,
    SquadPointsUpdated,
    AssetMinted,
    UserReferred,
}

impl Topic {
    /// Routing key on the event bus.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserPointsUpdated => "user.points.updated",
            Self::SquadPointsUpdated => "squad.points.updated",
            Self::AssetMinted => "air.nft.minted",
            Self::UserReferred => "user.referred.success",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event transport failure: {0}")]
    Transport(String),

    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget pub/sub sink for domain events.
///
/// Delivery is at-least-once on a healthy bus; the award pipeline never
/// retries and never fails an operation because of a publish error.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: Topic, payload: Value) -> Result<(), PublishError>;
}

/// Publisher that drops every event, for wiring without a bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _topic: Topic, _payload: Value) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Serializes and publishes `payload` with a bounded timeout, logging and
/// swallowing every failure.
pub async fn publish_best_effort<T: Serialize>(
    publisher: &dyn EventPublisher,
    timeout: Duration,
    topic: Topic,
    payload: &T,
) {
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(topic = topic.as_str(), error = %err, "failed to serialize event payload");
            return;
        }
    };
    match tokio::time::timeout(timeout, publisher.publish(topic, value)).await {
        Ok(Ok(())) => debug!(topic = topic.as_str(), "event published"),
        Ok(Err(err)) => {
            warn!(topic = topic.as_str(), error = %err, "event publish failed, continuing")
        }
        Err(_) => warn!(
            topic = topic.as_str(),
            timeout_ms = timeout.as_millis() as u64,
            "event publish timed out, continuing"
        ),
    }
}

/// Payload for `user.points.updated`.
#[derive(Debug, Clone, Serialize)]
pub struct UserPointsUpdated {
    pub wallet_address: String,
    pub old_points: i64,
    pub new_points: i64,
    pub points_change: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Payload for `squad.points.updated`.
#[derive(Debug, Clone, Serialize)]
pub struct SquadPointsUpdated {
    pub squad_id: String,
    pub points_change: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub responsible_user_id: String,
}

/// Payload for `air.nft.minted`.
#[derive(Debug, Clone, Serialize)]
pub struct AssetMinted {
    pub wallet_address: String,
    pub tier_id: u8,
    pub tier_name: String,
    pub asset_id: String,
    pub points_spent: i64,
    pub tx_signature: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload for `user.referred.success`.
#[derive(Debug, Clone, Serialize)]
pub struct UserReferred {
    pub user_id: String,
    pub referred_by_user_id: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    struct SlowPublisher;

    #[async_trait]
    impl EventPublisher for SlowPublisher {
        async fn publish(&self, _topic: Topic, _payload: Value) -> Result<(), PublishError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct CountingPublisher {
        published: Arc<Mutex<Vec<Topic>>>,
    }

    #[async_trait]
    impl EventPublisher for CountingPublisher {
        async fn publish(&self, topic: Topic, _payload: Value) -> Result<(), PublishError> {
            self.published.lock().push(topic);
            Ok(())
        }
    }

    #[test]
    fn topic_routing_keys() {
        assert_eq!(Topic::UserPointsUpdated.as_str(), "user.points.updated");
        assert_eq!(Topic::AssetMinted.as_str(), "air.nft.minted");
        assert_eq!(Topic::UserReferred.as_str(), "user.referred.success");
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_publish_gives_up_on_timeout() {
        // Completes (instead of hanging) because the timeout fires
        publish_best_effort(
            &SlowPublisher,
            Duration::from_millis(100),
            Topic::UserPointsUpdated,
            &serde_json::json!({ "ok": true }),
        )
        .await;
    }

    #[tokio::test]
    async fn best_effort_publish_delivers_on_healthy_bus() {
        let published = Arc::new(Mutex::new(Vec::new()));
        let publisher = CountingPublisher {
            published: Arc::clone(&published),
        };
        publish_best_effort(
            &publisher,
            Duration::from_secs(1),
            Topic::SquadPointsUpdated,
            &serde_json::json!({ "squad_id": "s1" }),
        )
        .await;
        assert_eq!(published.lock().as_slice(), &[Topic::SquadPointsUpdated]);
    }
}
