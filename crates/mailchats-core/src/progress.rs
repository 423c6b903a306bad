//! Progress hub
//!
//! Fans campaign progress, log lines and theme changes out to every
//! connected WebSocket client.

use mailchats_common::types::CampaignId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 1024;

/// Severity of a log event shown in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Info,
    Success,
    Warning,
    Error,
}

/// Counters reported while a campaign runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Snapshot sent once when a campaign starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSnapshot {
    pub total: usize,
    pub sent: usize,
    pub success: usize,
    pub failed: usize,
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
}

/// Event pushed to WebSocket clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    #[serde(rename = "log", rename_all = "camelCase")]
    Log { message: String, log_type: LogType },

    #[serde(rename = "status", rename_all = "camelCase")]
    Status {
        campaign_id: CampaignId,
        #[serde(flatten)]
        update: StatusUpdate,
    },

    #[serde(rename = "campaignStatus", rename_all = "camelCase")]
    CampaignStatus {
        campaign_id: CampaignId,
        status: CampaignSnapshot,
    },

    #[serde(rename = "theme-changed")]
    ThemeChanged { theme: serde_json::Value },
}

impl ProgressEvent {
    pub fn log(message: impl Into<String>, log_type: LogType) -> Self {
        ProgressEvent::Log {
            message: message.into(),
            log_type,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::log(message, LogType::Info)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::log(message, LogType::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::log(message, LogType::Error)
    }

    pub fn status(campaign_id: CampaignId, update: StatusUpdate) -> Self {
        ProgressEvent::Status {
            campaign_id,
            update,
        }
    }
}

/// Broadcast hub for progress events
#[derive(Clone)]
pub struct ProgressHub {
    tx: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProgressHub {
    /// Create a hub that buffers up to `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Publishing with nobody listening is fine; the event is dropped.
    pub fn publish(&self, event: ProgressEvent) {
        match self.tx.send(event) {
            Ok(receivers) => trace!(receivers, "Progress event published"),
            Err(_) => trace!("Progress event dropped, no subscribers"),
        }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_log_event_json() {
        let event = ProgressEvent::info("WebSocket connected to server");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "log", "message": "WebSocket connected to server", "logType": "info"})
        );
    }

    #[test]
    fn test_status_event_json() {
        let event = ProgressEvent::status(
            7,
            StatusUpdate {
                total: Some(3),
                sent: Some(1),
                success: Some(1),
                failed: Some(0),
                completed: None,
            },
        );
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "status", "campaignId": 7, "total": 3, "sent": 1, "success": 1, "failed": 0})
        );

        let done = ProgressEvent::status(
            7,
            StatusUpdate {
                completed: Some(true),
                ..Default::default()
            },
        );
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({"type": "status", "campaignId": 7, "completed": true})
        );
    }

    #[test]
    fn test_campaign_status_and_theme_json() {
        let event = ProgressEvent::CampaignStatus {
            campaign_id: 2,
            status: CampaignSnapshot {
                total: 0,
                sent: 0,
                success: 0,
                failed: 0,
                start_time: 1_700_000_000_000,
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "campaignStatus",
                "campaignId": 2,
                "status": {"total": 0, "sent": 0, "success": 0, "failed": 0, "startTime": 1_700_000_000_000i64}
            })
        );

        let theme = ProgressEvent::ThemeChanged {
            theme: json!({"variant": "tint"}),
        };
        assert_eq!(
            serde_json::to_value(&theme).unwrap(),
            json!({"type": "theme-changed", "theme": {"variant": "tint"}})
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = ProgressHub::default();
        hub.publish(ProgressEvent::info("nobody home"));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let hub = ProgressHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish(ProgressEvent::info("one"));
        hub.publish(ProgressEvent::info("two"));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap(), ProgressEvent::info("one"));
            assert_eq!(rx.recv().await.unwrap(), ProgressEvent::info("two"));
        }
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_missed_events() {
        let hub = ProgressHub::new(2);
        let mut rx = hub.subscribe();
        for i in 0..5 {
            hub.publish(ProgressEvent::info(format!("event {}", i)));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::info("event 3"));
    }
}
