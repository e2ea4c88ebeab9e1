//! Outbound event notifications for UI-style collaborators.

use tokio::sync::broadcast;

use crate::store::AdRecord;

/// Capacity of the event broadcast channel. Slow subscribers that fall
/// further behind than this lose the oldest events, never block the core.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications emitted by the core as records change state.
#[derive(Debug, Clone)]
pub enum AdEvent {
    /// A new ad was registered
    Detected(AdRecord),
    /// A visit attempt is starting
    Attempt(AdRecord),
    /// A visit resolved, successfully or not; inspect `visited_ts`
    Visited(AdRecord),
}

/// Creates the broadcast channel the scheduler publishes on.
pub fn event_channel() -> broadcast::Sender<AdEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_subscriber() {
        let sender = event_channel();
        let mut receiver = sender.subscribe();

        let record: AdRecord = serde_json::from_str(
            r#"{"pageUrl": "https://x.com", "contentType": "text", "targetUrl": "https://y.com"}"#,
        )
        .unwrap();
        sender.send(AdEvent::Detected(record.clone())).unwrap();

        match receiver.recv().await.unwrap() {
            AdEvent::Detected(ad) => assert_eq!(ad.page_url, record.page_url),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_send_without_subscribers_is_not_fatal() {
        let sender = event_channel();
        let record: AdRecord = serde_json::from_str(
            r#"{"pageUrl": "https://x.com", "contentType": "text", "targetUrl": "https://y.com"}"#,
        )
        .unwrap();
        // send returns Err when nobody listens; callers ignore it
        assert!(sender.send(AdEvent::Attempt(record)).is_err());
    }
}
