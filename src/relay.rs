//! Capture relay between the capturing surface and the panel.
//!
//! The relay acknowledges a capture as soon as it is queued and hands it to
//! exactly one consumer. The consumer remembers recently seen event ids and
//! drops re-deliveries, so one capture event yields at most one store write.

use crate::domain::NewSnapshot;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Number of recent event ids the inbox remembers for duplicate suppression.
pub const SEEN_EVENT_CAPACITY: usize = 256;

/// One captured page in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub event_id: Uuid,
    pub page: NewSnapshot,
}

impl CaptureEvent {
    pub fn new(page: NewSnapshot) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            page,
        }
    }
}

/// Immediate acknowledgment returned to the capturing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayAck {
    pub success: bool,
    pub event_id: Uuid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("capture relay closed: no consumer is listening")]
    Closed,
}

/// Create a relay/inbox pair with room for `capacity` queued events.
pub fn channel(capacity: usize) -> (CaptureRelay, CaptureInbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        CaptureRelay { tx },
        CaptureInbox {
            rx,
            seen: HashSet::new(),
            order: VecDeque::new(),
        },
    )
}

/// Sending half, held by the surface that receives capture requests.
#[derive(Debug, Clone)]
pub struct CaptureRelay {
    tx: mpsc::Sender<CaptureEvent>,
}

impl CaptureRelay {
    /// Wrap `page` in a fresh event and forward it.
    pub async fn forward(&self, page: NewSnapshot) -> Result<RelayAck, RelayError> {
        self.deliver(CaptureEvent::new(page)).await
    }

    /// Forward an existing event. Delivering the same event twice is harmless.
    pub async fn deliver(&self, event: CaptureEvent) -> Result<RelayAck, RelayError> {
        let event_id = event.event_id;
        self.tx.send(event).await.map_err(|_| RelayError::Closed)?;
        debug!(event_id = %event_id, "Capture forwarded");
        Ok(RelayAck {
            success: true,
            event_id,
        })
    }
}

/// Receiving half. There is exactly one per relay.
#[derive(Debug)]
pub struct CaptureInbox {
    rx: mpsc::Receiver<CaptureEvent>,
    seen: HashSet<Uuid>,
    order: VecDeque<Uuid>,
}

impl CaptureInbox {
    /// Next event not seen before, or `None` once every relay handle is dropped.
    pub async fn recv(&mut self) -> Option<CaptureEvent> {
        loop {
            let event = self.rx.recv().await?;
            if self.remember(event.event_id) {
                return Some(event);
            }
            warn!(event_id = %event.event_id, "Suppressed duplicate capture event");
        }
    }

    fn remember(&mut self, event_id: Uuid) -> bool {
        if !self.seen.insert(event_id) {
            return false;
        }
        self.order.push_back(event_id);
        if self.order.len() > SEEN_EVENT_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title: &str) -> NewSnapshot {
        NewSnapshot::new(title, "http://a.test", "")
    }

    #[tokio::test]
    async fn test_forward_acks_before_consumption() {
        let (relay, mut inbox) = channel(4);
        let ack = relay.forward(page("A")).await.unwrap();
        assert!(ack.success);

        let event = inbox.recv().await.unwrap();
        assert_eq!(event.event_id, ack.event_id);
        assert_eq!(event.page.title, "A");
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_suppressed() {
        let (relay, mut inbox) = channel(4);
        let event = CaptureEvent::new(page("A"));
        relay.deliver(event.clone()).await.unwrap();
        relay.deliver(event.clone()).await.unwrap();
        relay.forward(page("B")).await.unwrap();
        drop(relay);

        assert_eq!(inbox.recv().await.unwrap().page.title, "A");
        assert_eq!(inbox.recv().await.unwrap().page.title, "B");
        assert!(inbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_forward_after_inbox_dropped_fails() {
        let (relay, inbox) = channel(1);
        drop(inbox);
        assert_eq!(relay.forward(page("A")).await, Err(RelayError::Closed));
    }

    #[test]
    fn test_seen_ids_are_bounded() {
        let (_relay, mut inbox) = channel(1);
        let first = Uuid::new_v4();
        assert!(inbox.remember(first));
        for _ in 0..SEEN_EVENT_CAPACITY {
            inbox.remember(Uuid::new_v4());
        }
        assert_eq!(inbox.seen.len(), SEEN_EVENT_CAPACITY);
        // Evicted ids are accepted again.
        assert!(inbox.remember(first));
    }

    #[test]
    fn test_ack_serializes_camel_case() {
        let ack = RelayAck {
            success: true,
            event_id: Uuid::nil(),
        };
        let json = serde_json::to_value(ack).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["eventId"], "00000000-0000-0000-0000-000000000000");
    }
}
