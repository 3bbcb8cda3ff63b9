//! Outbound events to the scripting side.
//!
//! [`EventEmitter`] fans events out over a `tokio` broadcast channel. While no
//! listener is attached, events go into a bounded missed-event buffer instead
//! (oldest dropped first) and are handed over by
//! [`EventEmitter::receive_missed_events`].

use std::collections::VecDeque;

use parking_lot::Mutex;
use pushbridge_core::ids::CompletionHandle;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::codec::PermissionMap;

/// An event delivered to the scripting side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeEvent {
    /// A remote notification arrived, or the launch notification was replayed.
    NotificationReceived {
        /// Fetch completion to resolve; absent for replayed notifications.
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<CompletionHandle>,
        /// Notification payload, unmodified.
        payload: Map<String, Value>,
        /// Delivered while the app was in the foreground.
        foreground: bool,
    },
    /// The user picked a notification action.
    NotificationActionSelected {
        /// Action completion to resolve.
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<CompletionHandle>,
        /// Chosen action identifier.
        identifier: String,
        /// Notification payload.
        payload: Map<String, Value>,
        /// Text typed into a text-input action.
        #[serde(skip_serializing_if = "Option::is_none")]
        response_text: Option<String>,
    },
    /// The device obtained a push token.
    DeviceRegistered {
        /// Rendered token (hex or base64).
        token: String,
    },
    /// Push registration failed.
    DeviceRegistrationFailed {
        /// Error description.
        error: String,
    },
    /// Legacy settings registration finished.
    PermissionsSettingsFinalized {
        /// Enabled capabilities.
        permissions: PermissionMap,
    },
}

impl BridgeEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotificationReceived { .. } => "notificationReceived",
            Self::NotificationActionSelected { .. } => "notificationActionSelected",
            Self::DeviceRegistered { .. } => "deviceRegistered",
            Self::DeviceRegistrationFailed { .. } => "deviceRegistrationFailed",
            Self::PermissionsSettingsFinalized { .. } => "permissionsSettingsFinalized",
        }
    }
}

/// Broadcast emitter with a missed-event buffer.
#[derive(Debug)]
pub struct EventEmitter {
    tx: broadcast::Sender<BridgeEvent>,
    missed: Mutex<VecDeque<BridgeEvent>>,
    missed_capacity: usize,
}

impl EventEmitter {
    /// Create an emitter.
    pub fn new(channel_capacity: usize, missed_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            tx,
            missed: Mutex::new(VecDeque::with_capacity(missed_capacity)),
            missed_capacity,
        }
    }

    /// Deliver `event` to listeners, or buffer it if there are none.
    pub fn emit(&self, event: BridgeEvent) {
        // held across the count and the send so a concurrent
        // subscribe_with_missed either drains this event or receives it
        let mut missed = self.missed.lock();
        if self.tx.receiver_count() == 0 {
            self.buffer(&mut missed, event);
            return;
        }
        let name = event.name();
        match self.tx.send(event) {
            Ok(listeners) => debug!(event = name, listeners, "event emitted"),
            // last listener dropped between the count and the send
            Err(broadcast::error::SendError(event)) => self.buffer(&mut missed, event),
        }
    }

    /// Attach a listener.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Attach a listener and take everything buffered so far, in order.
    pub fn subscribe_with_missed(&self) -> (Vec<BridgeEvent>, broadcast::Receiver<BridgeEvent>) {
        let mut missed = self.missed.lock();
        let rx = self.tx.subscribe();
        (missed.drain(..).collect(), rx)
    }

    /// Take the buffered events, oldest first.
    pub fn receive_missed_events(&self) -> Vec<BridgeEvent> {
        self.missed.lock().drain(..).collect()
    }

    /// Number of buffered events.
    pub fn missed_len(&self) -> usize {
        self.missed.lock().len()
    }

    fn buffer(&self, missed: &mut VecDeque<BridgeEvent>, event: BridgeEvent) {
        if self.missed_capacity == 0 {
            warn!(event = event.name(), "no listener and buffering disabled, dropping event");
            return;
        }
        if missed.len() == self.missed_capacity {
            if let Some(dropped) = missed.pop_front() {
                warn!(event = dropped.name(), "missed-event buffer full, dropping oldest");
            }
        }
        debug!(event = event.name(), "no listener, buffering event");
        missed.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn registered(token: &str) -> BridgeEvent {
        BridgeEvent::DeviceRegistered {
            token: token.into(),
        }
    }

    #[test]
    fn event_wire_shape() {
        let event = BridgeEvent::NotificationActionSelected {
            handle: Some(CompletionHandle::from("h-1")),
            identifier: "respond".into(),
            payload: Map::new(),
            response_text: Some("on my way".into()),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "notificationActionSelected",
                "handle": "h-1",
                "identifier": "respond",
                "payload": {},
                "responseText": "on my way"
            })
        );
        assert_eq!(event.name(), "notificationActionSelected");
    }

    #[test]
    fn subscribing_with_missed_never_strands_events() {
        let expected: Vec<_> = (0..100).map(|i| registered(&i.to_string())).collect();
        for _ in 0..50 {
            let emitter = Arc::new(EventEmitter::new(256, 256));
            let producer = {
                let emitter = Arc::clone(&emitter);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        emitter.emit(registered(&i.to_string()));
                    }
                })
            };

            let (mut seen, mut rx) = emitter.subscribe_with_missed();
            producer.join().unwrap();
            while let Ok(event) = rx.try_recv() {
                seen.push(event);
            }

            assert_eq!(seen, expected);
            assert_eq!(emitter.missed_len(), 0);
        }
    }

    #[test]
    fn buffers_without_listener() {
        let emitter = EventEmitter::new(8, 4);
        emitter.emit(registered("a"));
        emitter.emit(registered("b"));
        assert_eq!(emitter.receive_missed_events(), vec![registered("a"), registered("b")]);
        assert_eq!(emitter.missed_len(), 0);
    }

    #[test]
    fn buffer_drops_oldest() {
        let emitter = EventEmitter::new(8, 2);
        for token in ["a", "b", "c"] {
            emitter.emit(registered(token));
        }
        assert_eq!(emitter.receive_missed_events(), vec![registered("b"), registered("c")]);
    }

    #[test]
    fn zero_capacity_buffer_drops() {
        let emitter = EventEmitter::new(8, 0);
        emitter.emit(registered("a"));
        assert_eq!(emitter.missed_len(), 0);
    }

    #[tokio::test]
    async fn listener_receives_live_events() {
        let emitter = EventEmitter::new(8, 4);
        let mut rx = emitter.subscribe();
        emitter.emit(registered("live"));
        assert_eq!(rx.recv().await.unwrap(), registered("live"));
        assert_eq!(emitter.missed_len(), 0);
    }

    #[tokio::test]
    async fn subscribe_with_missed_hands_over_backlog() {
        let emitter = EventEmitter::new(8, 4);
        emitter.emit(registered("early"));
        let (missed, mut rx) = emitter.subscribe_with_missed();
        emitter.emit(registered("late"));
        assert_eq!(missed, vec![registered("early")]);
        assert_eq!(rx.recv().await.unwrap(), registered("late"));
    }
}
