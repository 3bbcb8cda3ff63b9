//! Payload formatter hook.
//!
//! An optional, process-wide function that customizes outbound notification
//! payloads. The hook lives in an [`ArcSwapOption`]: installing or clearing it
//! is a single atomic swap, and every invocation works on the one hook it
//! loaded at the start.
//!
//! A hook that errors or panics never takes the payload down with it: the
//! failure is logged and the default payload is used.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::BridgeError;

/// Outbound chat event handed to the hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    /// Event name (`message`, `$.invite`, or anything custom).
    pub event: String,
    /// Sending user.
    pub sender: String,
    /// Chat channel the event was published to.
    pub chat: String,
    /// Event data.
    pub data: Map<String, Value>,
}

/// What a hook returns.
///
/// - `Ok(None)`: use the built-in formatting.
/// - `Ok(Some(map))`: per-gateway overrides under `apns` / `gcm`. An empty map
///   means "publish without a notification".
/// - `Err(reason)`: formatting failed; the built-in formatting is used.
pub type FormatterResult = Result<Option<Map<String, Value>>, String>;

/// An installed hook.
pub struct PayloadFormatter(Box<dyn Fn(&OutboundEvent) -> FormatterResult + Send + Sync>);

impl PayloadFormatter {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&OutboundEvent) -> FormatterResult + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }
}

impl std::fmt::Debug for PayloadFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadFormatter")
    }
}

/// Atomically swappable hook slot.
#[derive(Debug)]
pub struct FormatterSlot {
    current: ArcSwapOption<PayloadFormatter>,
}

impl Default for FormatterSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatterSlot {
    /// Empty slot.
    pub const fn new() -> Self {
        Self {
            current: ArcSwapOption::const_empty(),
        }
    }

    /// Install `formatter`, replacing any previous hook.
    pub fn install(&self, formatter: PayloadFormatter) {
        debug!("installing payload formatter");
        self.current.store(Some(Arc::new(formatter)));
    }

    /// Install or clear in one call.
    pub fn set(&self, formatter: Option<PayloadFormatter>) {
        match formatter {
            Some(formatter) => self.install(formatter),
            None => self.clear(),
        }
    }

    /// Remove the hook.
    pub fn clear(&self) {
        debug!("clearing payload formatter");
        self.current.store(None);
    }

    /// Whether a hook is installed.
    pub fn is_installed(&self) -> bool {
        self.current.load().is_some()
    }

    /// Run the hook, surfacing failures.
    ///
    /// `Ok(None)` when no hook is installed or the hook defers to the
    /// built-in formatting.
    pub fn try_apply(&self, event: &OutboundEvent) -> Result<Option<Map<String, Value>>, BridgeError> {
        let Some(formatter) = self.current.load_full() else {
            return Ok(None);
        };
        match catch_unwind(AssertUnwindSafe(|| (formatter.0)(event))) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(reason)) => Err(BridgeError::Formatter(reason)),
            Err(panic) => Err(BridgeError::Formatter(panic_message(panic.as_ref()))),
        }
    }

    /// Run the hook, falling back to the built-in formatting on failure.
    pub fn apply(&self, event: &OutboundEvent) -> Option<Map<String, Value>> {
        self.try_apply(event).unwrap_or_else(|error| {
            warn!(event = %event.event, error = %error, "payload formatter failed, using default payload");
            None
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

static GLOBAL: FormatterSlot = FormatterSlot::new();

/// The process-wide slot.
pub fn global() -> &'static FormatterSlot {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pushbridge_core::logging::capture_logs;
    use serde_json::json;
    use std::sync::Barrier;
    use tracing::Level;

    fn event() -> OutboundEvent {
        OutboundEvent {
            event: "message".into(),
            sender: "alice".into(),
            chat: "lobby".into(),
            data: Map::new(),
        }
    }

    fn titled(title: &str) -> PayloadFormatter {
        let title = title.to_string();
        PayloadFormatter::new(move |_| {
            Ok(json!({"apns": {"aps": {"alert": {"title": title.clone()}}}})
                .as_object()
                .cloned())
        })
    }

    #[test]
    fn empty_slot_defers() {
        let slot = FormatterSlot::new();
        assert!(!slot.is_installed());
        assert_eq!(slot.try_apply(&event()), Ok(None));
    }

    #[test]
    fn install_and_clear() {
        let slot = FormatterSlot::new();
        slot.install(titled("A"));
        let out = slot.apply(&event()).unwrap();
        assert_eq!(out["apns"]["aps"]["alert"]["title"], "A");

        slot.set(None);
        assert!(slot.apply(&event()).is_none());
    }

    #[test]
    fn hook_sees_event() {
        let slot = FormatterSlot::new();
        slot.install(PayloadFormatter::new(|e| {
            Ok(json!({"sender": e.sender, "chat": e.chat}).as_object().cloned())
        }));
        assert_eq!(
            Value::Object(slot.apply(&event()).unwrap()),
            json!({"sender": "alice", "chat": "lobby"})
        );
    }

    #[test]
    fn erroring_hook_falls_back() {
        let (logs, _guard) = capture_logs();
        let slot = FormatterSlot::new();
        slot.install(PayloadFormatter::new(|_| Err("bad template".into())));

        assert_matches!(slot.try_apply(&event()), Err(BridgeError::Formatter(r)) if r == "bad template");
        assert!(slot.apply(&event()).is_none());
        assert!(logs.has_event(Level::WARN, "payload formatter failed"));
    }

    #[test]
    fn panicking_hook_falls_back() {
        let slot = FormatterSlot::new();
        slot.install(PayloadFormatter::new(|_| panic!("boom")));
        assert_matches!(slot.try_apply(&event()), Err(BridgeError::Formatter(r)) if r.contains("boom"));
        assert!(slot.apply(&event()).is_none());
        // the slot survives a panicking hook
        assert!(slot.is_installed());
    }

    #[test]
    fn swap_during_invocation_keeps_loaded_hook() {
        let slot = Arc::new(FormatterSlot::new());
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        {
            let (entered, release) = (Arc::clone(&entered), Arc::clone(&release));
            slot.install(PayloadFormatter::new(move |_| {
                let _ = entered.wait();
                let _ = release.wait();
                Ok(json!({"apns": {"aps": {"alert": {"title": "old"}}}}).as_object().cloned())
            }));
        }

        let reader = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || slot.apply(&event()))
        };
        let _ = entered.wait();
        slot.install(titled("new"));
        let _ = release.wait();

        let out = reader.join().unwrap().unwrap();
        assert_eq!(out["apns"]["aps"]["alert"]["title"], "old");
        assert_eq!(slot.apply(&event()).unwrap()["apns"]["aps"]["alert"]["title"], "new");
    }
}
