//! Outbound payload assembly.
//!
//! Turns a chat event into the publish payload push gateways understand:
//! `pn_apns` for APNs and `pn_gcm` for FCM/GCM. Each gateway section carries
//! a bridge payload (`cepayload`) with the sender, chat, event name, data, a
//! fresh envelope id and the category, so the receiving device can route the
//! notification back to the right chat.
//!
//! The formatter hook is consulted first; if it defers, the built-in layouts
//! for `message` and `$.invite` are used.

use pushbridge_core::ids::EnvelopeId;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::category::{INVITE_CATEGORY_ID, MESSAGE_CATEGORY_ID};
use crate::errors::{BridgeError, Result};
use crate::formatter::{FormatterSlot, OutboundEvent};

/// Event name for seen receipts.
pub const SEEN_EVENT: &str = "$.notifications.seen";

const CATEGORY_PREFIX: &str = "com.pushbridge.";

/// Which gateways get a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gateways {
    /// Apple push.
    pub apns: bool,
    /// Google push.
    pub gcm: bool,
}

impl Default for Gateways {
    fn default() -> Self {
        Self {
            apns: true,
            gcm: true,
        }
    }
}

/// Builds publish payloads for outbound chat events.
#[derive(Debug)]
pub struct PayloadAssembler<'a> {
    formatter: &'a FormatterSlot,
    gateways: Gateways,
    message_key: String,
}

impl<'a> PayloadAssembler<'a> {
    /// Assembler consulting `formatter`, targeting both gateways.
    pub fn new(formatter: &'a FormatterSlot) -> Self {
        Self {
            formatter,
            gateways: Gateways::default(),
            message_key: "message".to_string(),
        }
    }

    /// Restrict the gateways.
    #[must_use]
    pub fn with_gateways(mut self, gateways: Gateways) -> Self {
        self.gateways = gateways;
        self
    }

    /// Key of the message text inside `message` event data.
    #[must_use]
    pub fn with_message_key(mut self, key: impl Into<String>) -> Self {
        self.message_key = key.into();
        self
    }

    /// Build the publish payload for `event`.
    ///
    /// Events with no notification layout come back as the plain event
    /// payload.
    pub fn assemble(&self, event: &OutboundEvent) -> Result<Map<String, Value>> {
        validate(event)?;

        if event.event == SEEN_EVENT {
            return self.seen_receipt(event);
        }

        let sections = match self.formatter.apply(event) {
            Some(custom) => custom,
            None => self.default_sections(event)?,
        };
        if sections.is_empty() {
            debug!(event = %event.event, "no notification layout, publishing plain payload");
            return Ok(plain(event));
        }
        Ok(normalize(event, sections))
    }

    /// Build a silent receipt telling the user's other devices that the
    /// notification with `data.eid` was seen.
    pub fn seen_receipt(&self, event: &OutboundEvent) -> Result<Map<String, Value>> {
        validate(event)?;
        match event.data.get("eid") {
            Some(Value::String(eid)) if !eid.is_empty() => {}
            _ => return Err(BridgeError::malformed("seen receipt needs a non-empty 'eid'")),
        }

        let cepayload = json!({ "data": event.data });
        let mut sections = Map::new();
        if self.gateways.apns {
            let _ = sections.insert(
                "apns".into(),
                json!({ "aps": { "content-available": 1, "sound": "" }, "cepayload": cepayload }),
            );
        }
        if self.gateways.gcm {
            let _ = sections.insert("gcm".into(), json!({ "data": { "cepayload": cepayload } }));
        }
        Ok(normalize(event, sections))
    }

    fn default_sections(&self, event: &OutboundEvent) -> Result<Map<String, Value>> {
        let layout = match event.event.as_str() {
            "message" => {
                let Some(body) = event.data.get(&self.message_key).and_then(Value::as_str) else {
                    return Ok(Map::new());
                };
                Layout {
                    title: format!("{} sent a message in {}", event.sender, chat_name(&event.chat)),
                    body: body.to_string(),
                    ticker: "New chat message",
                    category: MESSAGE_CATEGORY_ID,
                    actions: None,
                }
            }
            "$.invite" => {
                let channel = event
                    .data
                    .get("channel")
                    .and_then(Value::as_str)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| BridgeError::malformed("invite event needs a 'channel'"))?;
                Layout {
                    title: format!("Invitation from {}", event.sender),
                    body: format!("{} invited you to join '{}'", event.sender, chat_name(channel)),
                    ticker: "New invitation to chat",
                    category: INVITE_CATEGORY_ID,
                    actions: Some(["Accept", "Ignore"]),
                }
            }
            _ => return Ok(Map::new()),
        };

        let mut sections = Map::new();
        if self.gateways.apns {
            let _ = sections.insert(
                "apns".into(),
                json!({ "aps": { "alert": { "title": layout.title, "body": layout.body } } }),
            );
        }
        if self.gateways.gcm {
            let mut data = json!({
                "contentTitle": layout.title,
                "contentText": layout.body,
                "ticker": layout.ticker,
                "category": layout.category,
            });
            if let Some(actions) = layout.actions {
                data["actions"] = json!(actions);
            }
            let _ = sections.insert("gcm".into(), json!({ "data": data }));
        }
        Ok(sections)
    }
}

struct Layout {
    title: String,
    body: String,
    ticker: &'static str,
    category: &'static str,
    actions: Option<[&'static str; 2]>,
}

fn validate(event: &OutboundEvent) -> Result<()> {
    for (name, value) in [
        ("event", &event.event),
        ("sender", &event.sender),
        ("chat", &event.chat),
    ] {
        if value.is_empty() {
            return Err(BridgeError::malformed(format!("outbound event has no {name}")));
        }
    }
    Ok(())
}

/// Category identifier for an event name: `$.invite` → `com.pushbridge.invite`.
pub fn category_for_event(event: &str) -> String {
    let name = event
        .strip_prefix("$.")
        .or_else(|| event.strip_prefix('$'))
        .unwrap_or(event);
    format!("{CATEGORY_PREFIX}{name}")
}

/// Last `#`-separated component of a chat channel.
pub fn chat_name(channel: &str) -> &str {
    channel.rsplit('#').next().unwrap_or(channel)
}

fn plain(event: &OutboundEvent) -> Map<String, Value> {
    let mut out = Map::new();
    let _ = out.insert("event".into(), event.event.clone().into());
    let _ = out.insert("sender".into(), event.sender.clone().into());
    let _ = out.insert("chat".into(), event.chat.clone().into());
    let _ = out.insert("data".into(), Value::Object(event.data.clone()));
    out
}

/// Stamp every gateway section with the bridge payload and rename it to its
/// `pn_` key. Non-gateway keys pass through untouched.
fn normalize(event: &OutboundEvent, sections: Map<String, Value>) -> Map<String, Value> {
    let eid = EnvelopeId::new();
    let mut out = plain(event);

    for (key, section) in sections {
        let gateway = match key.as_str() {
            "apns" => "apns",
            "gcm" => "gcm",
            _ => {
                let _ = out.insert(key, section);
                continue;
            }
        };
        let mut section = match section {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let existing = section
            .get("cepayload")
            .or_else(|| section.get("data").and_then(|d| d.get("cepayload")))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut data = event.data.clone();
        if let Some(Value::Object(extra)) = existing.get("data") {
            data.extend(extra.clone());
        }
        let mut category = existing
            .get("category")
            .and_then(Value::as_str)
            .map_or_else(|| category_for_event(&event.event), str::to_string);

        let holder = if gateway == "apns" { "aps" } else { "data" };
        let holder = section
            .entry(holder)
            .or_insert_with(|| Value::Object(Map::new()));
        if !holder.is_object() {
            *holder = Value::Object(Map::new());
        }
        if let Some(explicit) = holder.get("category").and_then(Value::as_str) {
            category = explicit.to_string();
        }
        holder["category"] = Value::String(category.clone());

        let cepayload = json!({
            "sender": event.sender,
            "chat": event.chat,
            "event": event.event,
            "data": data,
            "eid": eid,
            "category": category,
        });
        if gateway == "apns" {
            let _ = section.insert("cepayload".into(), cepayload);
        } else {
            holder["cepayload"] = cepayload;
        }

        let _ = out.insert(format!("pn_{gateway}"), Value::Object(section));
    }
    out
}
