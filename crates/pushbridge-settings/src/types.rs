//! Settings type definitions.
//!
//! All types use `camelCase` field names and `#[serde(default)]` so partial
//! JSON files only need to mention what they change.

use serde::{Deserialize, Serialize};

/// Root settings for the bridge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Log output configuration.
    pub logging: LoggingSettings,
    /// Outbound event delivery.
    pub events: EventSettings,
    /// Category and device registration behavior.
    pub registration: RegistrationSettings,
    /// Native API selection.
    pub platform: PlatformSettings,
    /// Pending completion handling.
    pub completions: CompletionSettings,
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Event fan-out configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSettings {
    /// Capacity of the broadcast channel to scripting-side listeners.
    pub channel_capacity: usize,
    /// Events kept while no listener is attached. Oldest are dropped first.
    pub missed_event_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            missed_event_capacity: 32,
        }
    }
}

/// How a raw device token is rendered in `deviceRegistered` events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenEncoding {
    /// Lowercase hex, two characters per byte.
    #[default]
    Hex,
    /// Standard base64 with padding.
    Base64,
}

/// Registration configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationSettings {
    /// Device token rendering.
    pub token_encoding: TokenEncoding,
    /// Add the built-in message and invite categories to every permission
    /// request.
    pub register_default_categories: bool,
}

/// Which native notification API generation to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSelection {
    /// Ask the capability probe on every call.
    #[default]
    Auto,
    /// Always use the settings-object API.
    Legacy,
    /// Always use the asynchronous authorization API.
    Modern,
}

/// Platform configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformSettings {
    /// API generation override.
    pub api: ApiSelection,
}

/// Pending completion configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionSettings {
    /// Resolve fetch/action completions right after emitting the event
    /// instead of waiting for the scripting side.
    pub auto_resolve: bool,
}
