//! Notification channels and action targets.
//!
//! Some platforms drop notifications that do not name a registered channel,
//! and route notification actions by name to a screen of the app instead of
//! using categories. Both arrive from the scripting side loosely typed and are
//! validated here, before anything reaches the native layer.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{BridgeError, Result};

/// Light color used when a channel does not set one.
pub const DEFAULT_LIGHT_COLOR: &str = "#00FF00";
/// Vibration pattern used when a channel does not set one, in milliseconds.
pub const DEFAULT_VIBRATION_PATTERN: [u64; 1] = [1000];

/// How intrusively a channel's notifications are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelImportance {
    /// Never shown.
    #[serde(rename = "importanceNone")]
    None,
    /// Shown only in the shade, below the fold.
    #[serde(rename = "importanceMin")]
    Min,
    /// Shown without sound.
    #[serde(rename = "importanceLow")]
    Low,
    /// Shown with sound.
    #[serde(rename = "importanceDefault")]
    Default,
    /// Shown with sound, peeking over the current screen.
    #[default]
    #[serde(rename = "importanceHigh")]
    High,
}

/// Wire-level channel descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelDescriptor {
    /// Unique channel id. Required.
    pub id: Option<String>,
    /// User-visible channel name. Required.
    pub name: Option<String>,
    /// Defaults to [`ChannelImportance::High`].
    pub importance: Option<ChannelImportance>,
    /// Defaults to `true`.
    pub vibration: Option<bool>,
    /// Alternating vibrate/pause timings. Must be non-empty if present.
    pub vibration_pattern: Option<Vec<u64>>,
    /// Defaults to `true`.
    pub lights: Option<bool>,
    /// `#RRGGBB`.
    pub light_color: Option<String>,
    /// Sound resource name.
    pub sound: Option<String>,
}

impl ChannelDescriptor {
    /// Descriptor with only the required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Validated channel, handed to the native layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    /// Channel id.
    pub id: String,
    /// User-visible name.
    pub name: String,
    /// Importance.
    pub importance: ChannelImportance,
    /// Whether notifications vibrate.
    pub vibration: bool,
    /// Vibration timings in milliseconds.
    pub vibration_pattern: Vec<u64>,
    /// Whether notifications blink the LED.
    pub lights: bool,
    /// LED color, `#RRGGBB`.
    pub light_color: String,
    /// Sound resource name.
    pub sound: Option<String>,
}

/// Where a notification action leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionTarget {
    /// The app's launcher screen (`"default"` on the wire).
    Launcher,
    /// Handle in the background, keeping the app closed (`"none"`).
    Background,
    /// A named screen of the app.
    Activity(String),
}

impl ActionTarget {
    fn parse(value: &str) -> Self {
        match value {
            "default" => Self::Launcher,
            "none" => Self::Background,
            other => Self::Activity(other.to_owned()),
        }
    }
}

fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(BridgeError::malformed(format!("{what} is required"))),
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate one channel descriptor and fill in defaults.
pub fn to_native_channel(descriptor: &ChannelDescriptor) -> Result<NotificationChannel> {
    let id = required(descriptor.id.as_deref(), "channel id")?;
    let name = required(descriptor.name.as_deref(), "name")
        .map_err(|_| BridgeError::malformed(format!("channel '{id}' has no name")))?;

    let vibration_pattern = match &descriptor.vibration_pattern {
        Some(pattern) if pattern.is_empty() => {
            return Err(BridgeError::malformed(format!(
                "channel '{id}' has an empty vibration pattern"
            )));
        }
        Some(pattern) => pattern.clone(),
        None => DEFAULT_VIBRATION_PATTERN.to_vec(),
    };

    let light_color = match descriptor.light_color.as_deref() {
        Some(color) if !is_hex_color(color) => {
            return Err(BridgeError::malformed(format!(
                "channel '{id}' light color '{color}' is not #RRGGBB"
            )));
        }
        Some(color) => color.to_owned(),
        None => DEFAULT_LIGHT_COLOR.to_owned(),
    };

    Ok(NotificationChannel {
        id: id.to_owned(),
        name: name.to_owned(),
        importance: descriptor.importance.unwrap_or_default(),
        vibration: descriptor.vibration.unwrap_or(true),
        vibration_pattern,
        lights: descriptor.lights.unwrap_or(true),
        light_color,
        sound: descriptor.sound.clone().filter(|s| !s.is_empty()),
    })
}

/// Validate a channel list. Ids must be unique.
pub fn to_native_channels(descriptors: &[ChannelDescriptor]) -> Result<Vec<NotificationChannel>> {
    let mut seen = HashSet::new();
    descriptors
        .iter()
        .map(|descriptor| {
            let channel = to_native_channel(descriptor)?;
            if !seen.insert(channel.id.clone()) {
                return Err(BridgeError::malformed(format!(
                    "channel '{}' listed more than once",
                    channel.id
                )));
            }
            Ok(channel)
        })
        .collect()
}

/// Validate an `{action name: target}` mapping.
///
/// Targets are `"default"`, `"none"` or a screen name.
pub fn to_action_targets(actions: &Map<String, Value>) -> Result<BTreeMap<String, ActionTarget>> {
    if actions.is_empty() {
        return Err(BridgeError::malformed("no notification actions given"));
    }
    actions
        .iter()
        .map(|(name, target)| {
            if name.is_empty() {
                return Err(BridgeError::malformed("action name is empty"));
            }
            match target.as_str() {
                Some(target) if !target.is_empty() => Ok((name.clone(), ActionTarget::parse(target))),
                _ => Err(BridgeError::malformed(format!(
                    "action '{name}' target must be a non-empty string"
                ))),
            }
        })
        .collect()
}
