//! # pushbridge-settings
//!
//! Configuration for the notification bridge, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`BridgeSettings::default()`]
//! 2. **User file**: `~/.pushbridge/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PUSHBRIDGE_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use pushbridge_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("token encoding: {:?}", settings.registration.token_encoding);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<BridgeSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// Loaded on first call; falls back to compiled defaults if the settings
/// file cannot be read or parsed.
pub fn get_settings() -> &'static BridgeSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns the value back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: BridgeSettings) -> std::result::Result<(), BridgeSettings> {
    SETTINGS.set(settings)
}
