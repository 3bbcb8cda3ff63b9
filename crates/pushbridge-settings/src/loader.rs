//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{ApiSelection, BridgeSettings, TokenEncoding};

/// Resolve the path to the settings file (`~/.pushbridge/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pushbridge").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BridgeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<BridgeSettings> {
    let defaults = serde_json::to_value(BridgeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

fn validate(settings: &BridgeSettings) -> Result<()> {
    // tokio's broadcast channel panics on zero capacity
    if settings.events.channel_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "events.channelCapacity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `PUSHBRIDGE_*` environment overrides.
///
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut BridgeSettings) {
    if let Some(v) = read_env_string("PUSHBRIDGE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_parsed("PUSHBRIDGE_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
    if let Some(v) = read_env_parsed("PUSHBRIDGE_EVENT_CAPACITY", |s| {
        parse_usize_range(s, 1, 65_536)
    }) {
        settings.events.channel_capacity = v;
    }
    if let Some(v) = read_env_parsed("PUSHBRIDGE_MISSED_EVENT_CAPACITY", |s| {
        parse_usize_range(s, 0, 65_536)
    }) {
        settings.events.missed_event_capacity = v;
    }
    if let Some(v) = read_env_parsed("PUSHBRIDGE_TOKEN_ENCODING", parse_token_encoding) {
        settings.registration.token_encoding = v;
    }
    if let Some(v) = read_env_parsed("PUSHBRIDGE_API", parse_api_selection) {
        settings.platform.api = v;
    }
    if let Some(v) = read_env_parsed("PUSHBRIDGE_AUTO_RESOLVE", parse_bool) {
        settings.completions.auto_resolve = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a boolean: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a token encoding name.
pub fn parse_token_encoding(val: &str) -> Option<TokenEncoding> {
    match val.to_lowercase().as_str() {
        "hex" => Some(TokenEncoding::Hex),
        "base64" => Some(TokenEncoding::Base64),
        _ => None,
    }
}

/// Parse an API selection name.
pub fn parse_api_selection(val: &str) -> Option<ApiSelection> {
    match val.to_lowercase().as_str() {
        "auto" => Some(ApiSelection::Auto),
        "legacy" => Some(ApiSelection::Legacy),
        "modern" => Some(ApiSelection::Modern),
        _ => None,
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_parsed<T>(name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let val = std::env::var(name).ok()?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"events": {"channelCapacity": 64, "missedEventCapacity": 32}});
        let source = serde_json::json!({"events": {"channelCapacity": 8}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["events"]["channelCapacity"], 8);
        assert_eq!(merged["events"]["missedEventCapacity"], 32);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.events, BridgeSettings::default().events);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"registration": {"tokenEncoding": "base64"}, "completions": {"autoResolve": true}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.registration.token_encoding, TokenEncoding::Base64);
        assert!(settings.completions.auto_resolve);
        assert!(!settings.registration.register_default_categories);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn load_zero_capacity_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"events": {"channelCapacity": 0}}"#).unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn load_wrong_enum_value_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"platform": {"api": "ancient"}}"#).unwrap();

        assert!(matches!(
            load_settings_from_path(&path).unwrap_err(),
            SettingsError::Json(_)
        ));
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_usize_range_bounds() {
        assert_eq!(parse_usize_range("1", 1, 10), Some(1));
        assert_eq!(parse_usize_range("0", 1, 10), None);
        assert_eq!(parse_usize_range("11", 1, 10), None);
        assert_eq!(parse_usize_range("x", 1, 10), None);
    }

    #[test]
    fn parse_enum_names() {
        assert_eq!(parse_token_encoding("Base64"), Some(TokenEncoding::Base64));
        assert_eq!(parse_token_encoding("b32"), None);
        assert_eq!(parse_api_selection("modern"), Some(ApiSelection::Modern));
        assert_eq!(parse_api_selection(""), None);
    }
}
