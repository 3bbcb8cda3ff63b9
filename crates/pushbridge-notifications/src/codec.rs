//! Permission codec: wire mapping ⇄ bitfield.
//!
//! The wire form is a JSON object keyed by flag name (`alert`, `badge`,
//! `sound`). Only truthy entries count; unknown keys are ignored. An empty
//! object decodes to *every* flag, which is what "no preference given"
//! means to the scripting side.

use serde_json::{Map, Value};

bitflags::bitflags! {
    /// Notification capabilities the app may hold.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PermissionFlags: u8 {
        /// Show alert banners.
        const ALERT = 1 << 0;
        /// Update the app icon badge.
        const BADGE = 1 << 1;
        /// Play sounds.
        const SOUND = 1 << 2;
    }
}

/// Wire-level permission mapping.
pub type PermissionMap = Map<String, Value>;

const NAMED_FLAGS: [(&str, PermissionFlags); 3] = [
    ("alert", PermissionFlags::ALERT),
    ("badge", PermissionFlags::BADGE),
    ("sound", PermissionFlags::SOUND),
];

/// Decode a wire mapping into flags.
pub fn decode(mapping: &PermissionMap) -> PermissionFlags {
    if mapping.is_empty() {
        return PermissionFlags::all();
    }
    NAMED_FLAGS
        .iter()
        .filter(|(name, _)| mapping.get(*name).is_some_and(is_truthy))
        .fold(PermissionFlags::empty(), |acc, (_, flag)| acc | *flag)
}

/// Encode flags as a wire mapping. Unset flags are omitted, not `false`.
pub fn encode(flags: PermissionFlags) -> PermissionMap {
    NAMED_FLAGS
        .iter()
        .filter(|(_, flag)| flags.contains(*flag))
        .map(|(name, _)| ((*name).to_string(), Value::Bool(true)))
        .collect()
}

/// Names of the set flags, in declaration order. Used for log fields.
pub fn flag_names(flags: PermissionFlags) -> Vec<&'static str> {
    NAMED_FLAGS
        .iter()
        .filter(|(_, flag)| flags.contains(*flag))
        .map(|(name, _)| *name)
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> PermissionMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_mapping_decodes_to_all() {
        assert_eq!(decode(&PermissionMap::new()), PermissionFlags::all());
    }

    #[test]
    fn single_flag_decodes_to_single_bit() {
        assert_eq!(decode(&map(json!({"alert": true}))), PermissionFlags::ALERT);
    }

    #[test]
    fn explicit_false_decodes_to_nothing() {
        let flags = decode(&map(json!({"alert": false, "badge": false, "sound": false})));
        assert!(flags.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let flags = decode(&map(json!({"sound": true, "vibrate": true})));
        assert_eq!(flags, PermissionFlags::SOUND);
    }

    #[test]
    fn only_unknown_keys_is_not_empty_mapping() {
        assert!(decode(&map(json!({"vibrate": true}))).is_empty());
    }

    #[test]
    fn truthy_values() {
        let flags = decode(&map(json!({"alert": 1, "badge": "yes", "sound": 0})));
        assert_eq!(flags, PermissionFlags::ALERT | PermissionFlags::BADGE);
        assert!(decode(&map(json!({"alert": null, "badge": ""}))).is_empty());
    }

    #[test]
    fn encode_omits_unset_flags() {
        let encoded = encode(PermissionFlags::BADGE);
        assert_eq!(Value::Object(encoded), json!({"badge": true}));
    }

    #[test]
    fn encode_empty_is_empty_mapping() {
        assert!(encode(PermissionFlags::empty()).is_empty());
    }

    #[test]
    fn flag_names_in_order() {
        assert_eq!(
            flag_names(PermissionFlags::SOUND | PermissionFlags::ALERT),
            vec!["alert", "sound"]
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn entry() -> impl Strategy<Value = Option<bool>> {
            prop_oneof![Just(None), Just(Some(true)), Just(Some(false))]
        }

        proptest! {
            #[test]
            fn decode_encode_roundtrip(bits in 0u8..8) {
                let flags = PermissionFlags::from_bits_truncate(bits);
                prop_assert_eq!(decode(&encode(flags)), if flags.is_empty() {
                    // an empty encoding is the empty mapping, which means "all"
                    PermissionFlags::all()
                } else {
                    flags
                });
            }

            #[test]
            fn encode_decode_keeps_only_true(alert in entry(), badge in entry(), sound in entry()) {
                let mut mapping = PermissionMap::new();
                for (name, value) in [("alert", alert), ("badge", badge), ("sound", sound)] {
                    if let Some(v) = value {
                        let _ = mapping.insert(name.to_string(), Value::Bool(v));
                    }
                }
                prop_assume!(!mapping.is_empty());

                let expected: PermissionMap = mapping
                    .iter()
                    .filter(|(_, v)| **v == Value::Bool(true))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                prop_assert_eq!(encode(decode(&mapping)), expected);
            }
        }
    }
}
