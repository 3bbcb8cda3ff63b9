//! Category translator.
//!
//! Converts wire descriptors into native categories/actions, native
//! notifications into wire mappings, and fetch-result tokens into
//! [`FetchResult`]. Validation happens here so malformed input never
//! reaches the platform.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::category::{
    ActionBehavior, ActionDescriptor, ActionOptions, ActivationMode, CategoryDescriptor,
    NotificationAction, NotificationCategory, TextInput,
};
use crate::errors::{BridgeError, Result};
use crate::types::{FetchResult, NativeNotification};

/// Translate a category descriptor.
///
/// Fails if the identifier is missing or empty, the body placeholder is
/// empty, an action is malformed, or two actions share an identifier.
pub fn to_native_category(descriptor: &CategoryDescriptor) -> Result<NotificationCategory> {
    let identifier = required(descriptor.identifier.as_deref(), "category identifier")?;

    if descriptor.body_placeholder.as_deref() == Some("") {
        return Err(BridgeError::malformed(format!(
            "category '{identifier}' has an empty body placeholder"
        )));
    }

    let mut seen = HashSet::with_capacity(descriptor.actions.len());
    let mut actions = Vec::with_capacity(descriptor.actions.len());
    for action in &descriptor.actions {
        let action = to_native_action(action)?;
        if !seen.insert(action.identifier.clone()) {
            return Err(BridgeError::malformed(format!(
                "category '{identifier}' has duplicate action '{}'",
                action.identifier
            )));
        }
        actions.push(action);
    }

    Ok(NotificationCategory {
        identifier: identifier.to_owned(),
        actions,
        context: descriptor.context.unwrap_or_default(),
        body_placeholder: descriptor.body_placeholder.clone(),
    })
}

/// Translate an action descriptor. Options default to all-false.
pub fn to_native_action(descriptor: &ActionDescriptor) -> Result<NotificationAction> {
    let identifier = required(descriptor.identifier.as_deref(), "action identifier")?;
    let title = required(descriptor.title.as_deref(), "action title")
        .map_err(|_| BridgeError::malformed(format!("action '{identifier}' has no title")))?;

    let mut options = ActionOptions::empty();
    options.set(
        ActionOptions::DESTRUCTIVE,
        descriptor.destructive.unwrap_or(false),
    );
    options.set(
        ActionOptions::AUTHENTICATION_REQUIRED,
        descriptor.requires_authentication.unwrap_or(false),
    );
    options.set(
        ActionOptions::FOREGROUND,
        descriptor.foreground.unwrap_or(false)
            || descriptor.activation_mode == Some(ActivationMode::Foreground),
    );

    let text_input = (descriptor.behavior == Some(ActionBehavior::TextInput)).then(|| {
        let input = descriptor.text_input.clone().unwrap_or_default();
        TextInput {
            button_title: input.title,
            placeholder: input.placeholder,
        }
    });

    Ok(NotificationAction {
        identifier: identifier.to_owned(),
        title: title.to_owned(),
        options,
        text_input,
    })
}

/// Translate a batch of categories for one registration call.
///
/// A batch may not name the same category twice.
pub fn to_native_categories(descriptors: &[CategoryDescriptor]) -> Result<Vec<NotificationCategory>> {
    let mut seen = HashSet::with_capacity(descriptors.len());
    descriptors
        .iter()
        .map(|descriptor| {
            let category = to_native_category(descriptor)?;
            if seen.insert(category.identifier.clone()) {
                Ok(category)
            } else {
                Err(BridgeError::malformed(format!(
                    "category '{}' listed more than once",
                    category.identifier
                )))
            }
        })
        .collect()
}

/// Union of `existing` and `incoming`: incoming categories replace existing
/// ones with the same identifier wholesale, the rest are kept.
pub fn merge_categories(
    existing: Vec<NotificationCategory>,
    incoming: Vec<NotificationCategory>,
) -> Vec<NotificationCategory> {
    let replaced: HashSet<&str> = incoming.iter().map(|c| c.identifier.as_str()).collect();
    let mut merged: Vec<NotificationCategory> = existing
        .into_iter()
        .filter(|c| !replaced.contains(c.identifier.as_str()))
        .collect();
    merged.extend(incoming);
    merged
}

/// Shape a native notification for the scripting side.
///
/// Returns `None` for an empty native object.
pub fn from_native_notification(notification: &NativeNotification) -> Option<Map<String, Value>> {
    if notification.is_empty() {
        return None;
    }

    let content = &notification.content;
    let mut out = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            let _ = out.insert(key.to_owned(), value);
        }
    };

    put(
        "identifier",
        (!notification.identifier.is_empty()).then(|| notification.identifier.clone().into()),
    );
    put("date", notification.date.map(|d| d.to_rfc3339().into()));
    put("title", content.title.clone().map(Value::from));
    put("subtitle", content.subtitle.clone().map(Value::from));
    put("body", content.body.clone().map(Value::from));
    put(
        "categoryIdentifier",
        content.category_identifier.clone().map(Value::from),
    );
    put(
        "threadIdentifier",
        content.thread_identifier.clone().map(Value::from),
    );
    put("badge", content.badge.map(Value::from));
    put("userInfo", Some(Value::Object(content.user_info.clone())));

    Some(out)
}

/// Map a scripting-side fetch token to a [`FetchResult`].
///
/// Case-sensitive. Anything unrecognized, including an absent token, is
/// `NoData`.
pub fn fetch_result_from_token(token: Option<&str>) -> FetchResult {
    match token {
        Some("newData") => FetchResult::NewData,
        Some("failed") => FetchResult::Failed,
        _ => FetchResult::NoData,
    }
}

fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BridgeError::malformed(format!("{what} is missing"))),
    }
}
