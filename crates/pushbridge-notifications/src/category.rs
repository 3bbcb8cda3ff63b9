//! Category and action descriptors (wire side) and their native counterparts.
//!
//! Descriptors arrive from the scripting side as camelCase JSON and are
//! loosely typed: required fields are `Option` so that a missing identifier
//! becomes a [`BridgeError::MalformedDescriptor`](crate::errors::BridgeError)
//! from the translator rather than an opaque deserialization failure.

use serde::{Deserialize, Serialize};

/// Identifier of the built-in chat message category.
pub const MESSAGE_CATEGORY_ID: &str = "com.pushbridge.message";
/// Identifier of the built-in chat invitation category.
pub const INVITE_CATEGORY_ID: &str = "com.pushbridge.invite";

/// When a category's actions are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryContext {
    /// Full action list (alert style, companion view present).
    Default,
    /// Reduced action list (banner style).
    #[default]
    Minimal,
}

/// Whether choosing an action launches the app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// Bring the app to the foreground.
    Foreground,
    /// Handle the action in the background.
    #[default]
    Background,
}

/// How the action button behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionBehavior {
    /// Plain button.
    #[default]
    Default,
    /// Button that opens a text field; the typed text comes back as the
    /// action's response text.
    TextInput,
}

/// Text field configuration for [`ActionBehavior::TextInput`] actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextInputDescriptor {
    /// Send button title.
    pub title: Option<String>,
    /// Placeholder shown in the empty field.
    pub placeholder: Option<String>,
}

/// Wire-level action descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionDescriptor {
    /// Unique within the owning category. Required.
    pub identifier: Option<String>,
    /// Button title. Required.
    pub title: Option<String>,
    /// Shown with destructive styling.
    pub destructive: Option<bool>,
    /// Device must be unlocked.
    #[serde(alias = "authenticationRequired")]
    pub requires_authentication: Option<bool>,
    /// Choosing the action foregrounds the app.
    pub foreground: Option<bool>,
    /// Older spelling of `foreground`.
    pub activation_mode: Option<ActivationMode>,
    /// Button behavior.
    pub behavior: Option<ActionBehavior>,
    /// Text field configuration for text-input actions.
    pub text_input: Option<TextInputDescriptor>,
}

impl ActionDescriptor {
    /// Minimal descriptor with identifier and title.
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Mark the action as foregrounding the app.
    #[must_use]
    pub fn foreground(mut self) -> Self {
        self.foreground = Some(true);
        self
    }

    /// Mark the action as destructive.
    #[must_use]
    pub fn destructive(mut self) -> Self {
        self.destructive = Some(true);
        self
    }
}

/// Wire-level category descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryDescriptor {
    /// Unique within the registered set. Required.
    pub identifier: Option<String>,
    /// Actions in display order.
    pub actions: Vec<ActionDescriptor>,
    /// Display context.
    pub context: Option<CategoryContext>,
    /// Placeholder body for hidden previews. Must be non-empty if present.
    pub body_placeholder: Option<String>,
}

impl CategoryDescriptor {
    /// Descriptor with an identifier and actions.
    pub fn new(identifier: impl Into<String>, actions: Vec<ActionDescriptor>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            actions,
            ..Self::default()
        }
    }
}

bitflags::bitflags! {
    /// Native action options. Independent, not mutually exclusive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionOptions: u8 {
        /// Destructive styling.
        const DESTRUCTIVE = 1 << 0;
        /// Requires an unlocked device.
        const AUTHENTICATION_REQUIRED = 1 << 1;
        /// Foregrounds the app.
        const FOREGROUND = 1 << 2;
    }
}

/// Native text input configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    /// Send button title.
    pub button_title: Option<String>,
    /// Placeholder text.
    pub placeholder: Option<String>,
}

/// Native action, ready to hand to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    /// Action identifier.
    pub identifier: String,
    /// Button title.
    pub title: String,
    /// Option set.
    pub options: ActionOptions,
    /// Present for text-input actions.
    pub text_input: Option<TextInput>,
}

/// Native category, ready to hand to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCategory {
    /// Category identifier.
    pub identifier: String,
    /// Actions in display order.
    pub actions: Vec<NotificationAction>,
    /// Display context.
    pub context: CategoryContext,
    /// Placeholder body for hidden previews.
    pub body_placeholder: Option<String>,
}

/// Built-in category for chat messages: "Respond" and "Ignore".
pub fn message_category() -> CategoryDescriptor {
    CategoryDescriptor::new(
        MESSAGE_CATEGORY_ID,
        vec![
            ActionDescriptor::new("respond", "Respond").foreground(),
            ActionDescriptor::new("ignore", "Ignore").destructive(),
        ],
    )
}

/// Built-in category for chat invitations: "Accept" and "Ignore".
pub fn invite_category() -> CategoryDescriptor {
    CategoryDescriptor::new(
        INVITE_CATEGORY_ID,
        vec![
            ActionDescriptor::new("accept", "Accept").foreground(),
            ActionDescriptor::new("ignore", "Ignore").destructive(),
        ],
    )
}

/// Both built-in categories.
pub fn default_categories() -> Vec<CategoryDescriptor> {
    vec![message_category(), invite_category()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_descriptor_from_wire() {
        let action: ActionDescriptor = serde_json::from_value(json!({
            "identifier": "reply",
            "title": "Reply",
            "requiresAuthentication": true,
            "behavior": "textInput",
            "textInput": {"title": "Send", "placeholder": "Say something"}
        }))
        .unwrap();
        assert_eq!(action.identifier.as_deref(), Some("reply"));
        assert_eq!(action.requires_authentication, Some(true));
        assert_eq!(action.behavior, Some(ActionBehavior::TextInput));
        assert_eq!(
            action.text_input.unwrap().placeholder.as_deref(),
            Some("Say something")
        );
    }

    #[test]
    fn authentication_required_alias() {
        let action: ActionDescriptor =
            serde_json::from_value(json!({"authenticationRequired": true})).unwrap();
        assert_eq!(action.requires_authentication, Some(true));
    }

    #[test]
    fn category_descriptor_missing_fields_deserialize() {
        let category: CategoryDescriptor = serde_json::from_value(json!({})).unwrap();
        assert!(category.identifier.is_none());
        assert!(category.actions.is_empty());
        assert!(category.context.is_none());
    }

    #[test]
    fn category_context_wire_names() {
        let category: CategoryDescriptor =
            serde_json::from_value(json!({"identifier": "a", "context": "default"})).unwrap();
        assert_eq!(category.context, Some(CategoryContext::Default));
    }

    #[test]
    fn builtin_categories() {
        let message = message_category();
        assert_eq!(message.identifier.as_deref(), Some(MESSAGE_CATEGORY_ID));
        assert_eq!(message.actions.len(), 2);
        assert_eq!(message.actions[0].foreground, Some(true));
        assert_eq!(message.actions[1].destructive, Some(true));

        let invite = invite_category();
        assert_eq!(invite.identifier.as_deref(), Some(INVITE_CATEGORY_ID));
        assert_eq!(invite.actions[0].identifier.as_deref(), Some("accept"));
        assert_eq!(default_categories().len(), 2);
    }
}
