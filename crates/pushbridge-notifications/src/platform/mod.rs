//! Native platform seam.
//!
//! The bridge never talks to the operating system directly. Everything it
//! needs is expressed as one of the traits below, implemented by the host
//! embedding (and by [`memory::InMemoryPlatform`] for tests and demos).
//!
//! Two generations of the notification API coexist:
//!
//! - [`LegacyNotificationApi`]: a synchronous settings object; the result of a
//!   registration arrives later through a "settings finalized" callback.
//! - [`ModernNotificationApi`]: an asynchronous authorization API.
//!
//! [`strategy`] wraps both behind one [`AuthorizationStrategy`](strategy::AuthorizationStrategy).

pub mod memory;
pub mod strategy;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::category::NotificationCategory;
use crate::channel::{ActionTarget, NotificationChannel};
use crate::codec::PermissionFlags;
use crate::types::NativeNotification;

// ─────────────────────────────────────────────────────────────────────────────
// Capability probe
// ─────────────────────────────────────────────────────────────────────────────

/// Reports which notification API generation the running platform offers.
///
/// Consulted on every call, never cached: the answer must be correct even when
/// asked very early in process lifetime.
#[cfg_attr(test, mockall::automock)]
pub trait CapabilityProbe: Send + Sync {
    /// True when the asynchronous authorization API is available.
    fn modern_api_available(&self) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy API
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of the legacy settings object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacySettings {
    /// Enabled notification types.
    pub types: PermissionFlags,
    /// Registered categories.
    pub categories: Vec<NotificationCategory>,
}

/// Legacy settings-object API.
pub trait LegacyNotificationApi: Send + Sync {
    /// Current settings, or `None` if the app never registered any.
    fn current_settings(&self) -> Option<LegacySettings>;

    /// Register settings. May show the OS prompt. The outcome is reported
    /// asynchronously through the settings-finalized callback.
    fn register_user_notification_settings(&self, settings: LegacySettings);
}

// ─────────────────────────────────────────────────────────────────────────────
// Modern API
// ─────────────────────────────────────────────────────────────────────────────

/// Authorization status reported by the modern API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// The user refused.
    Denied,
    /// The user allowed notifications.
    Authorized,
    /// Quiet delivery without an explicit prompt.
    Provisional,
}

impl AuthorizationStatus {
    /// Whether enabled settings actually apply.
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized | Self::Provisional)
    }
}

/// Snapshot of the modern notification settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModernSettings {
    /// Authorization status.
    pub status: AuthorizationStatus,
    /// Individually enabled capabilities.
    pub enabled: PermissionFlags,
}

/// A genuine error returned by the native authorization API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformFailure {
    /// Native error code.
    pub code: i64,
    /// Native error description.
    pub message: String,
}

/// Modern asynchronous authorization API.
#[async_trait]
pub trait ModernNotificationApi: Send + Sync {
    /// Current settings.
    async fn notification_settings(&self) -> ModernSettings;

    /// Replace the registered category set.
    fn set_categories(&self, categories: Vec<NotificationCategory>);

    /// Ask for exactly `flags`. `Ok(false)` means the user declined.
    async fn request_authorization(&self, flags: PermissionFlags) -> Result<bool, PlatformFailure>;

    /// Notifications still shown in the notification center.
    async fn delivered_notifications(&self) -> Vec<NativeNotification>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Application
// ─────────────────────────────────────────────────────────────────────────────

/// Application-level calls that are not tied to an API generation.
pub trait ApplicationApi: Send + Sync {
    /// Ask the OS for a device token; the result arrives via the router.
    fn register_for_remote_notifications(&self);

    /// Current icon badge number.
    fn badge_number(&self) -> i64;

    /// Set the icon badge number.
    fn set_badge_number(&self, value: i64);
}

/// Channel and action-target registration. Only some platforms have it.
pub trait ChannelApi: Send + Sync {
    /// Create or update notification channels.
    fn register_notification_channels(&self, channels: Vec<NotificationChannel>);

    /// Route the named notification actions to their targets.
    fn register_notification_actions(&self, targets: BTreeMap<String, ActionTarget>);
}

/// All native collaborators, bundled for handing to the bridge.
#[derive(Clone)]
pub struct NativePlatform {
    /// API generation probe.
    pub probe: Arc<dyn CapabilityProbe>,
    /// Legacy settings API.
    pub legacy: Arc<dyn LegacyNotificationApi>,
    /// Modern authorization API.
    pub modern: Arc<dyn ModernNotificationApi>,
    /// Application calls.
    pub application: Arc<dyn ApplicationApi>,
    /// Channel registration, where the platform has channels.
    pub channels: Option<Arc<dyn ChannelApi>>,
}

impl std::fmt::Debug for NativePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePlatform")
            .field("modern_api_available", &self.probe.modern_api_available())
            .field("channels", &self.channels.is_some())
            .finish_non_exhaustive()
    }
}
