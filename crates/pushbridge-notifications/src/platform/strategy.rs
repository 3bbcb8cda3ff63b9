//! Authorization strategies.
//!
//! [`AuthorizationStrategy`] hides the API generation from the permission
//! manager. A strategy is selected per call by [`select_strategy`]; nothing
//! about the platform is cached between calls.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pushbridge_settings::ApiSelection;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{LegacyNotificationApi, LegacySettings, ModernNotificationApi, NativePlatform};
use crate::category::NotificationCategory;
use crate::codec::{PermissionFlags, flag_names};
use crate::errors::BridgeError;
use crate::translator::merge_categories;

/// Result of a status check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionStatus {
    /// Currently granted capabilities.
    pub granted: PermissionFlags,
    /// Whether the user was ever asked.
    pub previously_requested: bool,
}

/// Terminal state of a native authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The user allowed the requested capabilities.
    Granted,
    /// The user declined. Not an error.
    Denied,
    /// The platform reported a genuine error.
    Failed(BridgeError),
}

/// One API generation's permission and category operations.
#[async_trait]
pub trait AuthorizationStrategy: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Query the current authorization status.
    async fn check_status(&self) -> PermissionStatus;

    /// Register categories without prompting.
    async fn register_categories(&self, categories: Vec<NotificationCategory>);

    /// Register `categories` and prompt for exactly `flags`.
    async fn request_authorization(
        &self,
        flags: PermissionFlags,
        categories: Vec<NotificationCategory>,
    ) -> AuthorizationOutcome;
}

/// Whether calls go to the modern API. An explicit `legacy`/`modern`
/// selection wins over the probe.
pub fn uses_modern_api(platform: &NativePlatform, selection: ApiSelection) -> bool {
    match selection {
        ApiSelection::Auto => platform.probe.modern_api_available(),
        ApiSelection::Legacy => false,
        ApiSelection::Modern => true,
    }
}

/// Pick the strategy for this call.
pub fn select_strategy(
    platform: &NativePlatform,
    selection: ApiSelection,
    waiter: &Arc<SettingsWaiter>,
) -> Box<dyn AuthorizationStrategy> {
    if uses_modern_api(platform, selection) {
        Box::new(ModernStrategy::new(Arc::clone(&platform.modern)))
    } else {
        Box::new(LegacyStrategy::new(
            Arc::clone(&platform.legacy),
            Arc::clone(waiter),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings waiter
// ─────────────────────────────────────────────────────────────────────────────

/// One-slot rendezvous between a legacy request and the settings-finalized
/// callback that answers it.
#[derive(Debug, Default)]
pub struct SettingsWaiter {
    slot: Mutex<Option<oneshot::Sender<PermissionFlags>>>,
}

impl SettingsWaiter {
    /// Create an empty waiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh waiter. A stale one left behind is dropped.
    pub fn arm(&self) -> oneshot::Receiver<PermissionFlags> {
        let (tx, rx) = oneshot::channel();
        if self.slot.lock().replace(tx).is_some() {
            warn!("replacing stale settings waiter");
        }
        rx
    }

    /// Deliver finalized settings. Returns false when nobody was waiting.
    pub fn finalize(&self, flags: PermissionFlags) -> bool {
        match self.slot.lock().take() {
            Some(tx) => tx.send(flags).is_ok(),
            None => false,
        }
    }

    /// Whether a request is waiting for finalized settings.
    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy for the legacy settings-object API.
///
/// Both registration paths wait for the settings-finalized callback that
/// answers them, so the host must route that callback to
/// [`SettingsWaiter::finalize`] (through the manager or the router).
///
/// Category registration reads the live settings and writes back the merged
/// set. That read-modify-write is not atomic with respect to other code
/// registering settings on the same process.
pub struct LegacyStrategy {
    api: Arc<dyn LegacyNotificationApi>,
    waiter: Arc<SettingsWaiter>,
}

impl LegacyStrategy {
    /// Wrap the legacy API.
    pub fn new(api: Arc<dyn LegacyNotificationApi>, waiter: Arc<SettingsWaiter>) -> Self {
        Self { api, waiter }
    }

    fn merged_with_current(
        &self,
        categories: Vec<NotificationCategory>,
    ) -> (Option<PermissionFlags>, Vec<NotificationCategory>) {
        match self.api.current_settings() {
            Some(current) => (
                Some(current.types),
                merge_categories(current.categories, categories),
            ),
            None => (None, categories),
        }
    }
}

#[async_trait]
impl AuthorizationStrategy for LegacyStrategy {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn check_status(&self) -> PermissionStatus {
        match self.api.current_settings() {
            Some(settings) => PermissionStatus {
                granted: settings.types,
                previously_requested: true,
            },
            None => PermissionStatus::default(),
        }
    }

    async fn register_categories(&self, categories: Vec<NotificationCategory>) {
        let (types, categories) = self.merged_with_current(categories);
        debug!(count = categories.len(), "legacy category registration");
        // every registration is answered by a settings-finalized callback;
        // it must land before the flow ends or it answers the next request
        let finalized = self.waiter.arm();
        self.api.register_user_notification_settings(LegacySettings {
            types: types.unwrap_or_default(),
            categories,
        });
        if finalized.await.is_err() {
            warn!("settings waiter dropped before category registration finalized");
        }
    }

    async fn request_authorization(
        &self,
        flags: PermissionFlags,
        categories: Vec<NotificationCategory>,
    ) -> AuthorizationOutcome {
        let (_, categories) = self.merged_with_current(categories);
        // armed before registering: the callback may fire synchronously
        let finalized = self.waiter.arm();
        self.api.register_user_notification_settings(LegacySettings {
            types: flags,
            categories,
        });

        match finalized.await {
            Ok(types) => {
                info!(granted = ?flag_names(types), "legacy settings finalized");
                if types.intersects(flags) {
                    AuthorizationOutcome::Granted
                } else {
                    AuthorizationOutcome::Denied
                }
            }
            Err(_) => AuthorizationOutcome::Failed(BridgeError::Internal(
                "settings waiter dropped before finalization".into(),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Modern
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy for the asynchronous authorization API.
///
/// Registering categories replaces the whole set.
pub struct ModernStrategy {
    api: Arc<dyn ModernNotificationApi>,
}

impl ModernStrategy {
    /// Wrap the modern API.
    pub fn new(api: Arc<dyn ModernNotificationApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AuthorizationStrategy for ModernStrategy {
    fn name(&self) -> &'static str {
        "modern"
    }

    async fn check_status(&self) -> PermissionStatus {
        let settings = self.api.notification_settings().await;
        PermissionStatus {
            granted: if settings.status.is_authorized() {
                settings.enabled
            } else {
                PermissionFlags::empty()
            },
            previously_requested: settings.status != super::AuthorizationStatus::NotDetermined,
        }
    }

    async fn register_categories(&self, categories: Vec<NotificationCategory>) {
        debug!(count = categories.len(), "modern category registration");
        self.api.set_categories(categories);
    }

    async fn request_authorization(
        &self,
        flags: PermissionFlags,
        categories: Vec<NotificationCategory>,
    ) -> AuthorizationOutcome {
        self.api.set_categories(categories);
        match self.api.request_authorization(flags).await {
            Ok(true) => AuthorizationOutcome::Granted,
            Ok(false) => AuthorizationOutcome::Denied,
            Err(failure) => {
                warn!(code = failure.code, message = %failure.message, "authorization request failed");
                AuthorizationOutcome::Failed(BridgeError::Platform {
                    code: failure.code,
                    message: failure.message,
                })
            }
        }
    }
}
