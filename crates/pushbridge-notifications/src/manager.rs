//! Permission manager.
//!
//! Owns the check and request flows. Flows are serialized: a call made while
//! another is in flight waits for it to finish (FIFO) and never interleaves
//! with it. The strategy is chosen at the start of every flow.

use std::sync::Arc;

use parking_lot::RwLock;
use pushbridge_settings::ApiSelection;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::category::{CategoryDescriptor, NotificationCategory, default_categories};
use crate::codec::{PermissionFlags, PermissionMap, encode, flag_names};
use crate::errors::{BridgeError, Result, WireError};
use crate::platform::NativePlatform;
use crate::platform::strategy::{
    AuthorizationOutcome, AuthorizationStrategy, PermissionStatus, SettingsWaiter, select_strategy,
};
use crate::translator::to_native_categories;

/// Observable state of the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlowState {
    /// No flow in flight.
    #[default]
    Idle,
    /// A status check is in flight.
    Checking,
    /// A permission request is in flight.
    Requesting,
}

/// Result of `check_permissions` in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionReport {
    /// Granted capabilities; only `true` entries are present.
    pub permissions: PermissionMap,
    /// Whether the user was ever asked.
    pub previously_requested: bool,
}

impl From<PermissionStatus> for PermissionReport {
    fn from(status: PermissionStatus) -> Self {
        Self {
            permissions: encode(status.granted),
            previously_requested: status.previously_requested,
        }
    }
}

/// Result of `request_permissions`.
///
/// Success is `granted` with neither `rejected_by_user` nor `error` set. On
/// failure at most one of the two is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionRequestOutcome {
    /// Requested capabilities are available.
    pub granted: bool,
    /// The user declined the prompt.
    pub rejected_by_user: bool,
    /// Validation or platform error.
    pub error: Option<BridgeError>,
}

impl PermissionRequestOutcome {
    /// Successful request.
    pub fn granted() -> Self {
        Self {
            granted: true,
            ..Self::default()
        }
    }

    /// The user said no.
    pub fn rejected() -> Self {
        Self {
            rejected_by_user: true,
            ..Self::default()
        }
    }

    /// The request failed with `error`.
    pub fn failed(error: BridgeError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Collapse into a `Result`, mapping refusal to [`BridgeError::PlatformDenied`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Self { granted: true, .. } => Ok(()),
            Self {
                rejected_by_user: true,
                ..
            } => Err(BridgeError::PlatformDenied),
            Self { error, .. } => Err(error.unwrap_or_else(|| {
                BridgeError::Internal("request failed without a reason".into())
            })),
        }
    }

    /// Wire form for the scripting side.
    pub fn to_wire(&self) -> WireRequestOutcome {
        WireRequestOutcome {
            granted: self.granted,
            rejected: self.rejected_by_user,
            error: self.error.as_ref().map(BridgeError::to_wire),
        }
    }
}

impl From<AuthorizationOutcome> for PermissionRequestOutcome {
    fn from(outcome: AuthorizationOutcome) -> Self {
        match outcome {
            AuthorizationOutcome::Granted => Self::granted(),
            AuthorizationOutcome::Denied => Self::rejected(),
            AuthorizationOutcome::Failed(error) => Self::failed(error),
        }
    }
}

/// Serializable [`PermissionRequestOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequestOutcome {
    /// See [`PermissionRequestOutcome::granted`].
    pub granted: bool,
    /// See [`PermissionRequestOutcome::rejected_by_user`].
    pub rejected: bool,
    /// See [`PermissionRequestOutcome::error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

/// Manager configuration, taken from the bridge settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerOptions {
    /// API generation override.
    pub api: ApiSelection,
    /// Add the built-in categories to every request.
    pub register_default_categories: bool,
}

/// Runs permission checks and requests against the native platform.
pub struct PermissionManager {
    platform: NativePlatform,
    options: ManagerOptions,
    flow: Mutex<()>,
    state: RwLock<FlowState>,
    waiter: Arc<SettingsWaiter>,
}

impl PermissionManager {
    /// Create a manager for `platform`.
    pub fn new(platform: NativePlatform, options: ManagerOptions) -> Self {
        Self {
            platform,
            options,
            flow: Mutex::new(()),
            state: RwLock::new(FlowState::Idle),
            waiter: Arc::new(SettingsWaiter::new()),
        }
    }

    /// Current flow state.
    pub fn state(&self) -> FlowState {
        *self.state.read()
    }

    /// Query the granted capabilities and whether the user was ever asked.
    #[instrument(skip(self), fields(method = "checkPermissions"))]
    pub async fn check_permissions(&self) -> PermissionStatus {
        let _flow = self.flow.lock().await;
        let _state = self.enter(FlowState::Checking);
        let strategy = self.strategy();
        let status = strategy.check_status().await;
        debug!(
            strategy = strategy.name(),
            granted = ?flag_names(status.granted),
            previously_requested = status.previously_requested,
            "permission status"
        );
        status
    }

    /// Request `flags`, registering `categories` along the way.
    ///
    /// Already-granted flags never prompt again: the categories are still
    /// registered and the outcome is an immediate success.
    #[instrument(skip_all, fields(method = "requestPermissions", flags = ?flag_names(flags)))]
    pub async fn request_permissions(
        &self,
        flags: PermissionFlags,
        categories: &[CategoryDescriptor],
    ) -> PermissionRequestOutcome {
        let _flow = self.flow.lock().await;
        let _state = self.enter(FlowState::Requesting);

        let categories = match self.translate(categories) {
            Ok(categories) => categories,
            Err(error) => {
                warn!(error = %error, "rejecting permission request");
                return PermissionRequestOutcome::failed(error);
            }
        };

        let strategy = self.strategy();
        let status = strategy.check_status().await;
        if status.granted.contains(flags) {
            info!(strategy = strategy.name(), "permissions already granted, not prompting");
            strategy.register_categories(categories).await;
            self.platform.application.register_for_remote_notifications();
            return PermissionRequestOutcome::granted();
        }

        let outcome = PermissionRequestOutcome::from(
            strategy.request_authorization(flags, categories).await,
        );
        info!(
            strategy = strategy.name(),
            granted = outcome.granted,
            rejected = outcome.rejected_by_user,
            error = ?outcome.error,
            "permission request finished"
        );
        if outcome.granted {
            self.platform.application.register_for_remote_notifications();
        }
        outcome
    }

    /// Legacy settings-finalized callback. Returns true if it answered an
    /// outstanding request.
    pub fn settings_finalized(&self, flags: PermissionFlags) -> bool {
        let answered = self.waiter.finalize(flags);
        if !answered {
            debug!(flags = ?flag_names(flags), "settings finalized with no pending request");
        }
        answered
    }

    fn strategy(&self) -> Box<dyn AuthorizationStrategy> {
        select_strategy(&self.platform, self.options.api, &self.waiter)
    }

    fn translate(
        &self,
        categories: &[CategoryDescriptor],
    ) -> Result<Vec<NotificationCategory>> {
        if !self.options.register_default_categories {
            return to_native_categories(categories);
        }
        let mut all = categories.to_vec();
        for builtin in default_categories() {
            if !categories.iter().any(|c| c.identifier == builtin.identifier) {
                all.push(builtin);
            }
        }
        to_native_categories(&all)
    }

    fn enter(&self, state: FlowState) -> StateGuard<'_> {
        *self.state.write() = state;
        StateGuard { state: &self.state }
    }
}

struct StateGuard<'a> {
    state: &'a RwLock<FlowState>,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.state.write() = FlowState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{ActionDescriptor, INVITE_CATEGORY_ID, MESSAGE_CATEGORY_ID};
    use crate::platform::memory::{InMemoryPlatform, UserDecision};
    use crate::platform::{AuthorizationStatus, LegacyNotificationApi, LegacySettings, PlatformFailure};
    use assert_matches::assert_matches;
    use std::sync::Weak;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn modern_manager(mem: &Arc<InMemoryPlatform>) -> PermissionManager {
        PermissionManager::new(mem.native(), ManagerOptions::default())
    }

    fn legacy_manager(mem: &Arc<InMemoryPlatform>, deferred: bool) -> Arc<PermissionManager> {
        mem.set_deferred_finalize(deferred);
        let manager = Arc::new(PermissionManager::new(mem.native(), ManagerOptions::default()));
        let weak = Arc::downgrade(&manager);
        mem.on_settings_finalized(move |flags| {
            if let Some(manager) = weak.upgrade() {
                let _ = manager.settings_finalized(flags);
            }
        });
        manager
    }

    #[tokio::test]
    async fn modern_check_before_any_request() {
        let mem = InMemoryPlatform::new(true);
        let status = modern_manager(&mem).check_permissions().await;
        assert!(status.granted.is_empty());
        assert!(!status.previously_requested);
    }

    #[tokio::test]
    async fn modern_grant_registers_for_remote() {
        let mem = InMemoryPlatform::new(true);
        let manager = modern_manager(&mem);
        let outcome = manager
            .request_permissions(PermissionFlags::ALERT, &[CategoryDescriptor::new("A", vec![])])
            .await;
        assert_eq!(outcome, PermissionRequestOutcome::granted());
        assert_eq!(mem.prompts(), 1);
        assert_eq!(mem.remote_registrations(), 1);
        assert_eq!(mem.modern_categories().len(), 1);
        assert_eq!(manager.state(), FlowState::Idle);
    }

    #[tokio::test]
    async fn already_granted_does_not_prompt() {
        let mem = InMemoryPlatform::new(true);
        mem.set_modern_settings(AuthorizationStatus::Authorized, PermissionFlags::all());
        let manager = modern_manager(&mem);

        let outcome = manager
            .request_permissions(PermissionFlags::ALERT | PermissionFlags::SOUND, &[CategoryDescriptor::new("A", vec![])])
            .await;

        assert_eq!(outcome, PermissionRequestOutcome::granted());
        assert_eq!(mem.prompts(), 0);
        assert_eq!(mem.modern_categories()[0].identifier, "A");
    }

    #[tokio::test]
    async fn partial_grant_prompts_for_missing() {
        let mem = InMemoryPlatform::new(true);
        mem.set_modern_settings(AuthorizationStatus::Authorized, PermissionFlags::ALERT);
        let manager = modern_manager(&mem);
        let _ = manager.request_permissions(PermissionFlags::all(), &[]).await;
        assert_eq!(mem.prompts(), 1);
    }

    #[tokio::test]
    async fn modern_denial_sets_rejected() {
        let mem = InMemoryPlatform::new(true);
        mem.set_decision(UserDecision::Deny);
        let outcome = modern_manager(&mem)
            .request_permissions(PermissionFlags::ALERT, &[])
            .await;
        assert!(!outcome.granted);
        assert!(outcome.rejected_by_user);
        assert!(outcome.error.is_none());
        assert_eq!(mem.remote_registrations(), 0);
        assert_matches!(outcome.into_result(), Err(BridgeError::PlatformDenied));
    }

    #[tokio::test]
    async fn modern_error_is_not_rejection() {
        let mem = InMemoryPlatform::new(true);
        mem.set_decision(UserDecision::Fail(PlatformFailure {
            code: 3010,
            message: "simulator".into(),
        }));
        let outcome = modern_manager(&mem)
            .request_permissions(PermissionFlags::ALERT, &[])
            .await;
        assert!(!outcome.rejected_by_user);
        assert_matches!(outcome.error, Some(BridgeError::Platform { code: 3010, .. }));
    }

    #[tokio::test]
    async fn malformed_category_never_reaches_platform() {
        let mem = InMemoryPlatform::new(true);
        let duplicate = CategoryDescriptor::new(
            "A",
            vec![ActionDescriptor::new("x", "X"), ActionDescriptor::new("x", "Y")],
        );
        let outcome = modern_manager(&mem)
            .request_permissions(PermissionFlags::ALERT, &[duplicate])
            .await;
        assert_matches!(outcome.error, Some(BridgeError::MalformedDescriptor { .. }));
        assert_eq!(mem.prompts(), 0);
        assert!(mem.modern_categories().is_empty());
    }

    #[tokio::test]
    async fn default_categories_are_added_once() {
        let mem = InMemoryPlatform::new(true);
        let manager = PermissionManager::new(
            mem.native(),
            ManagerOptions {
                register_default_categories: true,
                ..ManagerOptions::default()
            },
        );
        let custom_message = CategoryDescriptor::new(MESSAGE_CATEGORY_ID, vec![]);
        let outcome = manager
            .request_permissions(PermissionFlags::ALERT, &[custom_message])
            .await;
        assert!(outcome.granted);

        let registered = mem.modern_categories();
        assert_eq!(registered.len(), 2);
        assert!(registered[0].actions.is_empty());
        assert_eq!(registered[1].identifier, INVITE_CATEGORY_ID);
    }

    #[tokio::test]
    async fn legacy_request_uses_finalized_settings() {
        for deferred in [false, true] {
            let mem = InMemoryPlatform::new(false);
            let manager = legacy_manager(&mem, deferred);

            let outcome = manager
                .request_permissions(PermissionFlags::ALERT, &[CategoryDescriptor::new("A", vec![])])
                .await;

            assert_eq!(outcome, PermissionRequestOutcome::granted(), "deferred={deferred}");
            assert_eq!(mem.prompts(), 1);
            let status = manager.check_permissions().await;
            assert_eq!(status.granted, PermissionFlags::ALERT);
            assert!(status.previously_requested);
        }
    }

    #[tokio::test]
    async fn legacy_denial() {
        for deferred in [false, true] {
            let mem = InMemoryPlatform::new(false);
            mem.set_decision(UserDecision::Deny);
            let manager = legacy_manager(&mem, deferred);
            let outcome = manager.request_permissions(PermissionFlags::ALERT, &[]).await;
            assert_eq!(outcome, PermissionRequestOutcome::rejected(), "deferred={deferred}");
        }
    }

    #[tokio::test]
    async fn legacy_short_circuit_merges_categories() {
        for deferred in [false, true] {
            let mem = InMemoryPlatform::new(false);
            let existing = to_native_categories(&[CategoryDescriptor::new("B", vec![])]).unwrap();
            mem.set_legacy_settings(Some(LegacySettings {
                types: PermissionFlags::all(),
                categories: existing,
            }));
            let manager = legacy_manager(&mem, deferred);

            let outcome = manager
                .request_permissions(PermissionFlags::BADGE, &[CategoryDescriptor::new("A", vec![])])
                .await;

            assert!(outcome.granted, "deferred={deferred}");
            assert_eq!(mem.prompts(), 0);
            let ids: Vec<_> = mem
                .legacy_settings()
                .unwrap()
                .categories
                .into_iter()
                .map(|c| c.identifier)
                .collect();
            assert_eq!(ids, ["B", "A"]);
        }
    }

    #[tokio::test]
    async fn back_to_back_legacy_requests_consume_their_own_callbacks() {
        for deferred in [false, true] {
            let mem = InMemoryPlatform::new(false);
            mem.set_deferred_finalize(deferred);
            let manager = Arc::new(PermissionManager::new(mem.native(), ManagerOptions::default()));
            let unanswered = Arc::new(AtomicUsize::new(0));
            {
                let weak = Arc::downgrade(&manager);
                let unanswered = Arc::clone(&unanswered);
                mem.on_settings_finalized(move |flags| {
                    let answered = weak.upgrade().is_some_and(|m| m.settings_finalized(flags));
                    if !answered {
                        let _ = unanswered.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }

            let first = manager
                .request_permissions(PermissionFlags::ALERT, &[CategoryDescriptor::new("A", vec![])])
                .await;
            // already granted: registers B without prompting
            let second = manager
                .request_permissions(PermissionFlags::ALERT, &[CategoryDescriptor::new("B", vec![])])
                .await;
            let third = manager
                .request_permissions(PermissionFlags::ALERT | PermissionFlags::BADGE, &[])
                .await;

            assert!(first.granted && second.granted && third.granted, "deferred={deferred}");
            assert_eq!(mem.legacy_registrations(), 3);
            assert_eq!(unanswered.load(Ordering::SeqCst), 0, "deferred={deferred}");
            let ids: Vec<_> = mem
                .legacy_settings()
                .unwrap()
                .categories
                .into_iter()
                .map(|c| c.identifier)
                .collect();
            assert_eq!(ids, ["A", "B"]);
        }
    }

    /// Legacy API that enables whatever is requested and answers from a
    /// spawned task, like a real application delegate.
    #[derive(Default)]
    struct GrantingLegacyApi {
        settings: parking_lot::Mutex<Option<LegacySettings>>,
        manager: parking_lot::Mutex<Weak<PermissionManager>>,
    }

    impl LegacyNotificationApi for GrantingLegacyApi {
        fn current_settings(&self) -> Option<LegacySettings> {
            self.settings.lock().clone()
        }

        fn register_user_notification_settings(&self, settings: LegacySettings) {
            let types = settings.types;
            *self.settings.lock() = Some(settings);
            let manager = self.manager.lock().clone();
            let _ = tokio::spawn(async move {
                if let Some(manager) = manager.upgrade() {
                    let _ = manager.settings_finalized(types);
                }
            });
        }
    }

    #[tokio::test]
    async fn earlier_registration_never_answers_next_request() {
        let mem = InMemoryPlatform::new(false);
        let api = Arc::new(GrantingLegacyApi::default());
        *api.settings.lock() = Some(LegacySettings {
            types: PermissionFlags::ALERT,
            categories: Vec::new(),
        });
        let manager = Arc::new(PermissionManager::new(
            NativePlatform {
                legacy: api.clone(),
                ..mem.native()
            },
            ManagerOptions::default(),
        ));
        *api.manager.lock() = Arc::downgrade(&manager);

        let first = manager
            .request_permissions(PermissionFlags::ALERT, &[CategoryDescriptor::new("A", vec![])])
            .await;
        let second = manager.request_permissions(PermissionFlags::BADGE, &[]).await;

        assert_eq!(first, PermissionRequestOutcome::granted());
        assert_eq!(second, PermissionRequestOutcome::granted());
        assert_eq!(api.current_settings().unwrap().types, PermissionFlags::BADGE);
    }

    #[test]
    fn unsolicited_settings_finalized_is_ignored() {
        let mem = InMemoryPlatform::new(false);
        let manager = modern_manager(&mem);
        assert!(!manager.settings_finalized(PermissionFlags::ALERT));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_are_serialized() {
        let mem = InMemoryPlatform::new(true);
        mem.set_prompt_delay(Duration::from_secs(1));
        let manager = Arc::new(modern_manager(&mem));

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.request_permissions(PermissionFlags::ALERT, &[]).await })
        };
        let second = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.request_permissions(PermissionFlags::BADGE, &[]).await })
        };

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert!(first.granted);
        assert!(second.granted);
        // BADGE was not part of the first prompt, so the second call prompts too
        assert_eq!(mem.prompts(), 2);
        assert_eq!(manager.state(), FlowState::Idle);
    }

    #[test]
    fn outcome_wire_shape() {
        let wire = PermissionRequestOutcome::failed(BridgeError::malformed("x")).to_wire();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["granted"], false);
        assert_eq!(json["rejected"], false);
        assert_eq!(json["error"]["kind"], "malformedDescriptor");

        let json = serde_json::to_value(PermissionRequestOutcome::granted().to_wire()).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn report_from_status() {
        let report = PermissionReport::from(PermissionStatus {
            granted: PermissionFlags::BADGE,
            previously_requested: true,
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["permissions"], serde_json::json!({"badge": true}));
        assert_eq!(json["previouslyRequested"], true);
    }
}
