//! In-memory platform.
//!
//! Implements every native trait against plain state with a scripted user
//! decision. Used by the test suites and by hosts that want to exercise the
//! bridge without a device.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    ApplicationApi, AuthorizationStatus, CapabilityProbe, ChannelApi, LegacyNotificationApi,
    LegacySettings, ModernNotificationApi, ModernSettings, NativePlatform, PlatformFailure,
};
use crate::category::NotificationCategory;
use crate::channel::{ActionTarget, NotificationChannel};
use crate::codec::PermissionFlags;
use crate::router::LifecycleRouter;
use crate::types::NativeNotification;

/// How the simulated user answers the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDecision {
    /// Allow the requested capabilities.
    Grant,
    /// Decline.
    Deny,
    /// The platform errors out (modern API only).
    Fail(PlatformFailure),
}

type FinalizedCallback = Arc<dyn Fn(PermissionFlags) + Send + Sync>;

struct State {
    modern_available: bool,
    decision: UserDecision,
    prompt_delay: Duration,
    legacy_settings: Option<LegacySettings>,
    modern_settings: ModernSettings,
    modern_categories: Vec<NotificationCategory>,
    delivered: Vec<NativeNotification>,
    badge: i64,
    deferred_finalize: bool,
    channels: BTreeMap<String, NotificationChannel>,
    action_targets: BTreeMap<String, ActionTarget>,
}

/// A scripted stand-in for the operating system.
pub struct InMemoryPlatform {
    state: Mutex<State>,
    on_settings_finalized: Mutex<Option<FinalizedCallback>>,
    prompts: AtomicUsize,
    legacy_registrations: AtomicUsize,
    remote_registrations: AtomicUsize,
}

impl InMemoryPlatform {
    /// New platform that grants every prompt.
    pub fn new(modern_available: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                modern_available,
                decision: UserDecision::Grant,
                prompt_delay: Duration::ZERO,
                legacy_settings: None,
                modern_settings: ModernSettings::default(),
                modern_categories: Vec::new(),
                delivered: Vec::new(),
                badge: 0,
                deferred_finalize: false,
                channels: BTreeMap::new(),
                action_targets: BTreeMap::new(),
            }),
            on_settings_finalized: Mutex::new(None),
            prompts: AtomicUsize::new(0),
            legacy_registrations: AtomicUsize::new(0),
            remote_registrations: AtomicUsize::new(0),
        })
    }

    /// Bundle this platform as every native collaborator.
    pub fn native(self: &Arc<Self>) -> NativePlatform {
        NativePlatform {
            probe: self.clone(),
            legacy: self.clone(),
            modern: self.clone(),
            application: self.clone(),
            channels: Some(self.clone()),
        }
    }

    /// Script the answer to subsequent prompts.
    pub fn set_decision(&self, decision: UserDecision) {
        self.state.lock().decision = decision;
    }

    /// Delay each modern prompt, so concurrent callers overlap.
    pub fn set_prompt_delay(&self, delay: Duration) {
        self.state.lock().prompt_delay = delay;
    }

    /// Deliver the settings-finalized callback from a spawned task, after
    /// `register_user_notification_settings` has returned, the way the
    /// application delegate does. Without a Tokio runtime it stays inline.
    pub fn set_deferred_finalize(&self, deferred: bool) {
        self.state.lock().deferred_finalize = deferred;
    }

    /// Switch API generation.
    pub fn set_modern_available(&self, available: bool) {
        self.state.lock().modern_available = available;
    }

    /// Hook invoked after every legacy registration with the resulting types.
    /// Hosts wire this to the router's settings-finalized entry point.
    pub fn on_settings_finalized(&self, callback: impl Fn(PermissionFlags) + Send + Sync + 'static) {
        *self.on_settings_finalized.lock() = Some(Arc::new(callback));
    }

    /// Report legacy settings registrations to `router`, the way a host's
    /// application delegate would.
    pub fn route_to(&self, router: &Arc<LifecycleRouter>) {
        let router = Arc::downgrade(router);
        self.on_settings_finalized(move |flags| {
            if let Some(router) = router.upgrade() {
                router.settings_finalized(flags);
            }
        });
    }

    /// Preset the legacy settings object.
    pub fn set_legacy_settings(&self, settings: Option<LegacySettings>) {
        self.state.lock().legacy_settings = settings;
    }

    /// Current legacy settings object.
    pub fn legacy_settings(&self) -> Option<LegacySettings> {
        self.state.lock().legacy_settings.clone()
    }

    /// Preset the modern settings.
    pub fn set_modern_settings(&self, status: AuthorizationStatus, enabled: PermissionFlags) {
        self.state.lock().modern_settings = ModernSettings { status, enabled };
    }

    /// Categories last set through the modern API.
    pub fn modern_categories(&self) -> Vec<NotificationCategory> {
        self.state.lock().modern_categories.clone()
    }

    /// Notifications reported as delivered.
    pub fn set_delivered(&self, notifications: Vec<NativeNotification>) {
        self.state.lock().delivered = notifications;
    }

    /// Registered channels, by id.
    pub fn channels(&self) -> BTreeMap<String, NotificationChannel> {
        self.state.lock().channels.clone()
    }

    /// Registered action targets, by action name.
    pub fn action_targets(&self) -> BTreeMap<String, ActionTarget> {
        self.state.lock().action_targets.clone()
    }

    /// Number of prompts shown (both API generations).
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Number of legacy `register_user_notification_settings` calls.
    pub fn legacy_registrations(&self) -> usize {
        self.legacy_registrations.load(Ordering::SeqCst)
    }

    /// Number of remote registration calls.
    pub fn remote_registrations(&self) -> usize {
        self.remote_registrations.load(Ordering::SeqCst)
    }
}

impl CapabilityProbe for InMemoryPlatform {
    fn modern_api_available(&self) -> bool {
        self.state.lock().modern_available
    }
}

impl LegacyNotificationApi for InMemoryPlatform {
    fn current_settings(&self) -> Option<LegacySettings> {
        self.state.lock().legacy_settings.clone()
    }

    fn register_user_notification_settings(&self, settings: LegacySettings) {
        let _ = self.legacy_registrations.fetch_add(1, Ordering::SeqCst);
        let (types, deferred) = {
            let mut state = self.state.lock();
            let prompting = !settings.types.is_empty() && state.legacy_settings.is_none();
            let types = if prompting {
                let _ = self.prompts.fetch_add(1, Ordering::SeqCst);
                match state.decision {
                    UserDecision::Grant => settings.types,
                    UserDecision::Deny | UserDecision::Fail(_) => PermissionFlags::empty(),
                }
            } else {
                // the OS never re-prompts; it keeps whatever the user chose
                state
                    .legacy_settings
                    .as_ref()
                    .map_or(PermissionFlags::empty(), |s| s.types)
            };
            state.legacy_settings = Some(LegacySettings {
                types,
                categories: settings.categories,
            });
            (types, state.deferred_finalize)
        };

        let Some(callback) = self.on_settings_finalized.lock().clone() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) if deferred => {
                let _ = runtime.spawn(async move { callback(types) });
            }
            _ => callback(types),
        }
    }
}

#[async_trait]
impl ModernNotificationApi for InMemoryPlatform {
    async fn notification_settings(&self) -> ModernSettings {
        self.state.lock().modern_settings
    }

    fn set_categories(&self, categories: Vec<NotificationCategory>) {
        self.state.lock().modern_categories = categories;
    }

    async fn request_authorization(&self, flags: PermissionFlags) -> Result<bool, PlatformFailure> {
        let _ = self.prompts.fetch_add(1, Ordering::SeqCst);
        let (delay, decision) = {
            let state = self.state.lock();
            (state.prompt_delay, state.decision.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        match decision {
            UserDecision::Grant => {
                state.modern_settings.status = AuthorizationStatus::Authorized;
                state.modern_settings.enabled |= flags;
                Ok(true)
            }
            UserDecision::Deny => {
                state.modern_settings.status = AuthorizationStatus::Denied;
                Ok(false)
            }
            UserDecision::Fail(failure) => Err(failure),
        }
    }

    async fn delivered_notifications(&self) -> Vec<NativeNotification> {
        self.state.lock().delivered.clone()
    }
}

impl ApplicationApi for InMemoryPlatform {
    fn register_for_remote_notifications(&self) {
        let _ = self.remote_registrations.fetch_add(1, Ordering::SeqCst);
    }

    fn badge_number(&self) -> i64 {
        self.state.lock().badge
    }

    fn set_badge_number(&self, value: i64) {
        self.state.lock().badge = value;
    }
}

impl ChannelApi for InMemoryPlatform {
    fn register_notification_channels(&self, channels: Vec<NotificationChannel>) {
        let mut state = self.state.lock();
        for channel in channels {
            let _ = state.channels.insert(channel.id.clone(), channel);
        }
    }

    fn register_notification_actions(&self, targets: BTreeMap<String, ActionTarget>) {
        self.state.lock().action_targets = targets;
    }
}
