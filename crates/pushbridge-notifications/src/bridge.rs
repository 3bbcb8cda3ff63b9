//! Bridge facade.
//!
//! [`NotificationBridge`] is what the scripting-side binding talks to. It
//! wires the permission manager, lifecycle router, event emitter and formatter
//! slot together from [`BridgeSettings`] and exposes the inbound API, both as
//! `async` methods and as callback variants that deliver on the main context.

use std::sync::Arc;

use pushbridge_core::ids::CompletionHandle;
use pushbridge_core::logging::{LogFormat, init_subscriber};
use pushbridge_settings::{ApiSelection, BridgeSettings};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::category::CategoryDescriptor;
use crate::channel::{ChannelDescriptor, to_action_targets, to_native_channels};
use crate::codec::{PermissionMap, decode};
use crate::dispatch::{ImmediateDispatcher, MainDispatcher};
use crate::errors::{BridgeError, Result};
use crate::events::{BridgeEvent, EventEmitter};
use crate::formatter::{self, FormatterSlot, OutboundEvent, PayloadFormatter};
use crate::manager::{ManagerOptions, PermissionManager, PermissionReport, PermissionRequestOutcome};
use crate::payload::PayloadAssembler;
use crate::platform::NativePlatform;
use crate::platform::strategy::uses_modern_api;
use crate::router::{LifecycleRouter, RouterOptions};
use crate::translator::from_native_notification;

/// Install the stderr subscriber described by `settings.logging`.
pub fn init_logging(settings: &BridgeSettings) {
    let format = if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber(&settings.logging.level, format);
}

/// The notification bridge.
pub struct NotificationBridge {
    platform: NativePlatform,
    api: ApiSelection,
    runtime: Option<Handle>,
    manager: Arc<PermissionManager>,
    router: Arc<LifecycleRouter>,
    emitter: Arc<EventEmitter>,
    formatter: &'static FormatterSlot,
    dispatcher: Arc<dyn MainDispatcher>,
}

impl NotificationBridge {
    /// Build a bridge for `platform`.
    ///
    /// Uses the process-wide formatter slot and runs callbacks inline until a
    /// dispatcher is set with [`with_dispatcher`](Self::with_dispatcher).
    /// Callback-style calls run on the Tokio runtime current at construction,
    /// if any; see [`with_runtime`](Self::with_runtime).
    pub fn new(platform: NativePlatform, settings: &BridgeSettings) -> Self {
        let emitter = Arc::new(EventEmitter::new(
            settings.events.channel_capacity,
            settings.events.missed_event_capacity,
        ));
        let manager = Arc::new(PermissionManager::new(
            platform.clone(),
            ManagerOptions {
                api: settings.platform.api,
                register_default_categories: settings.registration.register_default_categories,
            },
        ));
        let router = Arc::new(LifecycleRouter::new(
            Arc::clone(&emitter),
            Arc::clone(&manager),
            RouterOptions {
                token_encoding: settings.registration.token_encoding,
                auto_resolve: settings.completions.auto_resolve,
            },
        ));
        debug!(?platform, "notification bridge created");
        Self {
            platform,
            api: settings.platform.api,
            runtime: Handle::try_current().ok(),
            manager,
            router,
            emitter,
            formatter: formatter::global(),
            dispatcher: Arc::new(ImmediateDispatcher),
        }
    }

    /// Build a bridge from the global settings.
    pub fn from_global_settings(platform: NativePlatform) -> Self {
        Self::new(platform, pushbridge_settings::get_settings())
    }

    /// Deliver callbacks through `dispatcher`.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn MainDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Run callback-style calls on `runtime`, whatever thread they come from.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Use `slot` instead of the process-wide formatter slot.
    #[must_use]
    pub fn with_formatter_slot(mut self, slot: &'static FormatterSlot) -> Self {
        self.formatter = slot;
        self
    }

    /// The router native callbacks go to.
    pub fn router(&self) -> &Arc<LifecycleRouter> {
        &self.router
    }

    /// The permission manager.
    pub fn manager(&self) -> &Arc<PermissionManager> {
        &self.manager
    }

    // ─────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────

    /// Granted permissions and whether the user was ever asked.
    pub async fn check_permissions(&self) -> PermissionReport {
        self.manager.check_permissions().await.into()
    }

    /// Request the permissions named in `permissions` (empty means all).
    pub async fn request_permissions(
        &self,
        permissions: &PermissionMap,
        categories: &[CategoryDescriptor],
    ) -> PermissionRequestOutcome {
        self.manager
            .request_permissions(decode(permissions), categories)
            .await
    }

    /// [`check_permissions`](Self::check_permissions) with the result
    /// delivered on the main context. May be called from any thread.
    pub fn check_permissions_with(
        self: &Arc<Self>,
        callback: impl FnOnce(PermissionReport) + Send + 'static,
    ) -> Result<()> {
        let runtime = self.runtime()?;
        let bridge = Arc::clone(self);
        let _ = runtime.spawn(async move {
            let report = bridge.check_permissions().await;
            bridge.dispatcher.dispatch(Box::new(move || callback(report)));
        });
        Ok(())
    }

    /// [`request_permissions`](Self::request_permissions) with the outcome
    /// delivered on the main context. May be called from any thread.
    pub fn request_permissions_with(
        self: &Arc<Self>,
        permissions: PermissionMap,
        categories: Vec<CategoryDescriptor>,
        callback: impl FnOnce(PermissionRequestOutcome) + Send + 'static,
    ) -> Result<()> {
        let runtime = self.runtime()?;
        let bridge = Arc::clone(self);
        let _ = runtime.spawn(async move {
            let outcome = bridge.request_permissions(&permissions, &categories).await;
            bridge.dispatcher.dispatch(Box::new(move || callback(outcome)));
        });
        Ok(())
    }

    fn runtime(&self) -> Result<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| BridgeError::Internal("no Tokio runtime to run the call on".into()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Channels
    // ─────────────────────────────────────────────────────────────────────

    /// Register notification channels. Validated on every platform, ignored
    /// where the platform has no channels.
    pub fn register_notification_channels(&self, channels: &[ChannelDescriptor]) -> Result<()> {
        let channels = to_native_channels(channels)?;
        match &self.platform.channels {
            Some(api) => {
                info!(count = channels.len(), "registering notification channels");
                api.register_notification_channels(channels);
            }
            None => debug!("platform has no notification channels, ignoring"),
        }
        Ok(())
    }

    /// Route notification actions (`{name: "default" | "none" | screen}`).
    /// Validated on every platform, ignored where the platform has no channels.
    pub fn register_notification_actions(&self, actions: &Map<String, Value>) -> Result<()> {
        let targets = to_action_targets(actions)?;
        match &self.platform.channels {
            Some(api) => {
                info!(actions = ?targets.keys().collect::<Vec<_>>(), "registering notification actions");
                api.register_notification_actions(targets);
            }
            None => debug!("platform has no notification actions, ignoring"),
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Payload formatting
    // ─────────────────────────────────────────────────────────────────────

    /// Install (`Some`) or clear (`None`) the payload formatter.
    pub fn set_payload_formatter(&self, formatter: Option<PayloadFormatter>) {
        self.formatter.set(formatter);
    }

    /// Build the publish payload for an outbound chat event.
    pub fn assemble_payload(&self, event: &OutboundEvent) -> Result<Map<String, Value>> {
        PayloadAssembler::new(self.formatter).assemble(event)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Events and completions
    // ─────────────────────────────────────────────────────────────────────

    /// Attach an event listener.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.emitter.subscribe()
    }

    /// Events emitted while nobody was listening, oldest first.
    pub fn receive_missed_events(&self) -> Vec<BridgeEvent> {
        self.emitter.receive_missed_events()
    }

    /// Emit the launch notification, once.
    pub fn deliver_initial_notification(&self) -> bool {
        self.router.deliver_initial_notification()
    }

    /// Resolve a background fetch with `"newData"`, `"noData"` or `"failed"`.
    pub fn resolve_pending_fetch(&self, handle: &CompletionHandle, token: Option<&str>) -> bool {
        self.router.resolve_pending_fetch(handle, token)
    }

    /// Acknowledge an action.
    pub fn resolve_pending_action(&self, handle: &CompletionHandle) -> bool {
        self.router.resolve_pending_action(handle)
    }

    /// Resolve every outstanding completion with its safe default.
    pub fn shutdown(&self) -> usize {
        self.router.resolve_all_pending()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Application
    // ─────────────────────────────────────────────────────────────────────

    /// Icon badge number.
    pub fn application_badge_number(&self) -> i64 {
        self.platform.application.badge_number()
    }

    /// Set the icon badge number.
    pub fn set_application_badge_number(&self, value: i64) {
        self.platform.application.set_badge_number(value);
    }

    /// Notifications still shown in the notification center, shaped for the
    /// scripting side. Empty on the legacy API.
    pub async fn delivered_notifications(&self) -> Vec<Map<String, Value>> {
        if !uses_modern_api(&self.platform, self.api) {
            return Vec::new();
        }
        self.platform
            .modern
            .delivered_notifications()
            .await
            .iter()
            .filter_map(from_native_notification)
            .collect()
    }
}
