//! Lifecycle router.
//!
//! Entry point for native application callbacks. Each callback is turned into
//! a [`BridgeEvent`]; callbacks that carry a native completion park it in the
//! pending registry under a fresh handle, which travels with the event so the
//! scripting side can resolve it later.
//!
//! Inbound payloads are forwarded as received. The formatter hook only
//! applies to outbound payloads.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;
use parking_lot::Mutex;
use pushbridge_core::ids::CompletionHandle;
use pushbridge_core::text::token_preview;
use pushbridge_settings::TokenEncoding;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::codec::{PermissionFlags, encode};
use crate::events::{BridgeEvent, EventEmitter};
use crate::manager::PermissionManager;
use crate::pending::PendingCompletions;
use crate::translator::{fetch_result_from_token, from_native_notification};
use crate::types::{FetchResult, NotificationResponse};

/// Router configuration, taken from the bridge settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Device token rendering.
    pub token_encoding: TokenEncoding,
    /// Resolve completions right after emitting instead of waiting.
    pub auto_resolve: bool,
}

/// Routes native callbacks to events and pending completions.
pub struct LifecycleRouter {
    emitter: Arc<EventEmitter>,
    manager: Arc<PermissionManager>,
    pending: PendingCompletions,
    options: RouterOptions,
    initial: Mutex<Option<Map<String, Value>>>,
    initial_delivered: AtomicBool,
}

impl LifecycleRouter {
    /// Create a router emitting through `emitter`.
    pub fn new(
        emitter: Arc<EventEmitter>,
        manager: Arc<PermissionManager>,
        options: RouterOptions,
    ) -> Self {
        Self {
            emitter,
            manager,
            pending: PendingCompletions::new(),
            options,
            initial: Mutex::new(None),
            initial_delivered: AtomicBool::new(false),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Native callbacks
    // ─────────────────────────────────────────────────────────────────────

    /// Legacy settings registration finished.
    pub fn settings_finalized(&self, flags: PermissionFlags) {
        self.emitter.emit(BridgeEvent::PermissionsSettingsFinalized {
            permissions: encode(flags),
        });
        let _ = self.manager.settings_finalized(flags);
    }

    /// The OS issued a device token.
    pub fn device_token_received(&self, token: &[u8]) {
        let token = render_token(token, self.options.token_encoding);
        info!(token = %token_preview(&token), "device registered for remote notifications");
        self.emitter.emit(BridgeEvent::DeviceRegistered { token });
    }

    /// Remote notification registration failed.
    pub fn registration_failed(&self, error: &str) {
        warn!(error, "remote notification registration failed");
        self.emitter.emit(BridgeEvent::DeviceRegistrationFailed {
            error: error.to_string(),
        });
    }

    /// A remote notification arrived. `done` is the native fetch completion.
    pub fn remote_notification_received(
        &self,
        payload: Map<String, Value>,
        foreground: bool,
        done: impl FnOnce(FetchResult) + Send + Sync + 'static,
    ) -> CompletionHandle {
        // parked before emitting so a listener may resolve synchronously
        let handle = self.pending.register_fetch(done);
        debug!(%handle, foreground, "routing remote notification");
        self.emitter.emit(BridgeEvent::NotificationReceived {
            handle: Some(handle.clone()),
            payload,
            foreground,
        });
        if self.options.auto_resolve {
            let _ = self.pending.resolve_fetch(&handle, FetchResult::NoData);
        }
        handle
    }

    /// The user chose an action. `done` is the native action completion.
    pub fn action_selected(
        &self,
        identifier: &str,
        payload: Map<String, Value>,
        response_text: Option<String>,
        done: impl FnOnce() + Send + Sync + 'static,
    ) -> CompletionHandle {
        let handle = self.pending.register_action(done);
        debug!(%handle, action = identifier, "routing notification action");
        self.emitter.emit(BridgeEvent::NotificationActionSelected {
            handle: Some(handle.clone()),
            identifier: identifier.to_string(),
            payload,
            response_text,
        });
        if self.options.auto_resolve {
            let _ = self.pending.resolve_action(&handle);
        }
        handle
    }

    /// Modern-API response to a notification.
    pub fn notification_response(
        &self,
        response: &NotificationResponse,
        done: impl FnOnce() + Send + Sync + 'static,
    ) -> CompletionHandle {
        let payload = from_native_notification(&response.notification).unwrap_or_default();
        self.action_selected(
            &response.action_identifier,
            payload,
            response.user_text.clone(),
            done,
        )
    }

    /// Remember the notification that launched the app.
    pub fn set_initial_notification(&self, payload: Map<String, Value>) {
        *self.initial.lock() = Some(payload);
    }

    /// Emit the launch notification as a background `notificationReceived`.
    /// Happens at most once; returns whether anything was emitted.
    pub fn deliver_initial_notification(&self) -> bool {
        let Some(payload) = self.initial.lock().take() else {
            return false;
        };
        if self.initial_delivered.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!("delivering initial notification");
        self.emitter.emit(BridgeEvent::NotificationReceived {
            handle: None,
            payload,
            foreground: false,
        });
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Acknowledgments from the scripting side
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve a fetch completion with a result token. Unknown tokens mean
    /// `noData`; unknown or already-resolved handles are ignored.
    pub fn resolve_pending_fetch(&self, handle: &CompletionHandle, token: Option<&str>) -> bool {
        self.pending.resolve_fetch(handle, fetch_result_from_token(token))
    }

    /// Resolve an action completion.
    pub fn resolve_pending_action(&self, handle: &CompletionHandle) -> bool {
        self.pending.resolve_action(handle)
    }

    /// Resolve everything still outstanding with safe defaults.
    pub fn resolve_all_pending(&self) -> usize {
        let resolved = self.pending.resolve_all();
        if resolved > 0 {
            info!(resolved, "resolved outstanding completions");
        }
        resolved
    }

    /// Number of completions waiting on the scripting side.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Render a raw device token.
pub fn render_token(token: &[u8], encoding: TokenEncoding) -> String {
    match encoding {
        TokenEncoding::Hex => token.iter().fold(
            String::with_capacity(token.len() * 2),
            |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            },
        ),
        TokenEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(token),
    }
}
