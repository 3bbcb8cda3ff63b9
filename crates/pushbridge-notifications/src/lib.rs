//! # pushbridge-notifications
//!
//! Bridge between a scripting-side application and the platform's native
//! push/local notification subsystem.
//!
//! ## Pieces
//!
//! - [`codec`]: permission mapping (`{alert, badge, sound}`) to
//!   [`PermissionFlags`](codec::PermissionFlags) and back. An empty mapping
//!   means every flag.
//! - [`translator`]: category/action descriptors to native objects, native
//!   notifications to wire mappings, fetch-result tokens to
//!   [`FetchResult`](types::FetchResult).
//! - [`manager`]: permission check and request flows, serialized, over an
//!   [`AuthorizationStrategy`](platform::strategy::AuthorizationStrategy)
//!   picked per call (legacy settings-object API or modern async API).
//! - [`router`]: native lifecycle callbacks to [`BridgeEvent`](events::BridgeEvent)s,
//!   with native completions parked in [`pending`] until the scripting side
//!   resolves them, exactly once.
//! - [`channel`]: notification channels and action targets for platforms
//!   that route notifications that way.
//! - [`formatter`] and [`payload`]: the swappable outbound payload hook and
//!   the `pn_apns`/`pn_gcm` publish payloads built around it.
//! - [`bridge`]: the facade the scripting-side binding calls.
//!
//! ## Threading
//!
//! Native callbacks may arrive on any thread. Callback-style results are
//! redelivered through a [`MainDispatcher`](dispatch::MainDispatcher).
//!
//! ## Example
//!
//! ```rust,no_run
//! use pushbridge_notifications::bridge::NotificationBridge;
//! use pushbridge_notifications::codec::PermissionMap;
//! use pushbridge_notifications::platform::memory::InMemoryPlatform;
//! use pushbridge_settings::BridgeSettings;
//!
//! # async fn demo() {
//! let platform = InMemoryPlatform::new(true);
//! let bridge = NotificationBridge::new(platform.native(), &BridgeSettings::default());
//! let outcome = bridge.request_permissions(&PermissionMap::new(), &[]).await;
//! assert!(outcome.granted);
//! # }
//! ```

#![deny(unsafe_code)]

pub mod bridge;
pub mod category;
pub mod channel;
pub mod codec;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod formatter;
pub mod manager;
pub mod payload;
pub mod pending;
pub mod platform;
pub mod router;
pub mod translator;
pub mod types;

pub use bridge::NotificationBridge;
pub use errors::{BridgeError, ErrorKind, Result, WireError};
