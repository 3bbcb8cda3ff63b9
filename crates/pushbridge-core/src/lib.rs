//! # pushbridge-core
//!
//! Foundation pieces shared by every pushbridge crate:
//!
//! - **IDs**: [`CompletionHandle`](ids::CompletionHandle), the opaque key for a
//!   native completion awaiting a scripting-side acknowledgment
//! - **Text**: UTF-8 safe truncation and token previews for log fields
//! - **Logging**: `tracing` subscriber setup and an in-memory capture layer
//!   for asserting on log output in tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod text;
