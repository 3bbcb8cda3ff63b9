//! Pending native completions.
//!
//! Every native callback that hands us a completion (background fetch, action
//! handling) parks it here under a fresh [`CompletionHandle`]. The entry is
//! removed on first resolve, so a second resolve, or one arriving after the
//! native side timed out, finds nothing and does nothing.

use dashmap::DashMap;
use pushbridge_core::ids::CompletionHandle;
use tracing::{debug, warn};

use crate::types::FetchResult;

/// Native fetch completion.
pub type FetchCompletion = Box<dyn FnOnce(FetchResult) + Send + Sync>;
/// Native action completion.
pub type ActionCompletion = Box<dyn FnOnce() + Send + Sync>;

/// A parked native completion.
pub enum PendingCompletion {
    /// Background fetch, resolved with a [`FetchResult`].
    Fetch(FetchCompletion),
    /// Action handling, resolved with no value.
    Action(ActionCompletion),
}

impl PendingCompletion {
    fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Action(_) => "action",
        }
    }

    /// Invoke with the safe default (`NoData` for fetches).
    fn resolve_default(self) {
        match self {
            Self::Fetch(done) => done(FetchResult::NoData),
            Self::Action(done) => done(),
        }
    }
}

impl std::fmt::Debug for PendingCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Registry of parked completions keyed by handle.
#[derive(Debug, Default)]
pub struct PendingCompletions {
    entries: DashMap<CompletionHandle, PendingCompletion>,
}

impl PendingCompletions {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a fetch completion.
    pub fn register_fetch(&self, done: impl FnOnce(FetchResult) + Send + Sync + 'static) -> CompletionHandle {
        self.insert(PendingCompletion::Fetch(Box::new(done)))
    }

    /// Park an action completion.
    pub fn register_action(&self, done: impl FnOnce() + Send + Sync + 'static) -> CompletionHandle {
        self.insert(PendingCompletion::Action(Box::new(done)))
    }

    /// Resolve a fetch completion. Returns false when the handle is unknown,
    /// already resolved, or belongs to an action.
    pub fn resolve_fetch(&self, handle: &CompletionHandle, result: FetchResult) -> bool {
        let Some((_, entry)) = self
            .entries
            .remove_if(handle, |_, entry| matches!(entry, PendingCompletion::Fetch(_)))
        else {
            self.log_miss(handle, "fetch");
            return false;
        };
        debug!(%handle, ?result, "resolving fetch completion");
        if let PendingCompletion::Fetch(done) = entry {
            done(result);
        }
        true
    }

    /// Resolve an action completion. Returns false when the handle is
    /// unknown, already resolved, or belongs to a fetch.
    pub fn resolve_action(&self, handle: &CompletionHandle) -> bool {
        let Some((_, entry)) = self
            .entries
            .remove_if(handle, |_, entry| matches!(entry, PendingCompletion::Action(_)))
        else {
            self.log_miss(handle, "action");
            return false;
        };
        debug!(%handle, "resolving action completion");
        if let PendingCompletion::Action(done) = entry {
            done();
        }
        true
    }

    /// Resolve everything still outstanding with its safe default.
    /// Returns how many were resolved.
    pub fn resolve_all(&self) -> usize {
        let handles: Vec<CompletionHandle> =
            self.entries.iter().map(|entry| entry.key().clone()).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.entries.remove(&handle))
            .map(|(handle, entry)| {
                debug!(%handle, kind = entry.kind(), "resolving outstanding completion");
                entry.resolve_default();
            })
            .count()
    }

    /// Whether `handle` is still waiting.
    pub fn contains(&self, handle: &CompletionHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Number of outstanding completions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, entry: PendingCompletion) -> CompletionHandle {
        let handle = CompletionHandle::new();
        debug!(%handle, kind = entry.kind(), "parking completion");
        let _ = self.entries.insert(handle.clone(), entry);
        handle
    }

    fn log_miss(&self, handle: &CompletionHandle, wanted: &str) {
        match self.entries.get(handle) {
            Some(entry) => warn!(
                %handle,
                wanted,
                actual = entry.kind(),
                "completion kind mismatch, leaving it pending"
            ),
            None => debug!(%handle, wanted, "no pending completion, ignoring resolve"),
        }
    }
}
