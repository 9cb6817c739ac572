//! Process-wide registry of active scopes, keyed by owning thread.
//!
//! A thread may own at most one active scope. The registry records which
//! scope that is: an entry is inserted when a scope is created and removed
//! exactly once, when the scope reaches `Terminated`. Creation is rejected
//! while an entry exists for the calling thread.

use connscope_core::{Error, Result, ScopeErrorKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

/// Identity of a scope, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ScopeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Map of thread identity to the scope that thread currently owns.
///
/// Entries are only added and removed by scopes themselves; outside the crate
/// the registry is read-only:
///
/// ```compile_fail
/// fn forget(id: connscope::ScopeId) {
///     connscope::ScopeRegistry::global().release(std::thread::current().id(), id);
/// }
/// ```
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    active: Mutex<HashMap<ThreadId, ScopeId>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every scope in the process.
    pub fn global() -> &'static ScopeRegistry {
        static GLOBAL: OnceLock<ScopeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ScopeRegistry::new)
    }

    // Entries are plain data, so a panic while holding the lock cannot leave
    // the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, ScopeId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail if `owner` already has an active scope.
    pub(crate) fn ensure_vacant(&self, owner: ThreadId) -> Result<()> {
        match self.lock().get(&owner) {
            Some(existing) => Err(nested_scope_error(*existing)),
            None => Ok(()),
        }
    }

    /// Record `id` as the active scope of `owner`.
    pub(crate) fn register(&self, owner: ThreadId, id: ScopeId) -> Result<()> {
        let mut active = self.lock();
        if let Some(existing) = active.get(&owner) {
            return Err(nested_scope_error(*existing));
        }
        active.insert(owner, id);
        tracing::trace!(scope = %id, ?owner, "Registered active scope");
        Ok(())
    }

    /// Remove the registration of `owner` if it still belongs to `id`.
    ///
    /// Returns whether an entry was removed.
    pub(crate) fn release(&self, owner: ThreadId, id: ScopeId) -> bool {
        let mut active = self.lock();
        if active.get(&owner) == Some(&id) {
            active.remove(&owner);
            tracing::trace!(scope = %id, ?owner, "Released active scope");
            true
        } else {
            false
        }
    }

    /// The scope currently owned by `owner`, if any.
    pub fn active_scope(&self, owner: ThreadId) -> Option<ScopeId> {
        self.lock().get(&owner).copied()
    }

    /// Number of threads that currently own a scope.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Does the calling thread currently own an active scope?
pub fn has_active_scope() -> bool {
    ScopeRegistry::global()
        .active_scope(thread::current().id())
        .is_some()
}

fn nested_scope_error(existing: ScopeId) -> Error {
    Error::scope(
        ScopeErrorKind::NestedScope,
        format!(
            "Nested ConnectionScope on the same thread is not allowed ({} is still active)",
            existing
        ),
    )
}
