//! Public scope handle

use std::{
    fmt,
    sync::{Arc, OnceLock},
    thread::{self, ThreadId},
};

use tracing::warn;

use super::{
    config::ScopeConfig,
    state::{Confinement, ScopeInner, ScopeStats},
};
use crate::{
    config::DEFAULT_ALIGNMENT,
    error::Result,
    memory::Region,
};

/// Owner of the lifetime of one or more [`Region`]s.
///
/// A confined scope is a move-only value bound to one thread. A shared scope
/// is usable from any thread; wrap it in an `Arc` to hand it out. Either way
/// the scope is closed explicitly with [`MemoryScope::close`], or, if
/// abandoned, cleaned up when the handle and every region and fork guard
/// referring to it have been dropped.
pub struct MemoryScope {
    inner: Arc<ScopeInner>,
}

impl MemoryScope {
    /// Create a scope confined to the current thread
    pub fn confined() -> Self {
        Self::confined_to(thread::current().id())
    }

    /// Create a scope confined to `owner`
    pub fn confined_to(owner: ThreadId) -> Self {
        Self {
            inner: Arc::new(ScopeInner::confined(owner, ScopeConfig::default())),
        }
    }

    /// Create a scope confined to the current thread with custom settings
    pub fn confined_with_config(config: ScopeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ScopeInner::confined(thread::current().id(), config)),
        })
    }

    /// Create a scope usable from any thread
    pub fn shared() -> Self {
        Self {
            inner: Arc::new(ScopeInner::shared(ScopeConfig::default())),
        }
    }

    /// Create a shared scope with custom settings
    pub fn shared_with_config(config: ScopeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ScopeInner::shared(config)),
        })
    }

    /// The process-wide scope whose memory is never released.
    ///
    /// # Panics
    /// Calling [`MemoryScope::close`] on it panics.
    pub fn global() -> &'static MemoryScope {
        static GLOBAL: OnceLock<MemoryScope> = OnceLock::new();
        GLOBAL.get_or_init(|| MemoryScope {
            inner: Arc::new(ScopeInner::global()),
        })
    }

    /// Process-unique identifier, used in log events
    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    /// Label from the scope's configuration
    pub fn label(&self) -> Option<&str> {
        self.inner.label()
    }

    /// Access discipline of this scope
    pub fn confinement(&self) -> Confinement {
        self.inner.confinement()
    }

    /// Owner thread, present only for confined scopes
    pub fn owner_thread(&self) -> Option<ThreadId> {
        self.inner.owner_thread()
    }

    /// Cheap liveness probe, callable from any thread
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Fails unless the calling thread may touch this scope's memory right now
    pub fn check_valid_state(&self) -> Result<()> {
        self.inner.check_valid_state()
    }

    /// Pin a shared scope alive; every `fork` needs a matching [`MemoryScope::unfork`]
    pub fn fork(&self) -> Result<()> {
        self.inner.fork()
    }

    /// Release one pin taken by [`MemoryScope::fork`]
    pub fn unfork(&self) -> Result<()> {
        self.inner.unfork()
    }

    /// Pin a shared scope alive until the returned guard is dropped.
    ///
    /// The guard is `Send` and keeps the scope's state reachable, so it can
    /// travel with an asynchronous operation.
    pub fn fork_guard(&self) -> Result<ForkGuard> {
        self.inner.fork()?;
        Ok(ForkGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Register an action to run once when this scope closes
    pub fn add_cleanup_action<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.add_cleanup(Box::new(action))
    }

    /// Close the scope and run its cleanup actions.
    ///
    /// Confined scopes must be closed from their owner thread, and not from
    /// inside one of their region accesses. For shared scopes exactly one
    /// concurrent caller wins; the others get `AlreadyClosed`. A close that
    /// cannot drain outstanding forks and in-flight accesses within the
    /// configured retry budget leaves the scope alive and returns
    /// `ActiveForksPreventClose`.
    ///
    /// # Panics
    /// Panics on the global scope, and re-raises the first panic of a cleanup
    /// action after all actions have run.
    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }

    /// Snapshot of this scope's state
    pub fn stats(&self) -> ScopeStats {
        self.inner.stats()
    }

    /// Allocate a zero-filled region of `size` bytes in this scope
    pub fn allocate(&self, size: usize) -> Result<Region> {
        Region::allocate(self, size, DEFAULT_ALIGNMENT)
    }

    pub(crate) fn inner(&self) -> &Arc<ScopeInner> {
        &self.inner
    }
}

impl fmt::Debug for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScope")
            .field("id", &self.inner.id())
            .field("confinement", &self.inner.confinement())
            .field("state", &self.inner.state())
            .finish()
    }
}

/// RAII fork on a shared scope
pub struct ForkGuard {
    inner: Arc<ScopeInner>,
}

impl ForkGuard {
    /// Id of the pinned scope
    pub fn scope_id(&self) -> u64 {
        self.inner.id()
    }
}

impl fmt::Debug for ForkGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkGuard")
            .field("scope_id", &self.inner.id())
            .finish()
    }
}

impl Drop for ForkGuard {
    fn drop(&mut self) {
        if let Err(err) = self.inner.unfork() {
            warn!(scope_id = self.inner.id(), error = %err, "fork guard release failed");
        }
    }
}
