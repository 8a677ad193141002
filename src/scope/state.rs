//! Scope state machine shared by scope handles, regions and fork guards

use std::{
    panic::resume_unwind,
    sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering},
    thread::{self, ThreadId},
};

use tracing::{debug, trace, warn};

use super::{
    cleanup::{run_all, CleanupAction, CleanupList},
    config::ScopeConfig,
};
use crate::error::{MemScopeError, Result};

const ALIVE: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_THREAD: ThreadId = thread::current().id();
}

fn current_thread() -> ThreadId {
    CURRENT_THREAD
        .try_with(|id| *id)
        .unwrap_or_else(|_| thread::current().id())
}

/// Which access discipline a scope follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confinement {
    /// Usable only from the owner thread
    Confined,
    /// Usable from any thread
    Shared,
    /// The immortal process-wide scope
    Global,
}

/// Observable lifecycle state of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeState {
    Alive,
    /// A shared close is waiting for forks to drain; may still revert to `Alive`
    Closing,
    Closed,
}

/// Point-in-time view of a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStats {
    pub id: u64,
    pub label: Option<String>,
    pub confinement: Confinement,
    pub state: ScopeState,
    /// Outstanding user forks
    pub forks: usize,
    /// Region accesses in flight
    pub active_accesses: usize,
    pub pending_cleanup_actions: usize,
}

enum ScopeKind {
    Confined {
        owner: ThreadId,
        closed: AtomicBool,
        // Only touched by the owner thread
        accesses: AtomicUsize,
    },
    Shared {
        state: AtomicU8,
        forks: AtomicUsize,
        accesses: AtomicUsize,
    },
    Global,
}

/// Shared state behind a scope.
///
/// Regions and fork guards hold an `Arc` to this, so it outlives the
/// `MemoryScope` handle when they do. Dropping the last reference while
/// cleanup is still pending runs the cleanup (the drop guard).
pub(crate) struct ScopeInner {
    id: u64,
    kind: ScopeKind,
    config: ScopeConfig,
    cleanup: CleanupList,
}

/// Keeps a scope from completing a close while a region access is in flight
pub(crate) struct AccessPin<'a> {
    accesses: Option<&'a AtomicUsize>,
}

impl Drop for AccessPin<'_> {
    fn drop(&mut self) {
        if let Some(accesses) = self.accesses {
            accesses.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl ScopeInner {
    pub(crate) fn confined(owner: ThreadId, config: ScopeConfig) -> Self {
        Self::new(
            ScopeKind::Confined {
                owner,
                closed: AtomicBool::new(false),
                accesses: AtomicUsize::new(0),
            },
            config,
        )
    }

    pub(crate) fn shared(config: ScopeConfig) -> Self {
        Self::new(
            ScopeKind::Shared {
                state: AtomicU8::new(ALIVE),
                forks: AtomicUsize::new(0),
                accesses: AtomicUsize::new(0),
            },
            config,
        )
    }

    pub(crate) fn global() -> Self {
        Self::new(ScopeKind::Global, ScopeConfig::new("global"))
    }

    fn new(kind: ScopeKind, config: ScopeConfig) -> Self {
        let inner = Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            config,
            cleanup: CleanupList::new(),
        };
        trace!(
            scope_id = inner.id,
            confinement = ?inner.confinement(),
            label = inner.config.label.as_deref().unwrap_or(""),
            "scope created"
        );
        inner
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn label(&self) -> Option<&str> {
        self.config.label.as_deref()
    }

    pub(crate) fn confinement(&self) -> Confinement {
        match self.kind {
            ScopeKind::Confined { .. } => Confinement::Confined,
            ScopeKind::Shared { .. } => Confinement::Shared,
            ScopeKind::Global => Confinement::Global,
        }
    }

    pub(crate) fn owner_thread(&self) -> Option<ThreadId> {
        match self.kind {
            ScopeKind::Confined { owner, .. } => Some(owner),
            _ => None,
        }
    }

    pub(crate) fn state(&self) -> ScopeState {
        match &self.kind {
            ScopeKind::Confined { closed, .. } => {
                if closed.load(Ordering::Acquire) {
                    ScopeState::Closed
                } else {
                    ScopeState::Alive
                }
            }
            ScopeKind::Shared { state, .. } => match state.load(Ordering::Acquire) {
                ALIVE => ScopeState::Alive,
                CLOSING => ScopeState::Closing,
                _ => ScopeState::Closed,
            },
            ScopeKind::Global => ScopeState::Alive,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.state() != ScopeState::Closed
    }

    /// Access-time guard run before every region read or write
    #[inline]
    pub(crate) fn check_valid_state(&self) -> Result<()> {
        match &self.kind {
            ScopeKind::Confined { owner, closed, .. } => {
                if current_thread() != *owner {
                    return Err(MemScopeError::ThreadConfinementViolation);
                }
                if closed.load(Ordering::Acquire) {
                    return Err(MemScopeError::UseAfterClose);
                }
                Ok(())
            }
            ScopeKind::Shared { state, .. } => {
                if state.load(Ordering::Acquire) != ALIVE {
                    return Err(MemScopeError::UseAfterClose);
                }
                Ok(())
            }
            ScopeKind::Global => Ok(()),
        }
    }

    /// Validate state and count one region access until the pin drops.
    ///
    /// On a shared scope the increment happens before the state load and the
    /// closer stores `CLOSING` before it loads the counters, so at least one
    /// side observes the other. On a confined scope the counter makes a close
    /// issued from inside an access fail.
    #[inline]
    pub(crate) fn pin(&self) -> Result<AccessPin<'_>> {
        match &self.kind {
            ScopeKind::Shared {
                state, accesses, ..
            } => {
                accesses.fetch_add(1, Ordering::SeqCst);
                if state.load(Ordering::SeqCst) != ALIVE {
                    accesses.fetch_sub(1, Ordering::SeqCst);
                    return Err(MemScopeError::UseAfterClose);
                }
                Ok(AccessPin {
                    accesses: Some(accesses),
                })
            }
            ScopeKind::Confined { accesses, .. } => {
                self.check_valid_state()?;
                accesses.fetch_add(1, Ordering::SeqCst);
                Ok(AccessPin {
                    accesses: Some(accesses),
                })
            }
            ScopeKind::Global => Ok(AccessPin { accesses: None }),
        }
    }

    pub(crate) fn fork(&self) -> Result<()> {
        match &self.kind {
            ScopeKind::Shared { state, forks, .. } => {
                forks.fetch_add(1, Ordering::SeqCst);
                if state.load(Ordering::SeqCst) != ALIVE {
                    forks.fetch_sub(1, Ordering::SeqCst);
                    return Err(MemScopeError::UseAfterClose);
                }
                Ok(())
            }
            ScopeKind::Confined { .. } => Err(MemScopeError::invalid_parameter(
                "scope",
                "fork is only supported on shared scopes",
            )),
            ScopeKind::Global => Ok(()),
        }
    }

    pub(crate) fn unfork(&self) -> Result<()> {
        match &self.kind {
            ScopeKind::Shared { forks, .. } => {
                let mut current = forks.load(Ordering::Acquire);
                loop {
                    if current == 0 {
                        return Err(MemScopeError::invalid_parameter(
                            "forks",
                            "unfork without a matching fork",
                        ));
                    }
                    match forks.compare_exchange_weak(
                        current,
                        current - 1,
                        Ordering::SeqCst,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return Ok(()),
                        Err(actual) => current = actual,
                    }
                }
            }
            ScopeKind::Confined { .. } => Err(MemScopeError::invalid_parameter(
                "scope",
                "unfork is only supported on shared scopes",
            )),
            ScopeKind::Global => Ok(()),
        }
    }

    pub(crate) fn forks(&self) -> usize {
        match &self.kind {
            ScopeKind::Shared { forks, .. } => forks.load(Ordering::Acquire),
            _ => 0,
        }
    }

    pub(crate) fn active_accesses(&self) -> usize {
        match &self.kind {
            ScopeKind::Confined { accesses, .. } | ScopeKind::Shared { accesses, .. } => {
                accesses.load(Ordering::Acquire)
            }
            ScopeKind::Global => 0,
        }
    }

    pub(crate) fn add_cleanup(&self, action: CleanupAction) -> Result<()> {
        if let ScopeKind::Global = self.kind {
            // Global memory is never released
            return Ok(());
        }
        self.cleanup.push_if(action, || self.check_valid_state())
    }

    pub(crate) fn close(&self) -> Result<()> {
        match &self.kind {
            ScopeKind::Confined {
                owner,
                closed,
                accesses,
            } => {
                if current_thread() != *owner {
                    return Err(MemScopeError::ThreadConfinementViolation);
                }
                if closed.load(Ordering::Acquire) {
                    return Err(MemScopeError::AlreadyClosed);
                }
                let in_flight = accesses.load(Ordering::SeqCst);
                if in_flight > 0 {
                    debug!(
                        scope_id = self.id,
                        accesses = in_flight,
                        "close refused inside a region access"
                    );
                    return Err(MemScopeError::ActiveForksPreventClose { forks: in_flight });
                }
                closed.store(true, Ordering::Release);
            }
            ScopeKind::Shared {
                state,
                forks,
                accesses,
            } => {
                state
                    .compare_exchange(ALIVE, CLOSING, Ordering::SeqCst, Ordering::SeqCst)
                    .map_err(|_| MemScopeError::AlreadyClosed)?;

                if let Err(outstanding) = self.await_quiescence(forks, accesses) {
                    state.store(ALIVE, Ordering::SeqCst);
                    debug!(
                        scope_id = self.id,
                        forks = outstanding,
                        "close abandoned, scope reverted to alive"
                    );
                    return Err(MemScopeError::ActiveForksPreventClose { forks: outstanding });
                }
                state.store(CLOSED, Ordering::SeqCst);
            }
            ScopeKind::Global => panic!("the global memory scope cannot be closed"),
        }

        let actions = self.cleanup.take().unwrap_or_default();
        debug!(
            scope_id = self.id,
            confinement = ?self.confinement(),
            actions = actions.len(),
            "scope closed"
        );
        let mut panics = run_all(actions);
        if !panics.is_empty() {
            warn!(
                scope_id = self.id,
                failures = panics.len(),
                "cleanup action panicked during close"
            );
            resume_unwind(panics.swap_remove(0));
        }
        Ok(())
    }

    /// Bounded wait for forks and in-flight accesses to drain; returns the
    /// last combined count seen on failure
    fn await_quiescence(
        &self,
        forks: &AtomicUsize,
        accesses: &AtomicUsize,
    ) -> std::result::Result<(), usize> {
        let mut spins = 0;
        let mut yields = 0;
        loop {
            let outstanding = forks.load(Ordering::SeqCst) + accesses.load(Ordering::SeqCst);
            if outstanding == 0 {
                return Ok(());
            }
            if spins < self.config.close_spin_limit {
                spins += 1;
                std::hint::spin_loop();
            } else if yields < self.config.close_yield_limit {
                yields += 1;
                thread::yield_now();
            } else {
                return Err(outstanding);
            }
        }
    }

    pub(crate) fn stats(&self) -> ScopeStats {
        ScopeStats {
            id: self.id,
            label: self.config.label.clone(),
            confinement: self.confinement(),
            state: self.state(),
            forks: self.forks(),
            active_accesses: self.active_accesses(),
            pending_cleanup_actions: self.cleanup.pending(),
        }
    }

    fn mark_closed(&self) {
        match &self.kind {
            ScopeKind::Confined { closed, .. } => closed.store(true, Ordering::Release),
            ScopeKind::Shared { state, .. } => state.store(CLOSED, Ordering::SeqCst),
            ScopeKind::Global => {}
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let Some(actions) = self.cleanup.take() else {
            return;
        };
        self.mark_closed();
        if actions.is_empty() {
            return;
        }

        let outstanding = self.forks();
        if outstanding > 0 {
            warn!(
                scope_id = self.id,
                forks = outstanding,
                "scope abandoned with unmatched forks"
            );
        }
        debug!(
            scope_id = self.id,
            actions = actions.len(),
            "scope abandoned, drop guard running cleanup"
        );
        let panics = run_all(actions);
        if !panics.is_empty() {
            warn!(
                scope_id = self.id,
                failures = panics.len(),
                "drop guard cleanup action panicked"
            );
        }
    }
}
