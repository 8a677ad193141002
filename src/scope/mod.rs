//! Scope lifetime management
//!
//! A scope owns the lifetime of native memory regions. It comes in two
//! disciplines:
//!
//! - **Confined**: bound to one owner thread. Every access is checked against
//!   the owner, and the liveness flag needs no synchronization beyond a plain
//!   atomic load.
//! - **Shared**: usable from any thread. Closing is a single CAS from alive to
//!   closing; the winning closer then waits a bounded number of retries for
//!   outstanding forks to drain, and reverts to alive if they do not.
//!
//! Cleanup actions registered on a scope run exactly once, either on explicit
//! close or, for an abandoned scope, when the last reference to its state is
//! dropped.

pub mod cleanup;
pub mod config;
pub mod memory_scope;
pub mod state;

pub use cleanup::CleanupAction;
pub use config::ScopeConfig;
pub use memory_scope::{ForkGuard, MemoryScope};
pub use state::{Confinement, ScopeState, ScopeStats};
