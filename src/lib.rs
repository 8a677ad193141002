//! # memscope - Scoped Off-Heap Memory and Struct Layouts
//!
//! memscope manages native memory outside the Rust heap's ownership model
//! and gives it structure, so that bytes handed to the operating system (for
//! example socket addresses passed to `bind` or filled by `recvfrom`) can be
//! built and read safely.
//!
//! ## Features
//!
//! - **Scopes**: confined (single owner thread) or shared (any thread) lifetime
//!   owners with run-once cleanup and a drop guard for abandoned scopes
//! - **Fork/unfork pins**: keep a shared scope open across in-flight operations
//! - **Regions**: zero-filled, bounds-checked byte blocks validated against
//!   their scope on every access
//! - **Layouts**: declarative field maps with explicit byte order and typed
//!   accessors, including widening adapters for narrow fields
//! - **Sockaddr codec**: `sockaddr_in` / `sockaddr_in6` encode and decode for
//!   `std::net::SocketAddr`, adapted to the platform's family-tag width
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            Sockaddr codec (sockaddr)            │
//! │  NativeSocketAddress │ encode_into/decode_from  │
//! ├─────────────────────────────────────────────────┤
//! │      Layout descriptors & accessors (layout)    │
//! ├─────────────────────────────────────────────────┤
//! │   Regions (memory)   │   Scopes (scope)         │
//! │   bounds checks      │   confinement, close,    │
//! │   byte copies        │   forks, cleanup         │
//! └─────────────────────────────────────────────────┘
//!           │
//!           ▼
//! ┌─────────────────────────────────────────────────┐
//! │        NativeAllocator (allocators)             │
//! └─────────────────────────────────────────────────┘
//! ```

// Core modules
pub mod allocators;
pub mod error;
pub mod memory;
pub mod scope;

// Structure over raw bytes
pub mod layout;
pub mod sockaddr;

// Main API re-exports
pub use allocators::{AllocatorExt, AllocatorStats, NativeAllocator, SystemAllocator, TrackingAllocator};
pub use error::{MemScopeError, Result};
pub use layout::{
    Adapted, ByteOrder, Carrier, FieldAccessor, FieldSpec, LayoutDescriptor, SequenceAccessor,
};
pub use memory::Region;
pub use scope::{Confinement, ForkGuard, MemoryScope, ScopeConfig, ScopeState, ScopeStats};
pub use sockaddr::{
    decode_from, encode_into, NativeSocketAddress, ProtocolFamily, SockaddrLayouts,
    SockaddrPlatform, SOCKADDR_IN6_SIZE, SOCKADDR_IN_SIZE,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Busy-spin attempts a shared close makes while forks drain
    pub const DEFAULT_CLOSE_SPIN_LIMIT: u32 = 128;

    /// `yield_now` attempts after spinning before a close gives up
    pub const DEFAULT_CLOSE_YIELD_LIMIT: u32 = 16;

    /// Default alignment for region allocations
    pub const DEFAULT_ALIGNMENT: usize = 8;
}
