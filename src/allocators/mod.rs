//! Native allocator seam and implementations

pub mod system;
pub mod tracking;
pub mod traits;

pub use system::SystemAllocator;
pub use tracking::{AllocatorStats, TrackingAllocator};
pub use traits::{AllocatorExt, NativeAllocator};
