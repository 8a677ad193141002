//! Allocation accounting wrapper

use std::{
    ptr::NonNull,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use super::traits::NativeAllocator;
use crate::error::Result;

/// Snapshot of a [`TrackingAllocator`]'s counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Allocations not yet returned
    pub live_allocations: usize,
    /// Bytes not yet returned
    pub live_bytes: usize,
    /// Highest number of bytes live at once
    pub peak_bytes: usize,
    /// Successful allocations over the allocator's lifetime
    pub total_allocations: u64,
    /// Successful deallocations over the allocator's lifetime
    pub total_deallocations: u64,
    /// Allocation requests that failed
    pub allocation_failures: u64,
}

impl AllocatorStats {
    /// True when every allocation has been given back
    pub fn is_balanced(&self) -> bool {
        self.live_allocations == 0 && self.total_allocations == self.total_deallocations
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "AllocatorStats {{ live: {} ({} bytes), peak: {} bytes, allocs: {}, frees: {}, failures: {} }}",
            self.live_allocations,
            self.live_bytes,
            self.peak_bytes,
            self.total_allocations,
            self.total_deallocations,
            self.allocation_failures
        )
    }
}

/// Wraps another allocator and counts what flows through it.
///
/// Used to prove that scopes release everything they allocate.
#[derive(Debug)]
pub struct TrackingAllocator<A> {
    inner: A,
    live_allocations: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    total_allocations: AtomicU64,
    total_deallocations: AtomicU64,
    allocation_failures: AtomicU64,
}

impl<A: NativeAllocator> TrackingAllocator<A> {
    /// Wrap `inner`
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            live_allocations: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            total_allocations: AtomicU64::new(0),
            total_deallocations: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
        }
    }

    /// Access the wrapped allocator
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Allocations not yet returned
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Acquire)
    }

    /// Take a snapshot of all counters
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            live_allocations: self.live_allocations.load(Ordering::Acquire),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
            peak_bytes: self.peak_bytes.load(Ordering::Acquire),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_deallocations: self.total_deallocations.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
        }
    }
}

impl<A: NativeAllocator> NativeAllocator for TrackingAllocator<A> {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        match self.inner.allocate(size, align) {
            Ok(ptr) => {
                self.live_allocations.fetch_add(1, Ordering::AcqRel);
                let live = self.live_bytes.fetch_add(size, Ordering::AcqRel) + size;
                self.peak_bytes.fetch_max(live, Ordering::AcqRel);
                self.total_allocations.fetch_add(1, Ordering::Relaxed);
                Ok(ptr)
            }
            Err(err) => {
                self.allocation_failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) -> Result<()> {
        self.inner.deallocate(ptr, size)?;
        self.live_allocations.fetch_sub(1, Ordering::AcqRel);
        self.live_bytes.fetch_sub(size, Ordering::AcqRel);
        self.total_deallocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn zero_initialized(&self) -> bool {
        self.inner.zero_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::SystemAllocator;

    #[test]
    fn test_tracking_counts() {
        let alloc = TrackingAllocator::new(SystemAllocator::new());
        let a = alloc.allocate(32, 8).unwrap();
        let b = alloc.allocate(64, 8).unwrap();

        let stats = alloc.stats();
        assert_eq!(stats.live_allocations, 2);
        assert_eq!(stats.live_bytes, 96);
        assert_eq!(stats.peak_bytes, 96);

        unsafe {
            alloc.deallocate(a, 32).unwrap();
            alloc.deallocate(b, 64).unwrap();
        }

        let stats = alloc.stats();
        assert!(stats.is_balanced());
        assert_eq!(stats.peak_bytes, 96);
        assert_eq!(stats.total_deallocations, 2);
    }

    #[test]
    fn test_tracking_failures() {
        let alloc = TrackingAllocator::new(SystemAllocator::new());
        assert!(alloc.allocate(0, 8).is_err());
        assert_eq!(alloc.stats().allocation_failures, 1);
        assert_eq!(alloc.live_allocations(), 0);
    }

    #[test]
    fn test_stats_summary() {
        let alloc = TrackingAllocator::new(SystemAllocator::new());
        let block = alloc.allocate(16, 8).unwrap();
        assert!(alloc.allocate(0, 8).is_err());

        assert_eq!(
            alloc.stats().summary(),
            "AllocatorStats { live: 1 (16 bytes), peak: 16 bytes, allocs: 1, frees: 0, failures: 1 }"
        );
        unsafe { alloc.deallocate(block, 16).unwrap() };
        assert!(alloc.stats().summary().starts_with("AllocatorStats { live: 0 (0 bytes)"));
    }
}
