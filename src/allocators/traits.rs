//! Native allocator seam definition

use std::ptr::NonNull;
use crate::error::Result;

/// Source of raw native memory for regions.
///
/// Scopes never call into the OS directly; every region's bytes come from an
/// implementation of this trait and go back to it exactly once when the owning
/// scope closes.
pub trait NativeAllocator: Send + Sync + std::fmt::Debug {
    /// Allocate `size` bytes aligned to `align`
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>>;

    /// Return memory obtained from [`NativeAllocator::allocate`]
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate` on this allocator with the
    /// same `size`, and must not be used or released again afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) -> Result<()>;

    /// Whether memory returned by `allocate` is already zero-filled
    fn zero_initialized(&self) -> bool {
        false
    }

    /// Get allocator type name for debugging
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Common allocator operations
pub trait AllocatorExt: NativeAllocator {
    /// Allocate and zero-initialize memory
    fn allocate_zeroed(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let ptr = self.allocate(size, align)?;
        if !self.zero_initialized() {
            unsafe {
                std::ptr::write_bytes(ptr.as_ptr(), 0, size);
            }
        }
        Ok(ptr)
    }
}

// Blanket implementation for all allocators
impl<T: NativeAllocator + ?Sized> AllocatorExt for T {}

/// Check the arguments every allocator rejects up front
pub(crate) fn validate_request(size: usize, align: usize) -> Result<()> {
    use crate::error::MemScopeError;

    if size == 0 {
        return Err(MemScopeError::invalid_parameter(
            "size",
            "Size must be greater than 0",
        ));
    }

    if !align.is_power_of_two() {
        return Err(MemScopeError::invalid_parameter(
            "align",
            "Alignment must be a power of 2",
        ));
    }

    Ok(())
}
