//! libc-backed allocator

use std::ptr::NonNull;

use super::traits::{validate_request, NativeAllocator};
use crate::error::{MemScopeError, Result};

/// Alignment guaranteed by `calloc` on every supported platform
const MALLOC_ALIGN: usize = 2 * std::mem::size_of::<usize>();

/// Allocator that hands out memory from the C heap.
///
/// Small alignments go through `calloc`; larger ones through
/// `posix_memalign` followed by an explicit zero fill. Both are released with
/// `free`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Create a new system allocator
    pub const fn new() -> Self {
        Self
    }
}

impl NativeAllocator for SystemAllocator {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        validate_request(size, align)?;

        let raw = if align <= MALLOC_ALIGN {
            unsafe { libc::calloc(1, size) }
        } else {
            let mut out: *mut libc::c_void = std::ptr::null_mut();
            let rc = unsafe { libc::posix_memalign(&mut out, align, size) };
            if rc != 0 {
                return Err(MemScopeError::memory(format!(
                    "posix_memalign({}, {}) failed with code {}",
                    align, size, rc
                )));
            }
            unsafe {
                std::ptr::write_bytes(out as *mut u8, 0, size);
            }
            out
        };

        NonNull::new(raw as *mut u8)
            .ok_or_else(|| MemScopeError::memory(format!("Failed to allocate {} bytes", size)))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _size: usize) -> Result<()> {
        libc::free(ptr.as_ptr() as *mut libc::c_void);
        Ok(())
    }

    fn zero_initialized(&self) -> bool {
        true
    }
}
