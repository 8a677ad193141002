//! Scoped native memory region

use std::{fmt, ops::Deref, ptr::NonNull, slice, sync::Arc};

use tracing::warn;

use crate::{
    allocators::{traits::validate_request, AllocatorExt, NativeAllocator, SystemAllocator},
    error::{MemScopeError, Result},
    scope::{state::ScopeInner, MemoryScope},
};

/// Base pointer moved into a cleanup action
struct RegionBase(NonNull<u8>);

// The pointer is only dereferenced by the allocator that produced it.
unsafe impl Send for RegionBase {}

impl RegionBase {
    fn into_inner(self) -> NonNull<u8> {
        self.0
    }
}

/// A fixed-length block of native memory owned by a [`MemoryScope`].
///
/// Reads take `&Region` and writes take `&mut Region`; every access first
/// validates the owning scope (thread confinement and liveness) and checks
/// bounds. The memory itself is released by the scope, never by the region.
pub struct Region {
    base: NonNull<u8>,
    len: usize,
    scope: Arc<ScopeInner>,
}

impl Region {
    /// Allocate a zero-filled region from the system allocator
    pub fn allocate(scope: &MemoryScope, size: usize, align: usize) -> Result<Self> {
        static SYSTEM: SystemAllocator = SystemAllocator::new();
        let system: &'static dyn NativeAllocator = &SYSTEM;
        Self::allocate_from(scope, system, size, align)
    }

    /// Allocate a zero-filled region from a caller-supplied allocator
    pub fn allocate_with(
        scope: &MemoryScope,
        allocator: Arc<dyn NativeAllocator>,
        size: usize,
        align: usize,
    ) -> Result<Self> {
        Self::allocate_from(scope, allocator, size, align)
    }

    fn allocate_from<A>(scope: &MemoryScope, allocator: A, size: usize, align: usize) -> Result<Self>
    where
        A: Deref<Target = dyn NativeAllocator> + Clone + Send + 'static,
    {
        scope.check_valid_state()?;
        validate_request(size, align)?;
        let base = allocator.allocate_zeroed(size, align)?;
        if base.as_ptr() as usize % align != 0 {
            unsafe { allocator.deallocate(base, size)? };
            return Err(MemScopeError::alignment(base.as_ptr() as usize, align));
        }
        let release = RegionBase(base);
        let cleanup_allocator = allocator.clone();

        let registered = scope.add_cleanup_action(move || {
            // Consume the whole wrapper so the closure captures it, not its field
            let ptr = release.into_inner();
            if let Err(err) = unsafe { cleanup_allocator.deallocate(ptr, size) } {
                warn!(
                    allocator = cleanup_allocator.type_name(),
                    error = %err,
                    size,
                    "failed to release region memory"
                );
            }
        });

        if let Err(err) = registered {
            // Scope closed between the check and the registration
            unsafe { allocator.deallocate(base, size)? };
            return Err(err);
        }

        Ok(Self::bind(scope, base, size))
    }

    /// Wrap memory the caller already owns.
    ///
    /// # Safety
    /// `base` must be valid for reads and writes of `len` bytes for as long as
    /// `scope` is alive, and must not be accessed through other aliases while
    /// the region is in use. Releasing the memory (typically via a cleanup
    /// action on `scope`) remains the caller's responsibility.
    pub unsafe fn from_raw_parts(scope: &MemoryScope, base: NonNull<u8>, len: usize) -> Self {
        Self::bind(scope, base, len)
    }

    fn bind(scope: &MemoryScope, base: NonNull<u8>, len: usize) -> Self {
        Self {
            base,
            len,
            scope: Arc::clone(scope.inner()),
        }
    }

    /// Size of the region in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region has no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw base address, for handing to the I/O layer.
    ///
    /// The pointer is not checked against the scope; it dangles once the
    /// scope closes.
    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Mutable raw base address; same caveats as [`Region::as_ptr`]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Id of the owning scope
    pub fn scope_id(&self) -> u64 {
        self.scope.id()
    }

    /// Whether the owning scope is still alive
    pub fn is_alive(&self) -> bool {
        self.scope.is_alive()
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(MemScopeError::out_of_bounds(offset, len, self.len)),
        }
    }

    /// Run `f` over the region's bytes while the scope is pinned
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let _pin = self.scope.pin()?;
        let bytes = unsafe { slice::from_raw_parts(self.base.as_ptr(), self.len) };
        Ok(f(bytes))
    }

    /// Run `f` over the region's bytes mutably while the scope is pinned
    pub fn with_bytes_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let _pin = self.scope.pin()?;
        let bytes = unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.len) };
        Ok(f(bytes))
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the region
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let _pin = self.scope.pin()?;
        self.check_range(offset, dst.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(offset),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
        Ok(())
    }

    /// Copy `src` into the region starting at `offset`
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let _pin = self.scope.pin()?;
        self.check_range(offset, src.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.base.as_ptr().add(offset), src.len());
        }
        Ok(())
    }

    /// Set every byte of the region to `value`
    pub fn fill(&mut self, value: u8) -> Result<()> {
        self.with_bytes_mut(|bytes| bytes.fill(value))
    }

    /// Copy the whole region into a vector
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.with_bytes(|bytes| bytes.to_vec())
    }

    /// Position of the first differing byte between two regions.
    ///
    /// Compares the common prefix. Returns `None` when both regions have the
    /// same length and content, and `Some(shorter length)` when the prefix
    /// matches but the lengths differ.
    pub fn mismatch(&self, other: &Region) -> Result<Option<usize>> {
        self.with_bytes(|mine| other.with_bytes(|theirs| mismatch(mine, theirs)))?
    }

    /// Base-31 polynomial hash over every byte (as signed), in wrapping `i32` arithmetic
    pub fn content_hash(&self) -> Result<i32> {
        self.with_bytes(content_hash)
    }
}

/// First differing index of two byte slices, see [`Region::mismatch`]
pub fn mismatch(a: &[u8], b: &[u8]) -> Option<usize> {
    let common = a.len().min(b.len());
    match a[..common].iter().zip(&b[..common]).position(|(x, y)| x != y) {
        Some(index) => Some(index),
        None if a.len() != b.len() => Some(common),
        None => None,
    }
}

/// Hash used for region equality classes, see [`Region::content_hash`]
pub fn content_hash(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .fold(0i32, |h, &b| h.wrapping_mul(31).wrapping_add(b as i8 as i32))
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("scope_id", &self.scope.id())
            .finish()
    }
}

// Access goes through the scope check and `&`/`&mut` discipline; shared-scope
// accesses pin the scope so a concurrent close cannot free the memory mid-access.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}
