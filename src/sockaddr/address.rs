//! Self-owned native socket address buffers

use std::{
    fmt,
    hash::{Hash, Hasher},
    net::SocketAddr,
    sync::Arc,
};

use tracing::warn;

use super::{codec::ProtocolFamily, layouts::SockaddrLayouts, variant::Sockaddr, SOCKADDR_IN6_SIZE};
use crate::{
    allocators::NativeAllocator,
    config::DEFAULT_ALIGNMENT,
    error::Result,
    memory::Region,
    scope::{ForkGuard, MemoryScope, ScopeConfig},
};

/// A zero-filled `sockaddr_in6`-sized buffer in its own shared scope.
///
/// Large enough for either family, so one buffer can receive whatever the
/// kernel hands back. The buffer is released when the value is dropped or
/// passed to [`NativeSocketAddress::free`].
pub struct NativeSocketAddress {
    scope: MemoryScope,
    region: Region,
}

impl NativeSocketAddress {
    /// Allocate one buffer from the system allocator
    pub fn new() -> Result<Self> {
        let scope = Self::new_scope()?;
        let region = Region::allocate(&scope, SOCKADDR_IN6_SIZE, DEFAULT_ALIGNMENT)?;
        Ok(Self { scope, region })
    }

    /// Allocate one buffer from `allocator`
    pub fn with_allocator(allocator: Arc<dyn NativeAllocator>) -> Result<Self> {
        let scope = Self::new_scope()?;
        let region = Region::allocate_with(&scope, allocator, SOCKADDR_IN6_SIZE, DEFAULT_ALIGNMENT)?;
        Ok(Self { scope, region })
    }

    fn new_scope() -> Result<MemoryScope> {
        MemoryScope::shared_with_config(ScopeConfig::new("sockaddr"))
    }

    /// Allocate `count` independent buffers.
    ///
    /// All or nothing: if any allocation fails, the buffers already allocated
    /// by this call are released before the error is returned.
    pub fn allocate(count: usize) -> Result<Vec<Self>> {
        Self::allocate_each(count, Self::new)
    }

    /// Like [`NativeSocketAddress::allocate`], drawing from `allocator`
    pub fn allocate_with(count: usize, allocator: Arc<dyn NativeAllocator>) -> Result<Vec<Self>> {
        Self::allocate_each(count, || Self::with_allocator(Arc::clone(&allocator)))
    }

    fn allocate_each(count: usize, mut make: impl FnMut() -> Result<Self>) -> Result<Vec<Self>> {
        let mut addresses = Vec::with_capacity(count);
        for allocated in 0..count {
            match make() {
                Ok(address) => addresses.push(address),
                Err(err) => {
                    warn!(
                        requested = count,
                        allocated,
                        error = %err,
                        "socket address allocation failed, releasing batch"
                    );
                    Self::free_all(addresses);
                    return Err(err);
                }
            }
        }
        Ok(addresses)
    }

    /// Release every buffer in `addresses`
    pub fn free_all(addresses: impl IntoIterator<Item = Self>) {
        for address in addresses {
            if let Err(err) = address.free() {
                warn!(error = %err, "failed to release socket address");
            }
        }
    }

    /// Release the buffer now
    pub fn free(self) -> Result<()> {
        self.scope.close()
    }

    /// Encode `addr` for a socket of `family`, returning the length to pass to the kernel.
    ///
    /// The whole buffer is cleared first, so two buffers holding the same
    /// address compare equal regardless of what they held before.
    pub fn encode(&mut self, family: ProtocolFamily, addr: &SocketAddr) -> Result<usize> {
        self.region.fill(0)?;
        SockaddrLayouts::native()?.encode(&mut self.region, family, addr)
    }

    /// Decode the address currently held in the buffer
    pub fn decode(&self) -> Result<SocketAddr> {
        SockaddrLayouts::native()?.decode(&self.region)
    }

    /// Family tag currently held in the buffer
    pub fn family(&self) -> Result<u32> {
        Sockaddr::reinterpret(&self.region)?.family()
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Mutable access, e.g. for a `recvfrom` that fills the buffer
    pub fn region_mut(&mut self) -> &mut Region {
        &mut self.region
    }

    /// Base address to hand to socket calls
    pub fn as_ptr(&self) -> *const u8 {
        self.region.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.region.as_mut_ptr()
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Keep the buffer's scope open across an in-flight operation
    pub fn fork_guard(&self) -> Result<ForkGuard> {
        self.scope.fork_guard()
    }
}

impl Drop for NativeSocketAddress {
    fn drop(&mut self) {
        if !self.scope.is_alive() {
            return;
        }
        if let Err(err) = self.scope.close() {
            warn!(scope_id = self.scope.id(), error = %err, "socket address close failed on drop");
        }
    }
}

impl PartialEq for NativeSocketAddress {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.region.mismatch(&other.region), Ok(None))
    }
}

impl Eq for NativeSocketAddress {}

impl Hash for NativeSocketAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.region.content_hash().unwrap_or_default().hash(state);
    }
}

impl fmt::Display for NativeSocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .family()
            .ok()
            .and_then(|family| SockaddrLayouts::native().ok()?.platform().family_name(family));
        match (name, self.decode()) {
            (Some(name), Ok(addr)) => write!(f, "{}, address={}", name, addr),
            _ => f.write_str("<unknown>"),
        }
    }
}

impl fmt::Debug for NativeSocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSocketAddress")
            .field("scope_id", &self.scope.id())
            .field("region", &self.region)
            .finish()
    }
}
