//! Platform constants for sockaddr layouts

use std::sync::OnceLock;

use crate::error::{MemScopeError, Result};

/// Address family constants and family-tag placement for one platform.
///
/// On platforms with a one-byte `sa_family_t` (the BSDs, macOS) the tag sits
/// after the length byte at offset 1; with a two-byte tag (Linux) it is at
/// offset 0. Either way the tag occupies the first two bytes of the struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SockaddrPlatform {
    af_inet: u32,
    af_inet6: u32,
    family_bytes: usize,
}

impl SockaddrPlatform {
    /// Describe a platform explicitly, e.g. to test the other tag width
    pub fn new(af_inet: u32, af_inet6: u32, family_bytes: usize) -> Result<Self> {
        if family_bytes != 1 && family_bytes != 2 {
            return Err(MemScopeError::invalid_parameter(
                "family_bytes",
                format!("Family tag must be 1 or 2 bytes, got {}", family_bytes),
            ));
        }
        if af_inet == af_inet6 {
            return Err(MemScopeError::invalid_parameter(
                "af_inet6",
                "AF_INET and AF_INET6 must differ",
            ));
        }
        let max_tag = if family_bytes == 1 { u8::MAX as u32 } else { u16::MAX as u32 };
        if af_inet > max_tag || af_inet6 > max_tag {
            return Err(MemScopeError::invalid_parameter(
                "family_bytes",
                "Address family constant does not fit the tag width",
            ));
        }
        Ok(Self {
            af_inet,
            af_inet6,
            family_bytes,
        })
    }

    /// The running platform, probed once
    pub fn native() -> &'static SockaddrPlatform {
        static NATIVE: OnceLock<SockaddrPlatform> = OnceLock::new();
        NATIVE.get_or_init(|| {
            let family_bytes = if std::mem::size_of::<libc::sa_family_t>() == 1 {
                1
            } else {
                2
            };
            SockaddrPlatform {
                af_inet: libc::AF_INET as u32,
                af_inet6: libc::AF_INET6 as u32,
                family_bytes,
            }
        })
    }

    pub fn af_inet(&self) -> u32 {
        self.af_inet
    }

    pub fn af_inet6(&self) -> u32 {
        self.af_inet6
    }

    /// Width of the family tag in bytes
    pub fn family_bytes(&self) -> usize {
        self.family_bytes
    }

    /// Offset of the family tag
    pub fn family_offset(&self) -> usize {
        if self.family_bytes == 1 {
            1
        } else {
            0
        }
    }

    /// Symbolic name of a family tag, if it is one of ours
    pub fn family_name(&self, family: u32) -> Option<&'static str> {
        if family == self.af_inet {
            Some("AF_INET")
        } else if family == self.af_inet6 {
            Some("AF_INET6")
        } else {
            None
        }
    }
}
