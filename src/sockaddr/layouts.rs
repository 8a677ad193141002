//! Descriptors and precomputed accessors for the sockaddr family

use std::sync::OnceLock;

use super::platform::SockaddrPlatform;
use crate::{
    error::Result,
    layout::{Adapted, ByteOrder, FieldAccessor, LayoutBuilder, LayoutDescriptor, SequenceAccessor},
    memory::Region,
};

/// Size of `struct sockaddr_in`
pub const SOCKADDR_IN_SIZE: usize = 16;

/// Size of `struct sockaddr_in6`
pub const SOCKADDR_IN6_SIZE: usize = 28;

/// Family tag read as an unsigned `u32` whatever its physical width
#[derive(Debug, Clone)]
pub enum FamilyAccessor {
    Narrow(Adapted<u8, u32>),
    Wide(Adapted<u16, u32>),
}

impl FamilyAccessor {
    fn for_layout(layout: &LayoutDescriptor, name: &str, platform: &SockaddrPlatform) -> Result<Self> {
        if platform.family_bytes() == 1 {
            Ok(Self::Narrow(layout.accessor::<u8>(name)?.as_unsigned()?))
        } else {
            Ok(Self::Wide(layout.accessor::<u16>(name)?.as_unsigned()?))
        }
    }

    #[inline]
    pub fn get(&self, region: &Region) -> Result<u32> {
        match self {
            Self::Narrow(tag) => tag.get(region),
            Self::Wide(tag) => tag.get(region),
        }
    }

    #[inline]
    pub fn set(&self, region: &mut Region, family: u32) -> Result<()> {
        match self {
            Self::Narrow(tag) => tag.set(region, family),
            Self::Wide(tag) => tag.set(region, family),
        }
    }
}

/// Accessors for `sockaddr_in`
#[derive(Debug, Clone)]
pub struct InetFields {
    pub family: FamilyAccessor,
    pub port: FieldAccessor<u16>,
    pub addr: FieldAccessor<u32>,
    pub zero: SequenceAccessor,
}

/// Accessors for `sockaddr_in6`
#[derive(Debug, Clone)]
pub struct Inet6Fields {
    pub family: FamilyAccessor,
    pub port: FieldAccessor<u16>,
    pub flowinfo: FieldAccessor<u32>,
    pub addr: SequenceAccessor,
    pub scope_id: FieldAccessor<u32>,
}

/// All sockaddr descriptors for one platform
#[derive(Debug, Clone)]
pub struct SockaddrLayouts {
    platform: SockaddrPlatform,
    sockaddr: LayoutDescriptor,
    sockaddr_in: LayoutDescriptor,
    sockaddr_in6: LayoutDescriptor,
    family: FamilyAccessor,
    inet: InetFields,
    inet6: Inet6Fields,
}

/// Start a layout with the platform's family tag in the first two bytes
fn with_family(name: &str, tag: &str, platform: &SockaddrPlatform) -> LayoutBuilder {
    let builder = LayoutDescriptor::builder(name);
    match platform.family_bytes() {
        1 => builder.padding(1).value(tag, 8, ByteOrder::native(), false),
        _ => builder.value(tag, 16, ByteOrder::native(), false),
    }
}

impl SockaddrLayouts {
    /// Derive the layouts for `platform`
    pub fn for_platform(platform: SockaddrPlatform) -> Result<Self> {
        let sockaddr = with_family("sockaddr", "sa_family", &platform)
            .bytes("sa_data", 14)
            .build()?;

        let sockaddr_in = with_family("sockaddr_in", "sin_family", &platform)
            .value("sin_port", 16, ByteOrder::NETWORK, false)
            .value("sin_addr", 32, ByteOrder::NETWORK, false)
            .bytes("sin_zero", 8)
            .build()?;

        let sockaddr_in6 = with_family("sockaddr_in6", "sin6_family", &platform)
            .value("sin6_port", 16, ByteOrder::NETWORK, false)
            .value("sin6_flowinfo", 32, ByteOrder::native(), false)
            .bytes("sin6_addr", 16)
            .value("sin6_scope_id", 32, ByteOrder::native(), false)
            .build()?;

        let family = FamilyAccessor::for_layout(&sockaddr, "sa_family", &platform)?;
        let inet = InetFields {
            family: FamilyAccessor::for_layout(&sockaddr_in, "sin_family", &platform)?,
            port: sockaddr_in.accessor("sin_port")?,
            addr: sockaddr_in.accessor("sin_addr")?,
            zero: sockaddr_in.sequence_accessor("sin_zero")?,
        };
        let inet6 = Inet6Fields {
            family: FamilyAccessor::for_layout(&sockaddr_in6, "sin6_family", &platform)?,
            port: sockaddr_in6.accessor("sin6_port")?,
            flowinfo: sockaddr_in6.accessor("sin6_flowinfo")?,
            addr: sockaddr_in6.sequence_accessor("sin6_addr")?,
            scope_id: sockaddr_in6.accessor("sin6_scope_id")?,
        };

        Ok(Self {
            platform,
            sockaddr,
            sockaddr_in,
            sockaddr_in6,
            family,
            inet,
            inet6,
        })
    }

    /// Layouts for the running platform, built once
    pub fn native() -> Result<&'static SockaddrLayouts> {
        static NATIVE: OnceLock<Result<SockaddrLayouts>> = OnceLock::new();
        NATIVE
            .get_or_init(|| Self::for_platform(*SockaddrPlatform::native()))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn platform(&self) -> &SockaddrPlatform {
        &self.platform
    }

    /// Generic `sockaddr` header
    pub fn sockaddr(&self) -> &LayoutDescriptor {
        &self.sockaddr
    }

    pub fn sockaddr_in(&self) -> &LayoutDescriptor {
        &self.sockaddr_in
    }

    pub fn sockaddr_in6(&self) -> &LayoutDescriptor {
        &self.sockaddr_in6
    }

    /// Family tag accessor shared by every variant
    pub fn family(&self) -> &FamilyAccessor {
        &self.family
    }

    pub fn inet(&self) -> &InetFields {
        &self.inet
    }

    pub fn inet6(&self) -> &Inet6Fields {
        &self.inet6
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::MemoryScope;

    #[test]
    fn test_native_sizes() {
        let layouts = SockaddrLayouts::native().unwrap();
        assert_eq!(layouts.sockaddr().size(), 16);
        assert_eq!(layouts.sockaddr_in().size(), SOCKADDR_IN_SIZE);
        assert_eq!(layouts.sockaddr_in6().size(), SOCKADDR_IN6_SIZE);
        assert_eq!(layouts.sockaddr_in6().offset_of("sin6_addr").unwrap(), 8);
        assert_eq!(layouts.sockaddr_in6().offset_of("sin6_scope_id").unwrap(), 24);
        assert!(std::ptr::eq(layouts, SockaddrLayouts::native().unwrap()));
    }

    #[test]
    fn test_narrow_tag_after_length_byte() {
        let platform = SockaddrPlatform::new(2, 30, 1).unwrap();
        let layouts = SockaddrLayouts::for_platform(platform).unwrap();
        assert_eq!(layouts.sockaddr_in().offset_of("sin_family").unwrap(), 1);
        assert_eq!(layouts.sockaddr_in().offset_of("sin_port").unwrap(), 2);
        assert_eq!(layouts.sockaddr_in().size(), SOCKADDR_IN_SIZE);
        assert_eq!(layouts.sockaddr_in6().size(), SOCKADDR_IN6_SIZE);

        let scope = MemoryScope::confined();
        let mut region = scope.allocate(SOCKADDR_IN_SIZE).unwrap();
        layouts.family().set(&mut region, 30).unwrap();
        assert_eq!(&region.to_vec().unwrap()[..2], &[0, 30]);
        assert_eq!(layouts.inet().family.get(&region).unwrap(), 30);
    }

    #[test]
    fn test_wide_tag_in_host_order() {
        let platform = SockaddrPlatform::new(2, 10, 2).unwrap();
        let layouts = SockaddrLayouts::for_platform(platform).unwrap();
        assert_eq!(layouts.sockaddr_in6().offset_of("sin6_port").unwrap(), 2);

        let scope = MemoryScope::confined();
        let mut region = scope.allocate(SOCKADDR_IN6_SIZE).unwrap();
        layouts.inet6().family.set(&mut region, 10).unwrap();
        assert_eq!(&region.to_vec().unwrap()[..2], &10u16.to_ne_bytes());
        assert_eq!(layouts.family().get(&region).unwrap(), 10);
    }
}
