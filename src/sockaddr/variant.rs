//! Typed views of a region as a sockaddr variant

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddrV4},
    ops::{Deref, DerefMut},
};

use super::layouts::SockaddrLayouts;
use crate::{error::Result, memory::Region};

/// Any sockaddr; only the family tag is meaningful
pub struct Sockaddr<'l, R> {
    region: R,
    layouts: &'l SockaddrLayouts,
}

/// A region viewed as `sockaddr_in`
pub struct SockaddrIn<'l, R> {
    region: R,
    layouts: &'l SockaddrLayouts,
}

/// A region viewed as `sockaddr_in6`
pub struct SockaddrIn6<'l, R> {
    region: R,
    layouts: &'l SockaddrLayouts,
}

macro_rules! view_common {
    ($view:ident, $descriptor:ident) => {
        impl<R: Deref<Target = Region>> $view<'static, R> {
            /// View `region` with the native layouts, without copying
            pub fn reinterpret(region: R) -> Result<Self> {
                Self::reinterpret_with(SockaddrLayouts::native()?, region)
            }
        }

        impl<'l, R: Deref<Target = Region>> $view<'l, R> {
            /// View `region` with explicit layouts; fails if the region is too small
            pub fn reinterpret_with(layouts: &'l SockaddrLayouts, region: R) -> Result<Self> {
                layouts.$descriptor().check_fits(&region)?;
                Ok(Self { region, layouts })
            }

            /// Family tag, zero-extended
            pub fn family(&self) -> Result<u32> {
                self.layouts.family().get(&self.region)
            }

            /// The viewed region
            pub fn region(&self) -> &Region {
                &self.region
            }

            /// Give the region back
            pub fn into_inner(self) -> R {
                self.region
            }
        }
    };
}

view_common!(Sockaddr, sockaddr);
view_common!(SockaddrIn, sockaddr_in);
view_common!(SockaddrIn6, sockaddr_in6);

impl<R: Deref<Target = Region>> SockaddrIn<'_, R> {
    pub fn port(&self) -> Result<u16> {
        self.layouts.inet().port.get(&self.region)
    }

    pub fn addr(&self) -> Result<Ipv4Addr> {
        self.layouts.inet().addr.get(&self.region).map(Ipv4Addr::from)
    }

    pub fn socket_addr(&self) -> Result<SocketAddrV4> {
        Ok(SocketAddrV4::new(self.addr()?, self.port()?))
    }
}

impl<R: DerefMut<Target = Region>> SockaddrIn<'_, R> {
    /// Write the platform's `AF_INET` tag
    pub fn set_family(&mut self) -> Result<()> {
        let af_inet = self.layouts.platform().af_inet();
        self.layouts.inet().family.set(&mut self.region, af_inet)
    }

    pub fn set_port(&mut self, port: u16) -> Result<()> {
        self.layouts.inet().port.set(&mut self.region, port)
    }

    pub fn set_addr(&mut self, addr: Ipv4Addr) -> Result<()> {
        self.layouts.inet().addr.set(&mut self.region, u32::from(addr))
    }

    /// Clear `sin_zero`
    pub fn clear_zero(&mut self) -> Result<()> {
        self.layouts.inet().zero.copy_in(&mut self.region, &[0; 8])
    }
}

impl<R: Deref<Target = Region>> SockaddrIn6<'_, R> {
    pub fn port(&self) -> Result<u16> {
        self.layouts.inet6().port.get(&self.region)
    }

    pub fn flowinfo(&self) -> Result<u32> {
        self.layouts.inet6().flowinfo.get(&self.region)
    }

    pub fn addr(&self) -> Result<Ipv6Addr> {
        let mut octets = [0u8; 16];
        self.layouts.inet6().addr.copy_out(&self.region, &mut octets)?;
        Ok(Ipv6Addr::from(octets))
    }

    pub fn scope_id(&self) -> Result<u32> {
        self.layouts.inet6().scope_id.get(&self.region)
    }
}

impl<R: DerefMut<Target = Region>> SockaddrIn6<'_, R> {
    /// Write the platform's `AF_INET6` tag
    pub fn set_family(&mut self) -> Result<()> {
        let af_inet6 = self.layouts.platform().af_inet6();
        self.layouts.inet6().family.set(&mut self.region, af_inet6)
    }

    pub fn set_port(&mut self, port: u16) -> Result<()> {
        self.layouts.inet6().port.set(&mut self.region, port)
    }

    pub fn set_flowinfo(&mut self, flowinfo: u32) -> Result<()> {
        self.layouts.inet6().flowinfo.set(&mut self.region, flowinfo)
    }

    pub fn set_addr(&mut self, addr: Ipv6Addr) -> Result<()> {
        self.layouts.inet6().addr.copy_in(&mut self.region, &addr.octets())
    }

    pub fn set_scope_id(&mut self, scope_id: u32) -> Result<()> {
        self.layouts.inet6().scope_id.set(&mut self.region, scope_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::MemScopeError,
        scope::MemoryScope,
        sockaddr::{SockaddrPlatform, SOCKADDR_IN6_SIZE, SOCKADDR_IN_SIZE},
    };

    #[test]
    fn test_reinterpret_requires_space() {
        let scope = MemoryScope::confined();
        let region = scope.allocate(SOCKADDR_IN_SIZE).unwrap();
        assert!(SockaddrIn::reinterpret(&region).is_ok());
        assert_eq!(
            SockaddrIn6::reinterpret(&region).err(),
            Some(MemScopeError::insufficient_space(SOCKADDR_IN6_SIZE, SOCKADDR_IN_SIZE))
        );
    }

    #[test]
    fn test_inet_fields_network_order() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(SOCKADDR_IN_SIZE).unwrap();
        {
            let mut sin = SockaddrIn::reinterpret(&mut region).unwrap();
            sin.set_family().unwrap();
            sin.set_port(8080).unwrap();
            sin.set_addr(Ipv4Addr::new(192, 168, 1, 20)).unwrap();
            assert_eq!(
                sin.socket_addr().unwrap(),
                "192.168.1.20:8080".parse().unwrap()
            );
        }
        let bytes = region.to_vec().unwrap();
        assert_eq!(&bytes[2..8], &[0x1F, 0x90, 192, 168, 1, 20]);
        assert_eq!(
            Sockaddr::reinterpret(&region).unwrap().family().unwrap(),
            SockaddrPlatform::native().af_inet()
        );
    }

    #[test]
    fn test_inet6_host_order_fields() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(SOCKADDR_IN6_SIZE).unwrap();
        let mut sin6 = SockaddrIn6::reinterpret(&mut region).unwrap();
        sin6.set_flowinfo(0x0102_0304).unwrap();
        sin6.set_scope_id(7).unwrap();
        sin6.set_addr(Ipv6Addr::LOCALHOST).unwrap();

        assert_eq!(sin6.flowinfo().unwrap(), 0x0102_0304);
        assert_eq!(sin6.scope_id().unwrap(), 7);
        assert_eq!(sin6.addr().unwrap(), Ipv6Addr::LOCALHOST);

        let bytes = sin6.into_inner().to_vec().unwrap();
        assert_eq!(&bytes[4..8], &0x0102_0304u32.to_ne_bytes());
        assert_eq!(&bytes[24..28], &7u32.to_ne_bytes());
        assert_eq!(bytes[23], 1);
    }
}
