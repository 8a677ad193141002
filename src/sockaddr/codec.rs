//! Encoding `SocketAddr` values to and from sockaddr bytes

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use serde::{Deserialize, Serialize};

use super::{
    layouts::{SockaddrLayouts, SOCKADDR_IN6_SIZE, SOCKADDR_IN_SIZE},
    variant::{Sockaddr, SockaddrIn, SockaddrIn6},
};
use crate::{
    error::{MemScopeError, Result},
    memory::Region,
};

/// Protocol family a socket was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolFamily {
    /// IPv4 only; encodes as `sockaddr_in`
    Inet,
    /// IPv6, dual-stack; encodes as `sockaddr_in6`
    Inet6,
}

impl ProtocolFamily {
    /// The family an address naturally belongs to
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => ProtocolFamily::Inet,
            SocketAddr::V6(_) => ProtocolFamily::Inet6,
        }
    }

    /// Bytes an encoding for this family occupies
    pub fn encoded_len(self) -> usize {
        match self {
            ProtocolFamily::Inet => SOCKADDR_IN_SIZE,
            ProtocolFamily::Inet6 => SOCKADDR_IN6_SIZE,
        }
    }
}

impl SockaddrLayouts {
    /// Write `addr` into `region` in the layout `family` calls for.
    ///
    /// Returns the number of bytes the socket layer should be told about.
    /// An IPv4 address encoded for `Inet6` is written in IPv4-mapped form.
    pub fn encode(&self, region: &mut Region, family: ProtocolFamily, addr: &SocketAddr) -> Result<usize> {
        match (family, addr) {
            (ProtocolFamily::Inet, SocketAddr::V4(v4)) => {
                let mut sin = SockaddrIn::reinterpret_with(self, region)?;
                sin.set_family()?;
                sin.set_port(v4.port())?;
                sin.set_addr(*v4.ip())?;
                sin.clear_zero()?;
                Ok(SOCKADDR_IN_SIZE)
            }
            (ProtocolFamily::Inet, SocketAddr::V6(_)) => Err(MemScopeError::UnsupportedAddressFamily),
            (ProtocolFamily::Inet6, addr) => {
                let (ip, flowinfo, scope_id) = match addr {
                    SocketAddr::V4(v4) => (v4.ip().to_ipv6_mapped(), 0, 0),
                    SocketAddr::V6(v6) => (*v6.ip(), v6.flowinfo(), v6.scope_id()),
                };
                let mut sin6 = SockaddrIn6::reinterpret_with(self, region)?;
                sin6.set_family()?;
                sin6.set_port(addr.port())?;
                sin6.set_flowinfo(flowinfo)?;
                sin6.set_addr(ip)?;
                sin6.set_scope_id(scope_id)?;
                Ok(SOCKADDR_IN6_SIZE)
            }
        }
    }

    /// Read the address stored in `region`, dispatching on its family tag.
    ///
    /// An IPv4-mapped IPv6 address with no scope and no flow label decodes as
    /// the IPv4 address it carries.
    pub fn decode(&self, region: &Region) -> Result<SocketAddr> {
        let family = Sockaddr::reinterpret_with(self, region)?.family()?;
        let platform = self.platform();

        if family == platform.af_inet() {
            let sin = SockaddrIn::reinterpret_with(self, region)?;
            return Ok(SocketAddr::V4(sin.socket_addr()?));
        }
        if family == platform.af_inet6() {
            let sin6 = SockaddrIn6::reinterpret_with(self, region)?;
            let ip = sin6.addr()?;
            let port = sin6.port()?;
            let flowinfo = sin6.flowinfo()?;
            let scope_id = sin6.scope_id()?;
            return Ok(match collapse_mapped(&ip, flowinfo, scope_id) {
                Some(v4) => SocketAddr::V4(SocketAddrV4::new(v4, port)),
                None => SocketAddr::V6(SocketAddrV6::new(ip, port, flowinfo, scope_id)),
            });
        }
        Err(MemScopeError::ProtocolFamilyMismatch { family })
    }
}

fn collapse_mapped(ip: &Ipv6Addr, flowinfo: u32, scope_id: u32) -> Option<std::net::Ipv4Addr> {
    if flowinfo != 0 || scope_id != 0 {
        return None;
    }
    ip.to_ipv4_mapped()
}

/// Encode `addr` into a caller-owned region using the native layouts
pub fn encode_into(region: &mut Region, family: ProtocolFamily, addr: &SocketAddr) -> Result<usize> {
    SockaddrLayouts::native()?.encode(region, family, addr)
}

/// Decode the address held by a caller-owned region using the native layouts
pub fn decode_from(region: &Region) -> Result<SocketAddr> {
    SockaddrLayouts::native()?.decode(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scope::MemoryScope, sockaddr::SockaddrPlatform};

    #[test]
    fn test_inet_rejects_v6() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(SOCKADDR_IN6_SIZE).unwrap();
        let addr: SocketAddr = "[::1]:443".parse().unwrap();
        assert_eq!(
            encode_into(&mut region, ProtocolFamily::Inet, &addr),
            Err(MemScopeError::UnsupportedAddressFamily)
        );
    }

    #[test]
    fn test_mapped_v4_bytes() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(SOCKADDR_IN6_SIZE).unwrap();
        let addr: SocketAddr = "10.1.2.3:7".parse().unwrap();

        assert_eq!(
            encode_into(&mut region, ProtocolFamily::Inet6, &addr).unwrap(),
            SOCKADDR_IN6_SIZE
        );
        let bytes = region.to_vec().unwrap();
        assert_eq!(
            &bytes[8..24],
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 10, 1, 2, 3]
        );
        assert_eq!(&bytes[24..28], &[0; 4]);
        assert_eq!(decode_from(&region).unwrap(), addr);
    }

    #[test]
    fn test_unknown_family() {
        let scope = MemoryScope::confined();
        let region = scope.allocate(SOCKADDR_IN6_SIZE).unwrap();
        assert_eq!(
            decode_from(&region),
            Err(MemScopeError::ProtocolFamilyMismatch { family: 0 })
        );
    }

    #[test]
    fn test_inet_needs_sixteen_bytes() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(8).unwrap();
        let addr: SocketAddr = "127.0.0.1:80".parse().unwrap();
        assert_eq!(
            encode_into(&mut region, ProtocolFamily::Inet, &addr),
            Err(MemScopeError::insufficient_space(SOCKADDR_IN_SIZE, 8))
        );
    }

    #[test]
    fn test_round_trip_on_narrow_tag_platform() {
        let platform = SockaddrPlatform::new(2, 28, 1).unwrap();
        let layouts = SockaddrLayouts::for_platform(platform).unwrap();
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(SOCKADDR_IN6_SIZE).unwrap();

        let addr = SocketAddr::V6(SocketAddrV6::new("fe80::1".parse().unwrap(), 53, 0, 5));
        layouts.encode(&mut region, ProtocolFamily::Inet6, &addr).unwrap();
        assert_eq!(&region.to_vec().unwrap()[..4], &[0, 28, 0, 53]);
        assert_eq!(layouts.decode(&region).unwrap(), addr);
    }

    #[test]
    fn test_protocol_family_helpers() {
        let v4: SocketAddr = "1.2.3.4:5".parse().unwrap();
        assert_eq!(ProtocolFamily::of(&v4), ProtocolFamily::Inet);
        assert_eq!(ProtocolFamily::Inet.encoded_len(), 16);
        assert_eq!(ProtocolFamily::Inet6.encoded_len(), 28);
    }
}
