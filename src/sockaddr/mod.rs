//! POSIX socket address structures over scoped regions
//!
//! The `sockaddr_in` and `sockaddr_in6` layouts are ordinary
//! [`crate::layout::LayoutDescriptor`]s derived from a probed
//! [`SockaddrPlatform`]. The family tag is one or two bytes wide depending on
//! the platform and is always read as an unsigned `u32`. Ports and IPv4
//! addresses are stored in network byte order; IPv6 flow info and scope id
//! are in host order.

pub mod address;
pub mod codec;
pub mod layouts;
pub mod platform;
pub mod variant;

pub use address::NativeSocketAddress;
pub use codec::{decode_from, encode_into, ProtocolFamily};
pub use layouts::{FamilyAccessor, Inet6Fields, InetFields, SockaddrLayouts, SOCKADDR_IN6_SIZE, SOCKADDR_IN_SIZE};
pub use platform::SockaddrPlatform;
pub use variant::{Sockaddr, SockaddrIn, SockaddrIn6};
