//! IPv4 network interface enumeration.

use std::io;
use std::net::Ipv4Addr;

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::sockaddr::ipv4_from_sockaddr;

/// An IPv4 address configured on a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub address: Ipv4Addr,
    pub broadcast: Option<Ipv4Addr>,
    pub loopback: bool,
}

impl Interface {
    /// Usable for discovery: not loopback and has a broadcast address.
    pub fn can_broadcast(&self) -> bool {
        !self.loopback && self.broadcast.is_some()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn broadcast_field(ifa: &libc::ifaddrs) -> *const libc::sockaddr {
    ifa.ifa_ifu
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn broadcast_field(ifa: &libc::ifaddrs) -> *const libc::sockaddr {
    ifa.ifa_dstaddr
}

/// List the IPv4 addresses of all interfaces that are up.
pub fn interfaces() -> Result<Vec<Interface>> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: `head` is a valid out-pointer; the list is freed below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(TransportError::Interfaces(io::Error::last_os_error()));
    }

    let mut found = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` walks the list returned by getifaddrs, which stays
        // valid until freeifaddrs.
        let ifa = unsafe { &*cursor };
        cursor = ifa.ifa_next;

        let flags = ifa.ifa_flags as libc::c_int;
        if flags & libc::IFF_UP == 0 {
            continue;
        }
        // SAFETY: address pointers from getifaddrs are null or valid sockaddrs.
        let Some(address) = (unsafe { ipv4_from_sockaddr(ifa.ifa_addr) }) else {
            continue;
        };
        let broadcast = if flags & libc::IFF_BROADCAST != 0 {
            // SAFETY: as above; with IFF_BROADCAST set the field holds the
            // broadcast address.
            unsafe { ipv4_from_sockaddr(broadcast_field(ifa)) }
        } else {
            None
        };
        // SAFETY: ifa_name is a NUL-terminated string owned by the list.
        let name = unsafe { std::ffi::CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .into_owned();

        trace!(%name, %address, ?broadcast, "found interface");
        found.push(Interface {
            name,
            address,
            broadcast,
            loopback: flags & libc::IFF_LOOPBACK != 0,
        });
    }

    // SAFETY: `head` came from a successful getifaddrs and is freed once.
    unsafe { libc::freeifaddrs(head) };
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_interfaces() {
        let all = interfaces().unwrap();
        for iface in &all {
            assert!(!iface.name.is_empty());
            if iface.loopback {
                assert!(iface.address.is_loopback());
                assert!(!iface.can_broadcast());
            }
        }
    }

    #[test]
    fn broadcast_capability() {
        let iface = Interface {
            name: "eth0".into(),
            address: Ipv4Addr::new(192, 168, 1, 5),
            broadcast: Some(Ipv4Addr::new(192, 168, 1, 255)),
            loopback: false,
        };
        assert!(iface.can_broadcast());
        assert!(!Interface {
            broadcast: None,
            ..iface
        }
        .can_broadcast());
    }
}
