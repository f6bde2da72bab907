use std::mem;
use std::net::{Ipv4Addr, SocketAddr};

/// Fill a `sockaddr_storage` for `addr`, returning it with its length.
pub(crate) fn to_storage(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    // SAFETY: sockaddr_storage is plain old data; all-zero is a valid value.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            // SAFETY: sockaddr_storage is sized and aligned for every socket
            // address type, including sockaddr_in.
            let sin = unsafe {
                &mut *(&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in>()
            };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr = libc::in_addr {
                s_addr: u32::from_ne_bytes(v4.ip().octets()),
            };
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            // SAFETY: as above, for sockaddr_in6.
            let sin6 = unsafe {
                &mut *(&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in6>()
            };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_addr = libc::in6_addr {
                s6_addr: v6.ip().octets(),
            };
            sin6.sin6_scope_id = v6.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

/// Read an IPv4 address out of a generic socket address.
///
/// # Safety
///
/// `sa` must be null or point to a valid socket address whose storage is at
/// least as large as its family requires.
pub(crate) unsafe fn ipv4_from_sockaddr(sa: *const libc::sockaddr) -> Option<Ipv4Addr> {
    if sa.is_null() || i32::from((*sa).sa_family) != libc::AF_INET {
        return None;
    }
    let sin = &*sa.cast::<libc::sockaddr_in>();
    Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)))
}
