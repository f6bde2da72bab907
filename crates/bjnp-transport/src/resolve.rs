//! Host name lookups.

use std::ffi::CStr;
use std::io;
use std::net::{IpAddr, SocketAddr};

use tracing::debug;

use crate::sockaddr::to_storage;

const MAX_HOST: usize = 1025;

/// Resolve `ip` to a host name. `None` when no name is registered.
pub fn reverse_lookup(ip: IpAddr) -> Option<String> {
    let (storage, len) = to_storage(&SocketAddr::new(ip, 0));
    let mut host = [0 as libc::c_char; MAX_HOST];
    // SAFETY: `storage` holds a socket address of length `len`, and `host`
    // is writable for the length passed. No service buffer is requested.
    let rc = unsafe {
        libc::getnameinfo(
            (&storage as *const libc::sockaddr_storage).cast::<libc::sockaddr>(),
            len,
            host.as_mut_ptr(),
            host.len() as libc::socklen_t,
            std::ptr::null_mut(),
            0,
            libc::NI_NAMEREQD,
        )
    };
    if rc != 0 {
        debug!(%ip, rc, "reverse lookup failed");
        return None;
    }
    // SAFETY: getnameinfo NUL-terminates `host` on success.
    let name = unsafe { CStr::from_ptr(host.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    (!name.is_empty()).then_some(name)
}

/// The local host name.
pub fn local_hostname() -> io::Result<String> {
    let mut buf = [0 as libc::c_char; 256];
    // SAFETY: `buf` is writable for one byte less than its length, which
    // keeps the final NUL even if the name is truncated.
    if unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len() - 1) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: the last byte of `buf` is never written, so it is terminated.
    Ok(unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned())
}
