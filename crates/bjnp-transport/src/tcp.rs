//! TCP print channel connect.

use std::io;
use std::mem;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::poll::wait_writable;
use crate::sockaddr::to_storage;

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

fn set_int_option(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    // SAFETY: `value` is a live c_int and the length passed matches its size.
    cvt(unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    })?;
    Ok(())
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on an open descriptor owned by the caller.
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFD) })?;
    // SAFETY: as above.
    cvt(unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) })?;
    Ok(())
}

fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    // SAFETY: fcntl on an open descriptor owned by the caller.
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: as above.
    cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, flags) })?;
    Ok(())
}

fn take_socket_error(fd: RawFd) -> io::Result<Option<io::Error>> {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: `value` and `len` are valid writable pointers of the sizes given.
    cvt(unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            (&mut value as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    })?;
    Ok((value != 0).then(|| io::Error::from_raw_os_error(value)))
}

/// Open the TCP print channel to `addr`.
///
/// The socket is close-on-exec with address reuse enabled and Nagle's
/// algorithm disabled. The connect itself is bounded by `timeout`; the
/// returned stream is blocking.
pub fn connect_tcp(addr: SocketAddr, timeout: Duration) -> Result<TcpStream> {
    let domain = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };
    // SAFETY: plain socket(2) call; the result is checked before use.
    let raw = cvt(unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) })
        .map_err(TransportError::Socket)?;
    // SAFETY: `raw` is a freshly created descriptor that nothing else owns.
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let configure = |fd: RawFd| -> io::Result<()> {
        set_cloexec(fd)?;
        set_int_option(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        set_int_option(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY, 1)?;
        set_nonblocking(fd, true)
    };
    configure(fd.as_raw_fd()).map_err(TransportError::Socket)?;

    let connect_err = |source: io::Error| TransportError::Connect { addr, source };
    let (storage, len) = to_storage(&addr);
    // SAFETY: `storage` holds a valid socket address of length `len`.
    let rc = unsafe {
        libc::connect(
            fd.as_raw_fd(),
            (&storage as *const libc::sockaddr_storage).cast::<libc::sockaddr>(),
            len,
        )
    };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINPROGRESS) {
            return Err(connect_err(err));
        }
        if !wait_writable(fd.as_raw_fd(), Some(timeout)).map_err(connect_err)? {
            return Err(connect_err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect timed out",
            )));
        }
        if let Some(err) = take_socket_error(fd.as_raw_fd()).map_err(connect_err)? {
            return Err(connect_err(err));
        }
    }

    set_nonblocking(fd.as_raw_fd(), false).map_err(TransportError::Socket)?;
    debug!(%addr, "connected print channel");
    Ok(TcpStream::from(fd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn connects_with_nodelay() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut stream = connect_tcp(addr, Duration::from_secs(2)).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        assert!(stream.nodelay().unwrap());
        stream.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn refused_connect_reports_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect_tcp(addr, Duration::from_secs(2)).unwrap_err();
        match err {
            TransportError::Connect { addr: failed, .. } => assert_eq!(failed, addr),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stream_is_blocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = connect_tcp(listener.local_addr().unwrap(), Duration::from_secs(2)).unwrap();
        // SAFETY: fcntl on the test's own open descriptor.
        let flags = unsafe { libc::fcntl(stream.as_raw_fd(), libc::F_GETFL) };
        assert_eq!(flags & libc::O_NONBLOCK, 0);
    }
}
