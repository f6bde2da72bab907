//! UDP request/response exchanges and broadcast sockets.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::poll::wait_readable;

/// Largest datagram accepted from a printer.
pub const MAX_DATAGRAM: usize = 4096;

/// Datagrams shorter than a frame header are treated as lost.
pub const MIN_DATAGRAM: usize = 16;

fn unspecified_for(addr: &SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

/// Send `request` to `addr` and return the first datagram it answers with.
///
/// Each try sends the request once and waits up to `timeout` for a reply.
/// Timeouts, receive errors and datagrams shorter than a frame header count
/// as a failed try. The socket is closed on every exit path.
pub fn send_request(
    addr: SocketAddr,
    request: &[u8],
    timeout: Duration,
    max_tries: u32,
) -> Result<Vec<u8>> {
    let local = unspecified_for(&addr);
    let socket = UdpSocket::bind(local).map_err(|e| TransportError::Bind {
        addr: local,
        source: e,
    })?;
    socket
        .connect(addr)
        .map_err(|e| TransportError::Connect { addr, source: e })?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let tries = max_tries.max(1);
    for attempt in 1..=tries {
        let sent = socket.send(request)?;
        if sent != request.len() {
            debug!(%addr, attempt, sent, expected = request.len(), "short udp send");
            continue;
        }

        match wait_readable(socket.as_raw_fd(), Some(timeout)) {
            Ok(true) => {}
            Ok(false) => {
                debug!(%addr, attempt, ?timeout, "no udp response");
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        match socket.recv(&mut buf) {
            Ok(n) if n < MIN_DATAGRAM => {
                debug!(%addr, attempt, received = n, "short udp response");
            }
            Ok(n) => {
                trace!(%addr, attempt, received = n, "udp response");
                buf.truncate(n);
                return Ok(buf);
            }
            Err(e) => {
                debug!(%addr, attempt, error = %e, "udp receive failed");
            }
        }
    }

    Err(TransportError::RetriesExhausted { addr, tries })
}

/// Bind a broadcast-capable UDP socket on `local`.
pub fn broadcast_socket(local: SocketAddr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(local).map_err(|e| TransportError::Bind {
        addr: local,
        source: e,
    })?;
    socket.set_broadcast(true).map_err(TransportError::Socket)?;
    Ok(socket)
}
