//! Readiness multiplexing over `poll(2)`.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// What a caller wants to hear about for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
}

impl Interest {
    pub const NONE: Interest = Interest {
        read: false,
        write: false,
    };
    pub const READ: Interest = Interest {
        read: true,
        write: false,
    };
    pub const WRITE: Interest = Interest {
        read: false,
        write: true,
    };
    pub const BOTH: Interest = Interest {
        read: true,
        write: true,
    };

    pub fn is_empty(self) -> bool {
        !self.read && !self.write
    }
}

/// One descriptor in a readiness wait, with the result of the last wait.
#[derive(Debug, Clone, Copy)]
pub struct PollEntry {
    fd: RawFd,
    interest: Interest,
    readable: bool,
    writable: bool,
}

impl PollEntry {
    pub fn new(fd: RawFd, interest: Interest) -> Self {
        Self {
            fd,
            interest,
            readable: false,
            writable: false,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    pub fn set_interest(&mut self, interest: Interest) {
        self.interest = interest;
    }

    /// Readable, hung up or in error. A following read will not block.
    pub fn readable(&self) -> bool {
        self.readable
    }

    pub fn writable(&self) -> bool {
        self.writable
    }
}

fn timeout_millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) if d.is_zero() => 0,
        Some(d) => d.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int,
    }
}

/// Wait until at least one entry is ready or `timeout` elapses.
///
/// Returns the number of ready entries; zero means the wait timed out.
/// Entries with no interest are skipped. An interrupted wait surfaces as
/// [`io::ErrorKind::Interrupted`].
pub fn wait_readiness(entries: &mut [PollEntry], timeout: Option<Duration>) -> io::Result<usize> {
    let mut fds: Vec<libc::pollfd> = entries
        .iter()
        .map(|entry| {
            let mut events = 0;
            if entry.interest.read {
                events |= libc::POLLIN;
            }
            if entry.interest.write {
                events |= libc::POLLOUT;
            }
            libc::pollfd {
                // Negative descriptors are ignored by poll.
                fd: if entry.interest.is_empty() { -1 } else { entry.fd },
                events,
                revents: 0,
            }
        })
        .collect();

    // SAFETY: `fds` is a valid, initialized array of `fds.len()` pollfd
    // structures that outlives the call.
    let rc = unsafe {
        libc::poll(
            fds.as_mut_ptr(),
            fds.len() as libc::nfds_t,
            timeout_millis(timeout),
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut ready = 0;
    for (entry, pfd) in entries.iter_mut().zip(&fds) {
        if pfd.revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        let failed = pfd.revents & (libc::POLLHUP | libc::POLLERR) != 0;
        entry.readable = entry.interest.read && (pfd.revents & libc::POLLIN != 0 || failed);
        entry.writable = entry.interest.write && (pfd.revents & libc::POLLOUT != 0 || failed);
        if entry.readable || entry.writable {
            ready += 1;
        }
    }
    Ok(ready)
}

/// Wait for a single descriptor to become readable.
pub fn wait_readable(fd: RawFd, timeout: Option<Duration>) -> io::Result<bool> {
    let mut entry = [PollEntry::new(fd, Interest::READ)];
    Ok(wait_readiness(&mut entry, timeout)? > 0 && entry[0].readable())
}

/// Wait for a single descriptor to become writable.
pub fn wait_writable(fd: RawFd, timeout: Option<Duration>) -> io::Result<bool> {
    let mut entry = [PollEntry::new(fd, Interest::WRITE)];
    Ok(wait_readiness(&mut entry, timeout)? > 0 && entry[0].writable())
}
