use std::net::SocketAddr;

/// Errors that can occur in BJNP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create or configure a socket.
    #[error("failed to create socket: {0}")]
    Socket(std::io::Error),

    /// Failed to bind a local address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// A UDP request/response exchange got no usable answer.
    #[error("no response from {addr} after {tries} tries")]
    RetriesExhausted { addr: SocketAddr, tries: u32 },

    /// An I/O error occurred on an open socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network interfaces could not be enumerated.
    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(std::io::Error),
}

impl TransportError {
    /// The underlying OS error, if any.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Socket(e) | TransportError::Io(e) | TransportError::Interfaces(e) => {
                Some(e)
            }
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                Some(source)
            }
            TransportError::RetriesExhausted { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
