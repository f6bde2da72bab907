//! Canon BJNP network printing.
//!
//! bjnp finds Canon printers on the local network and streams print data to
//! them over the BJNP protocol: UDP for discovery and session control, TCP
//! for the print data itself.
//!
//! # Crate Structure
//!
//! - [`transport`]: sockets, readiness waits and interface enumeration
//! - [`frame`]: the 16-byte BJNP header and command/response payloads
//! - [`client`]: discovery, print sessions and the print run loop (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use bjnp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bjnp_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use bjnp_client::*;
}
