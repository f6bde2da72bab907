//! Sockets for the BJNP protocol.
//!
//! Provides the transport pieces the client builds on:
//! - UDP request/response exchanges with timeout and retry
//! - broadcast-capable UDP sockets for discovery
//! - the TCP print channel connect
//! - a single readiness wait over any set of descriptors (`poll(2)`)
//! - interface enumeration and host name lookups
//!
//! Nothing here interprets frame contents.

pub mod error;
pub mod interfaces;
pub mod poll;
pub mod resolve;
pub mod tcp;
pub mod udp;

mod sockaddr;

pub use error::{Result, TransportError};
pub use interfaces::{interfaces, Interface};
pub use poll::{wait_readable, wait_readiness, wait_writable, Interest, PollEntry};
pub use resolve::{local_hostname, reverse_lookup};
pub use tcp::connect_tcp;
pub use udp::{broadcast_socket, send_request, MAX_DATAGRAM};
