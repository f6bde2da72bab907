//! BJNP printer client.
//!
//! Finds printers by broadcast, negotiates print sessions over UDP and
//! streams print data over the TCP print channel with one unacknowledged
//! write at a time. Everything runs on the calling thread.

pub mod channel;
pub mod commands;
pub mod control;
pub mod discovery;
pub mod error;
pub mod printer;
pub mod runloop;
pub mod sequence;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use channel::{find_control_marker, receive_ack, submit, AckOutcome, CONTROL_MARKER};
pub use commands::{exchange, get_identity, get_status, ExchangeConfig};
pub use control::{
    ControlChannel, ControlMessage, ControlRequest, ControlStatus, JsonControlChannel,
    CONTROL_DRAIN_OUTPUT, CONTROL_GET_BIDI, CONTROL_GET_DEVICE_ID,
};
pub use discovery::{Discovery, DiscoveryConfig};
pub use error::{ChannelError, ClientError, FailureKind, Result};
pub use printer::{AddressRank, DiscoveredPrinter, InvalidTarget, PrinterTarget};
pub use runloop::{RunLoop, RunLoopConfig, KEEP_ALIVE_SECONDS};
pub use sequence::Sequencer;
pub use session::{IoSlot, PaperProbe, Session, SessionConfig, SessionManager};
pub use state::{PrinterState, SpoolerStateReporter, StateEvent, StateReporter};
