use std::io;

use bjnp_frame::FrameError;
use bjnp_transport::TransportError;

/// How the run loop should react to a print channel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The printer ran out of paper; keep the data and try again.
    PaperOut,
    /// The printer is unreachable for now; try again.
    Offline,
    /// Transient condition; try again.
    Retry,
    /// The connection is unusable; abort the job.
    Fatal,
}

/// Errors on the TCP print channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A print write is still waiting for its acknowledgment.
    #[error("io slot busy: sequence {sequence} still unacknowledged")]
    SlotBusy { sequence: u16 },

    /// The frame was not written in a single write.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The acknowledgment does not belong to the pending write.
    #[error("sequence mismatch: expected {expected}, received {received}")]
    SequenceMismatch { expected: u16, received: u16 },

    /// An acknowledgment arrived while no write was pending.
    #[error("unsolicited acknowledgment with sequence {sequence}")]
    UnsolicitedAck { sequence: u16 },

    /// The printer accepted a byte count that is neither zero nor the full write.
    #[error("printer accepted {accepted} of {sent} bytes")]
    ImpossibleCount { sent: usize, accepted: u32 },

    /// A malformed frame arrived on the channel.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Socket failure.
    #[error("print channel I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    /// Classify this error for the run loop.
    pub fn kind(&self) -> FailureKind {
        match self {
            ChannelError::SlotBusy { .. } => FailureKind::Retry,
            ChannelError::Io(e) => classify_io(e),
            ChannelError::ShortWrite { .. }
            | ChannelError::SequenceMismatch { .. }
            | ChannelError::UnsolicitedAck { .. }
            | ChannelError::ImpossibleCount { .. }
            | ChannelError::Frame(_) => FailureKind::Fatal,
        }
    }
}

/// Map an OS error to the run loop's reaction.
pub fn classify_io(err: &io::Error) -> FailureKind {
    match err.raw_os_error() {
        Some(libc::ENOSPC) => return FailureKind::PaperOut,
        Some(libc::ENXIO) | Some(libc::EHOSTUNREACH) | Some(libc::ENETUNREACH) => {
            return FailureKind::Offline
        }
        _ => {}
    }
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => FailureKind::Retry,
        _ => FailureKind::Fatal,
    }
}

/// Errors from discovery, session management and the run loop.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Print channel error.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The printer answered with a different code than was asked for.
    #[error("unexpected response code {received:#04x} (expected {expected:#04x})")]
    UnexpectedResponse { expected: u8, received: u8 },

    /// None of the candidate addresses accepted a print session.
    #[error("no printer answered at {0}")]
    NoPrinter(String),

    /// Reading the local print data failed.
    #[error("failed to read print data: {0}")]
    Input(io::Error),

    /// Control channel failure.
    #[error("control channel error: {0}")]
    Control(io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// True when the printer could not be reached at all, as opposed to a
    /// failure after it answered.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ClientError::NoPrinter(_) => true,
            ClientError::Transport(TransportError::RetriesExhausted { .. })
            | ClientError::Transport(TransportError::Connect { .. }) => true,
            ClientError::Channel(e) => e.kind() == FailureKind::Offline,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
