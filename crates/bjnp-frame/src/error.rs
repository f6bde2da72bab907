/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header does not start with the "BJNP" identifier.
    #[error("invalid frame magic (expected \"BJNP\")")]
    BadMagic,

    /// Fewer bytes were supplied than the header or declared payload requires.
    #[error("truncated frame ({available} bytes, need {needed})")]
    Truncated { needed: usize, available: usize },

    /// The command/response code is not one this codec understands.
    #[error("unknown command/response code 0x{0:02x}")]
    UnknownCode(u8),

    /// The payload is present but internally inconsistent.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The payload exceeds the maximum the protocol allows.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
