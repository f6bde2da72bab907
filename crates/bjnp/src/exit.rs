use std::fmt;
use std::io;

use bjnp_client::ClientError;
use bjnp_frame::FrameError;
use bjnp_transport::TransportError;

// Exit codes follow the spooler backend convention.
pub const SUCCESS: i32 = 0;
pub const FAILED: i32 = 1;
pub const STOP: i32 = 4;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(FAILED, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(FAILED, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(FAILED, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(FAILED, format!("{context}: {err}"))
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Frame(err) => frame_error(context, err),
        ClientError::Input(err) | ClientError::Io(err) => io_error(context, err),
        other => CliError::new(FAILED, format!("{context}: {other}")),
    }
}

/// A printer address the spooler can never reach; retrying the job is pointless.
pub fn target_error(context: &str, err: impl fmt::Display) -> CliError {
    CliError::new(STOP, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bjnp_client::ChannelError;

    #[test]
    fn client_errors_map_to_failed() {
        let err = client_error(
            "print failed",
            ClientError::Channel(ChannelError::SequenceMismatch {
                expected: 3,
                received: 4,
            }),
        );
        assert_eq!(err.code, FAILED);
        assert!(err.message.starts_with("print failed: "));
    }

    #[test]
    fn usage_is_failed() {
        assert_eq!(CliError::usage("bad").code, FAILED);
    }

    #[test]
    fn bad_target_stops_queue() {
        let err = target_error("unable to locate printer", "nowhere");
        assert_eq!(err.code, STOP);
        assert_eq!(err.to_string(), "unable to locate printer: nowhere");
    }
}
