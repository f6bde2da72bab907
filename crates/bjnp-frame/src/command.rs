use bytes::{BufMut, BytesMut};

use crate::code::{CLOSE, DISCOVER, GET_IDENTITY, GET_STATUS, JOB_DETAILS, PRINT};
use crate::codec::MAX_PRINT_PAYLOAD;
use crate::error::{FrameError, Result};
use crate::wide::put_wide_str;

/// Size of the leading field of the job details payload whose meaning is unknown.
pub const JOB_UNKNOWN_FIELD: usize = 8;
/// Size of the wide-string hostname field.
pub const JOB_HOSTNAME_FIELD: usize = 64;
/// Size of the wide-string username field.
pub const JOB_USERNAME_FIELD: usize = 64;
/// Size of the wide-string job title field.
pub const JOB_TITLE_FIELD: usize = 256;
/// Total job details payload size.
pub const JOB_DETAILS_PAYLOAD: usize =
    JOB_UNKNOWN_FIELD + JOB_HOSTNAME_FIELD + JOB_USERNAME_FIELD + JOB_TITLE_FIELD;

/// Owner details sent when opening a print session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDetails<'a> {
    pub hostname: &'a str,
    pub username: &'a str,
    pub title: &'a str,
}

/// A command sent from host to printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Broadcast probe for printers.
    Discover,
    /// Job owner details; the reply assigns the session id.
    JobDetails(JobDetails<'a>),
    /// End of the print session.
    Close,
    /// Raw print data, at most [`MAX_PRINT_PAYLOAD`] bytes. Empty is a keep-alive.
    Print(&'a [u8]),
    /// Status string request.
    GetStatus,
    /// IEEE1284 identity request.
    GetIdentity,
}

impl Command<'_> {
    /// The command code written to the header.
    pub fn code(&self) -> u8 {
        match self {
            Command::Discover => DISCOVER,
            Command::JobDetails(_) => JOB_DETAILS,
            Command::Close => CLOSE,
            Command::Print(_) => PRINT,
            Command::GetStatus => GET_STATUS,
            Command::GetIdentity => GET_IDENTITY,
        }
    }

    /// Payload size in bytes, excluding the header.
    pub fn payload_len(&self) -> usize {
        match self {
            Command::JobDetails(_) => JOB_DETAILS_PAYLOAD,
            Command::Print(data) => data.len(),
            Command::Discover | Command::Close | Command::GetStatus | Command::GetIdentity => 0,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Command::Print(data) = self {
            if data.len() > MAX_PRINT_PAYLOAD {
                return Err(FrameError::PayloadTooLarge {
                    size: data.len(),
                    max: MAX_PRINT_PAYLOAD,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn encode_payload(&self, dst: &mut BytesMut) {
        match self {
            Command::JobDetails(details) => {
                dst.put_bytes(0, JOB_UNKNOWN_FIELD);
                put_wide_str(dst, details.hostname, JOB_HOSTNAME_FIELD);
                put_wide_str(dst, details.username, JOB_USERNAME_FIELD);
                put_wide_str(dst, details.title, JOB_TITLE_FIELD);
            }
            Command::Print(data) => dst.put_slice(data),
            Command::Discover | Command::Close | Command::GetStatus | Command::GetIdentity => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, HEADER_SIZE};
    use crate::wide::decode_wide_str;

    #[test]
    fn job_details_layout() {
        let command = Command::JobDetails(JobDetails {
            hostname: "host",
            username: "bob",
            title: "title",
        });
        let wire = encode(&command, 0, 1).unwrap();
        let payload = &wire[HEADER_SIZE..];
        assert_eq!(payload.len(), JOB_DETAILS_PAYLOAD);
        assert!(payload[..JOB_UNKNOWN_FIELD].iter().all(|b| *b == 0));

        let host_start = JOB_UNKNOWN_FIELD;
        let user_start = host_start + JOB_HOSTNAME_FIELD;
        let title_start = user_start + JOB_USERNAME_FIELD;
        assert_eq!(decode_wide_str(&payload[host_start..user_start]), "host");
        assert_eq!(decode_wide_str(&payload[user_start..title_start]), "bob");
        assert_eq!(decode_wide_str(&payload[title_start..]), "title");
        assert_eq!(&payload[host_start..host_start + 4], &[0, b'h', 0, b'o']);
    }

    #[test]
    fn long_title_truncated_not_overflowed() {
        let title = "t".repeat(1000);
        let command = Command::JobDetails(JobDetails {
            hostname: "h",
            username: "u",
            title: &title,
        });
        let wire = encode(&command, 0, 1).unwrap();
        assert_eq!(wire.len(), HEADER_SIZE + JOB_DETAILS_PAYLOAD);
    }

    #[test]
    fn keep_alive_has_empty_payload() {
        let command = Command::Print(&[]);
        assert_eq!(command.payload_len(), 0);
        assert_eq!(encode(&command, 3, 4).unwrap().len(), HEADER_SIZE);
    }
}
