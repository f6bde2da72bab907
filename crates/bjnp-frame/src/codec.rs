use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::code::{self, DEVICE_PRINTER, RESPONSE_PRINTER};
use crate::command::Command;
use crate::error::{FrameError, Result};
use crate::response::Response;

/// Frame header: magic (4) + type (1) + code (1) + reserved (2) + sequence (2)
/// + session (2) + payload length (4) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Magic bytes: "BJNP".
pub const MAGIC: [u8; 4] = *b"BJNP";

/// Largest print payload carried by a single Print frame.
pub const MAX_PRINT_PAYLOAD: usize = 4096;

/// Receive buffer size for a single UDP response datagram.
pub const MAX_DATAGRAM: usize = 4096;

/// The fixed frame header shared by commands and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Printer/scanner command, or printer/scanner response.
    pub device_type: u8,
    /// Command or response code.
    pub code: u8,
    /// Sequence number stamped by the sender.
    pub sequence: u16,
    /// Session id assigned by the printer (zero before a session exists).
    pub session_id: u16,
    /// Number of payload bytes following the header.
    pub payload_len: u32,
}

impl Header {
    /// Build a printer command header.
    pub fn command(code: u8, sequence: u16, session_id: u16, payload_len: u32) -> Self {
        Self {
            device_type: DEVICE_PRINTER,
            code,
            sequence,
            session_id,
            payload_len,
        }
    }

    /// Build a printer response header.
    pub fn response(code: u8, sequence: u16, session_id: u16, payload_len: u32) -> Self {
        Self {
            device_type: RESPONSE_PRINTER,
            code,
            sequence,
            session_id,
            payload_len,
        }
    }

    /// The total wire size of the frame this header describes.
    pub fn frame_size(&self) -> usize {
        HEADER_SIZE + self.payload_len as usize
    }

    /// Write the header in network byte order.
    ///
    /// Wire format:
    /// ```text
    /// ┌──────────┬──────┬──────┬──────────┬──────────┬──────────┬─────────────┐
    /// │ "BJNP"   │ type │ code │ reserved │ sequence │ session  │ payload len │
    /// │ (4B)     │ (1B) │ (1B) │ (2B, 0)  │ (2B BE)  │ (2B BE)  │ (4B BE)     │
    /// └──────────┴──────┴──────┴──────────┴──────────┴──────────┴─────────────┘
    /// ```
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_slice(&MAGIC);
        dst.put_u8(self.device_type);
        dst.put_u8(self.code);
        dst.put_u16(0);
        dst.put_u16(self.sequence);
        dst.put_u16(self.session_id);
        dst.put_u32(self.payload_len);
    }
}

/// Decode only the fixed header.
///
/// Fails with `Truncated` before looking at any byte if fewer than
/// [`HEADER_SIZE`] bytes were supplied.
pub fn decode_header(src: &[u8]) -> Result<Header> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE,
            available: src.len(),
        });
    }
    if src[..MAGIC.len()] != MAGIC {
        return Err(FrameError::BadMagic);
    }

    let mut buf = &src[MAGIC.len()..HEADER_SIZE];
    let device_type = buf.get_u8();
    let code = buf.get_u8();
    let _reserved = buf.get_u16();
    let sequence = buf.get_u16();
    let session_id = buf.get_u16();
    let payload_len = buf.get_u32();

    Ok(Header {
        device_type,
        code,
        sequence,
        session_id,
        payload_len,
    })
}

/// Encode a command into `dst`, stamping magic, type, code, sequence,
/// session id and payload length (which excludes the header).
pub fn encode_command(
    command: &Command<'_>,
    session_id: u16,
    sequence: u16,
    dst: &mut BytesMut,
) -> Result<()> {
    let payload_len = command.payload_len();
    if payload_len > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: u32::MAX as usize,
        });
    }
    command.validate()?;

    Header::command(command.code(), sequence, session_id, payload_len as u32).encode(dst);
    dst.reserve(payload_len);
    command.encode_payload(dst);
    Ok(())
}

/// Encode a command into a fresh buffer.
pub fn encode(command: &Command<'_>, session_id: u16, sequence: u16) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + command.payload_len());
    encode_command(command, session_id, sequence, &mut dst)?;
    Ok(dst.freeze())
}

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The validated header.
    pub header: Header,
    /// The response variant selected by the header's code.
    pub response: Response,
}

/// Decode a complete response frame.
///
/// The code is inspected before any payload byte is interpreted, and the
/// declared payload length must fit inside `src`. Bytes past the declared
/// payload are ignored.
pub fn decode(src: &[u8]) -> Result<Frame> {
    let header = decode_header(src)?;
    let total = header.frame_size();
    if src.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: src.len(),
        });
    }
    if !code::is_known(header.code) {
        return Err(FrameError::UnknownCode(header.code));
    }

    let payload = &src[HEADER_SIZE..total];
    let response = Response::decode_payload(&header, payload)?;
    Ok(Frame { header, response })
}

/// Encode a response frame, as a printer would send it.
///
/// For `JobDetails` the session id carried by the variant is written to the
/// header and `session_id` is ignored.
pub fn encode_response(
    response: &Response,
    session_id: u16,
    sequence: u16,
    dst: &mut BytesMut,
) -> Result<()> {
    let payload = response.encode_payload()?;
    let session_id = match response {
        Response::JobDetails { session_id } => *session_id,
        _ => session_id,
    };
    Header::response(response.code(), sequence, session_id, payload.len() as u32).encode(dst);
    dst.put_slice(&payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CLOSE, GET_IDENTITY, GET_STATUS, JOB_DETAILS, PRINT};
    use crate::command::JobDetails;

    #[test]
    fn header_roundtrip_for_every_command() {
        let details = JobDetails {
            hostname: "workstation",
            username: "alice",
            title: "report.pdf",
        };
        let data = [0x55u8; 300];
        let commands = [
            Command::Discover,
            Command::JobDetails(details),
            Command::Close,
            Command::Print(&data),
            Command::Print(&[]),
            Command::GetStatus,
            Command::GetIdentity,
        ];

        for (i, command) in commands.iter().enumerate() {
            let sequence = 0xfff0 + i as u16;
            let wire = encode(command, 0x1234, sequence).unwrap();
            let header = decode_header(&wire).unwrap();

            assert_eq!(header.device_type, DEVICE_PRINTER);
            assert_eq!(header.code, command.code());
            assert_eq!(header.sequence, sequence);
            assert_eq!(header.session_id, 0x1234);
            assert_eq!(header.payload_len as usize, command.payload_len());
            assert_eq!(wire.len(), header.frame_size());
        }
    }

    #[test]
    fn header_bytes_are_network_order() {
        let wire = encode(&Command::Print(b"abc"), 0x0102, 0x0304).unwrap();
        assert_eq!(
            &wire[..HEADER_SIZE],
            &[b'B', b'J', b'N', b'P', 0x01, PRINT, 0, 0, 0x03, 0x04, 0x01, 0x02, 0, 0, 0, 3]
        );
        assert_eq!(&wire[HEADER_SIZE..], b"abc");
    }

    #[test]
    fn short_input_is_truncated_for_every_length() {
        let wire = encode(&Command::GetStatus, 0, 1).unwrap();
        for len in 0..HEADER_SIZE {
            let err = decode(&wire[..len]).unwrap_err();
            assert!(
                matches!(err, FrameError::Truncated { needed: HEADER_SIZE, available } if available == len),
                "len {len}: {err:?}"
            );
        }
    }

    #[test]
    fn declared_length_beyond_buffer_is_truncated() {
        let mut buf = BytesMut::new();
        Header::response(GET_IDENTITY, 1, 0, 100).encode(&mut buf);
        buf.put_slice(&[0u8; 10]);

        let err = decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                needed: 116,
                available: 26
            }
        ));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut wire = encode(&Command::Close, 0, 1).unwrap().to_vec();
        wire[0] = b'X';
        assert!(matches!(decode(&wire), Err(FrameError::BadMagic)));
        assert!(matches!(decode_header(&wire), Err(FrameError::BadMagic)));
    }

    #[test]
    fn unknown_code_reported() {
        let mut buf = BytesMut::new();
        Header::response(0x32, 1, 0, 0).encode(&mut buf);
        assert!(matches!(decode(&buf), Err(FrameError::UnknownCode(0x32))));
    }

    #[test]
    fn response_frames_decode() {
        let cases = [
            (Response::JobDetails { session_id: 77 }, JOB_DETAILS),
            (Response::Close, CLOSE),
            (Response::Print { accepted: 4096 }, PRINT),
            (Response::Status("BST:00;".to_string()), GET_STATUS),
        ];
        for (response, code) in cases {
            let mut buf = BytesMut::new();
            encode_response(&response, 9, 42, &mut buf).unwrap();
            let frame = decode(&buf).unwrap();
            assert_eq!(frame.header.code, code);
            assert_eq!(frame.header.device_type, RESPONSE_PRINTER);
            assert_eq!(frame.header.sequence, 42);
            assert_eq!(frame.response, response);
        }
    }

    #[test]
    fn trailing_bytes_after_payload_ignored() {
        let mut buf = BytesMut::new();
        encode_response(&Response::Print { accepted: 5 }, 1, 2, &mut buf).unwrap();
        buf.put_slice(b"garbage");
        let frame = decode(&buf).unwrap();
        assert_eq!(frame.response, Response::Print { accepted: 5 });
    }

    #[test]
    fn oversized_print_payload_rejected() {
        let data = vec![0u8; MAX_PRINT_PAYLOAD + 1];
        let err = encode(&Command::Print(&data), 1, 1).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }
}
