//! The TCP print data channel: one unacknowledged write at a time.

use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::time::Duration;

use bjnp_frame::code::PRINT;
use bjnp_frame::{
    decode, decode_header, encode, hexdump, Command, FrameError, Response, HEADER_SIZE,
    MAX_DATAGRAM, MAX_PRINT_PAYLOAD,
};
use bjnp_transport::wait_readable;
use tracing::{debug, error, trace, warn};

use crate::error::ChannelError;
use crate::session::Session;

/// Escape sequence that must start a print frame of its own.
pub const CONTROL_MARKER: [u8; 6] = [0x1b, 0x5b, 0x4b, 0x02, 0x00, 0x00];

/// How long to wait for the payload of an acknowledgment once its header arrived.
pub const ACK_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of reading one frame from the print channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The printer took all bytes of the pending write.
    Acked(usize),
    /// The printer took nothing; the same bytes must be sent again.
    Throttled,
    /// Not a print response; the pending write is still outstanding.
    NotAnAck,
}

/// Offset of the first control marker, ignoring one at offset 0.
///
/// A marker that ends exactly at the end of `buf` is found too, so it is never
/// sent glued to the bytes before it.
pub fn find_control_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(CONTROL_MARKER.len())
        .skip(1)
        .position(|window| window == CONTROL_MARKER)
        .map(|pos| pos + 1)
}

/// Number of bytes of `buf` the next print frame carries.
pub fn chunk_len(buf: &[u8]) -> usize {
    find_control_marker(buf)
        .unwrap_or(buf.len())
        .min(MAX_PRINT_PAYLOAD)
}

/// Send the next print frame for `buffer` and occupy the session's slot.
///
/// Only the bytes before a control marker are sent; the caller resubmits the
/// rest. An empty buffer sends a keep-alive. Returns the number of print
/// bytes sent.
pub fn submit<S: Write>(
    stream: &mut S,
    session: &mut Session,
    buffer: &[u8],
) -> Result<usize, ChannelError> {
    if let Some((sequence, _)) = session.slot().pending() {
        return Err(ChannelError::SlotBusy { sequence });
    }

    let count = chunk_len(buffer);
    let sequence = session.next_sequence();
    let frame = encode(&Command::Print(&buffer[..count]), session.session_id(), sequence)?;
    trace!(sequence, count, "print frame\n{}", hexdump(&frame[..HEADER_SIZE]));

    let written = stream.write(&frame)?;
    if written != frame.len() {
        return Err(ChannelError::ShortWrite {
            written,
            expected: frame.len(),
        });
    }

    session.slot_mut().occupy(sequence, count);
    debug!(sequence, count, "print data sent");
    Ok(count)
}

/// Read one frame from the print channel and settle the pending write.
pub fn receive_ack<S: Read + AsRawFd>(
    stream: &mut S,
    session: &mut Session,
) -> Result<AckOutcome, ChannelError> {
    let mut frame = vec![0u8; HEADER_SIZE];
    stream.read_exact(&mut frame)?;
    let header = decode_header(&frame)?;

    let payload_len = header.payload_len as usize;
    if payload_len > MAX_DATAGRAM {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_DATAGRAM,
        }
        .into());
    }
    if payload_len > 0 {
        if !wait_readable(stream.as_raw_fd(), Some(ACK_PAYLOAD_TIMEOUT))? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "acknowledgment payload did not arrive",
            )
            .into());
        }
        frame.resize(HEADER_SIZE + payload_len, 0);
        stream.read_exact(&mut frame[HEADER_SIZE..])?;
    }
    trace!("print channel frame\n{}", hexdump(&frame));

    if header.code != PRINT {
        debug!(code = header.code, sequence = header.sequence, "not an ack");
        return Ok(AckOutcome::NotAnAck);
    }
    let Some((expected, sent)) = session.slot().pending() else {
        error!(sequence = header.sequence, "ack without a pending write");
        return Err(ChannelError::UnsolicitedAck {
            sequence: header.sequence,
        });
    };
    if header.sequence != expected {
        error!(expected, received = header.sequence, "print channel out of sync");
        return Err(ChannelError::SequenceMismatch {
            expected,
            received: header.sequence,
        });
    }

    let accepted = match decode(&frame)?.response {
        Response::Print { accepted } => accepted,
        _ => 0,
    };
    session.slot_mut().release();

    if accepted as usize == sent {
        debug!(sequence = expected, accepted, "print data acknowledged");
        Ok(AckOutcome::Acked(sent))
    } else if accepted == 0 {
        debug!(sequence = expected, sent, "printer throttled");
        Ok(AckOutcome::Throttled)
    } else {
        warn!(sequence = expected, sent, accepted, "printer accepted a partial write");
        Err(ChannelError::ImpossibleCount { sent, accepted })
    }
}
