//! BJNP wire format.
//!
//! Every frame starts with a fixed 16-byte header in network byte order:
//! - the 4-byte magic "BJNP"
//! - device type and command/response code (1 byte each)
//! - a reserved 16-bit field, the sequence number and the session id
//! - a 32-bit payload length that excludes the header
//!
//! Commands and responses are explicit tagged enums; decoding inspects the
//! code and declared length before touching any payload byte.

pub mod code;
pub mod codec;
pub mod command;
pub mod dump;
pub mod error;
pub mod response;
pub mod text;
pub mod wide;

pub use code::code_name;
pub use codec::{
    decode, decode_header, encode, encode_command, encode_response, Frame, Header, HEADER_SIZE,
    MAGIC, MAX_DATAGRAM, MAX_PRINT_PAYLOAD,
};
pub use command::{Command, JobDetails};
pub use dump::hexdump;
pub use error::{FrameError, Result};
pub use response::{DiscoverReply, MacAddress, Response, ACCEPTED_FIELD, MAX_ID_LEN};
pub use text::{
    parse_model, parse_paper_status, parse_status_flags, DeviceIdentity, PaperStatus, StatusFlags,
};
