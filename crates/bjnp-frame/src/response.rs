use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, BytesMut};

use crate::code::{CLOSE, DISCOVER, GET_IDENTITY, GET_STATUS, JOB_DETAILS, PRINT};
use crate::codec::Header;
use crate::error::{FrameError, Result};

/// Maximum accepted length of an identity or status string.
pub const MAX_ID_LEN: usize = 1024;

/// Size of the "accepted bytes" field of a print response.
pub const ACCEPTED_FIELD: usize = 4;

/// Maximum number of IPv6 addresses in a discover response.
pub const MAX_IPV6_ADDRESSES: usize = 8;

const MAC_LEN: usize = 6;
const IPV4_LEN: usize = 4;
const IPV6_LEN: usize = 16;
const DISCOVER_PREAMBLE: [u8; 4] = [0x00, 0x01, 0x08, 0x00];
const LENGTH_PREFIX: usize = 2;

/// A printer's hardware address, as reported in a discover response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Payload of a discover response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverReply {
    pub mac: MacAddress,
    /// One IPv4 address, or one or more IPv6 addresses.
    pub addresses: Vec<IpAddr>,
}

/// A response sent from printer to host, selected by the header's code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Discover(DiscoverReply),
    /// Session id assigned by the printer (taken from the header).
    JobDetails { session_id: u16 },
    Close,
    /// Number of print bytes the printer accepted. Zero when the frame has no payload.
    Print { accepted: u32 },
    /// Semicolon-delimited status string.
    Status(String),
    /// Semicolon-delimited IEEE1284 identity string.
    Identity(String),
}

impl Response {
    /// The response code written to the header.
    pub fn code(&self) -> u8 {
        match self {
            Response::Discover(_) => DISCOVER,
            Response::JobDetails { .. } => JOB_DETAILS,
            Response::Close => CLOSE,
            Response::Print { .. } => PRINT,
            Response::Status(_) => GET_STATUS,
            Response::Identity(_) => GET_IDENTITY,
        }
    }

    pub(crate) fn decode_payload(header: &Header, payload: &[u8]) -> Result<Self> {
        match header.code {
            DISCOVER => decode_discover(payload).map(Response::Discover),
            JOB_DETAILS => Ok(Response::JobDetails {
                session_id: header.session_id,
            }),
            CLOSE => Ok(Response::Close),
            PRINT => {
                let accepted = if payload.len() >= ACCEPTED_FIELD {
                    (&payload[..ACCEPTED_FIELD]).get_u32()
                } else {
                    0
                };
                Ok(Response::Print { accepted })
            }
            GET_STATUS => decode_length_prefixed(payload).map(Response::Status),
            GET_IDENTITY => decode_length_prefixed(payload).map(Response::Identity),
            other => Err(FrameError::UnknownCode(other)),
        }
    }

    pub(crate) fn encode_payload(&self) -> Result<BytesMut> {
        let mut dst = BytesMut::new();
        match self {
            Response::Discover(reply) => encode_discover(reply, &mut dst)?,
            Response::Print { accepted } => dst.put_u32(*accepted),
            Response::Status(text) | Response::Identity(text) => {
                if text.len() > MAX_ID_LEN {
                    return Err(FrameError::PayloadTooLarge {
                        size: text.len(),
                        max: MAX_ID_LEN,
                    });
                }
                dst.put_u16((text.len() + LENGTH_PREFIX) as u16);
                dst.put_slice(text.as_bytes());
            }
            Response::JobDetails { .. } | Response::Close => {}
        }
        Ok(dst)
    }
}

fn decode_discover(payload: &[u8]) -> Result<DiscoverReply> {
    let fixed = DISCOVER_PREAMBLE.len() + 2;
    if payload.len() < fixed {
        return Err(FrameError::Malformed(format!(
            "discover response payload too short: {} bytes",
            payload.len()
        )));
    }
    let mut buf = &payload[DISCOVER_PREAMBLE.len()..];
    let mac_len = buf.get_u8() as usize;
    let addr_len = buf.get_u8() as usize;

    if mac_len != MAC_LEN {
        return Err(FrameError::Malformed(format!(
            "unexpected mac address length {mac_len}"
        )));
    }
    if buf.len() < MAC_LEN {
        return Err(FrameError::Malformed("discover response missing mac".into()));
    }
    let mut mac = [0u8; MAC_LEN];
    buf.copy_to_slice(&mut mac);

    let addresses = match addr_len {
        IPV4_LEN => {
            if buf.len() < IPV4_LEN {
                return Err(FrameError::Malformed(
                    "discover response missing ipv4 address".into(),
                ));
            }
            let mut octets = [0u8; IPV4_LEN];
            buf.copy_to_slice(&mut octets);
            vec![IpAddr::V4(Ipv4Addr::from(octets))]
        }
        IPV6_LEN => {
            let count = (buf.len() / IPV6_LEN).min(MAX_IPV6_ADDRESSES);
            if count == 0 {
                return Err(FrameError::Malformed(
                    "discover response missing ipv6 address".into(),
                ));
            }
            (0..count)
                .map(|_| {
                    let mut octets = [0u8; IPV6_LEN];
                    buf.copy_to_slice(&mut octets);
                    IpAddr::V6(Ipv6Addr::from(octets))
                })
                .collect()
        }
        other => {
            return Err(FrameError::Malformed(format!(
                "unexpected address length {other}"
            )))
        }
    };

    Ok(DiscoverReply {
        mac: MacAddress(mac),
        addresses,
    })
}

fn encode_discover(reply: &DiscoverReply, dst: &mut BytesMut) -> Result<()> {
    let all_v4 = reply.addresses.iter().all(IpAddr::is_ipv4);
    let all_v6 = reply.addresses.iter().all(IpAddr::is_ipv6);
    let addr_len = match (reply.addresses.len(), all_v4, all_v6) {
        (1, true, _) => IPV4_LEN,
        (1..=MAX_IPV6_ADDRESSES, _, true) => IPV6_LEN,
        _ => {
            return Err(FrameError::Malformed(
                "discover reply needs one ipv4 or 1-8 ipv6 addresses".into(),
            ))
        }
    };

    dst.put_slice(&DISCOVER_PREAMBLE);
    dst.put_u8(MAC_LEN as u8);
    dst.put_u8(addr_len as u8);
    dst.put_slice(&reply.mac.0);
    for addr in &reply.addresses {
        match addr {
            IpAddr::V4(v4) => dst.put_slice(&v4.octets()),
            IpAddr::V6(v6) => dst.put_slice(&v6.octets()),
        }
    }
    Ok(())
}

/// Decode a 2-byte length prefix (which counts itself) followed by text.
fn decode_length_prefixed(payload: &[u8]) -> Result<String> {
    if payload.len() < LENGTH_PREFIX {
        return Err(FrameError::Malformed(format!(
            "length prefix missing ({} payload bytes)",
            payload.len()
        )));
    }
    let declared = (&payload[..LENGTH_PREFIX]).get_u16() as usize;
    let text = &payload[LENGTH_PREFIX..];
    let Some(len) = declared.checked_sub(LENGTH_PREFIX) else {
        return Err(FrameError::Malformed(format!(
            "length prefix {declared} smaller than itself"
        )));
    };
    if len > text.len() || len > MAX_ID_LEN {
        return Err(FrameError::Malformed(format!(
            "string length {len} exceeds payload ({} bytes, max {MAX_ID_LEN})",
            text.len()
        )));
    }
    Ok(String::from_utf8_lossy(&text[..len]).into_owned())
}
