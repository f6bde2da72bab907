//! UDP request/response exchanges with a printer.

use std::net::SocketAddr;
use std::time::Duration;

use bjnp_frame::{
    code_name, decode, encode, hexdump, Command, DeviceIdentity, Frame, JobDetails, Response,
};
use bjnp_transport::send_request;
use tracing::{debug, trace};

use crate::error::{ClientError, Result};

/// Timeout and retry policy for one UDP exchange.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// How long to wait for each reply.
    pub timeout: Duration,
    /// How many times the request is sent before giving up.
    pub max_tries: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            max_tries: 3,
        }
    }
}

/// Send `command` and decode the reply, which must carry the same code.
pub fn exchange(
    addr: SocketAddr,
    command: &Command<'_>,
    session_id: u16,
    sequence: u16,
    config: &ExchangeConfig,
) -> Result<Frame> {
    let request = encode(command, session_id, sequence)?;
    debug!(
        %addr,
        command = code_name(command.code()),
        session_id,
        sequence,
        "udp exchange"
    );
    trace!("request\n{}", hexdump(&request));

    let reply = send_request(addr, &request, config.timeout, config.max_tries)?;
    trace!("response\n{}", hexdump(&reply));

    let frame = decode(&reply)?;
    if frame.header.code != command.code() {
        return Err(ClientError::UnexpectedResponse {
            expected: command.code(),
            received: frame.header.code,
        });
    }
    if frame.header.sequence != sequence {
        debug!(
            %addr,
            expected = sequence,
            received = frame.header.sequence,
            "udp response carries a different sequence"
        );
    }
    Ok(frame)
}

fn unexpected(command: &Command<'_>, frame: &Frame) -> ClientError {
    ClientError::UnexpectedResponse {
        expected: command.code(),
        received: frame.response.code(),
    }
}

/// Ask a printer for its IEEE1284 identity.
pub fn get_identity(
    addr: SocketAddr,
    session_id: u16,
    sequence: u16,
    config: &ExchangeConfig,
) -> Result<DeviceIdentity> {
    let command = Command::GetIdentity;
    let frame = exchange(addr, &command, session_id, sequence, config)?;
    match frame.response {
        Response::Identity(id) => {
            let identity = DeviceIdentity::from_ieee1284(id);
            debug!(%addr, model = %identity.model, "printer identity");
            Ok(identity)
        }
        _ => Err(unexpected(&command, &frame)),
    }
}

/// Ask a printer for its status string.
pub fn get_status(
    addr: SocketAddr,
    session_id: u16,
    sequence: u16,
    config: &ExchangeConfig,
) -> Result<String> {
    let command = Command::GetStatus;
    let frame = exchange(addr, &command, session_id, sequence, config)?;
    match frame.response {
        Response::Status(status) => Ok(status),
        _ => Err(unexpected(&command, &frame)),
    }
}

/// Send the job owner details; returns the session id the printer assigned.
pub fn send_job_details(
    addr: SocketAddr,
    details: JobDetails<'_>,
    sequence: u16,
    config: &ExchangeConfig,
) -> Result<u16> {
    let command = Command::JobDetails(details);
    let frame = exchange(addr, &command, 0, sequence, config)?;
    match frame.response {
        Response::JobDetails { session_id } => Ok(session_id),
        _ => Err(unexpected(&command, &frame)),
    }
}

/// End a print session.
pub fn send_close(
    addr: SocketAddr,
    session_id: u16,
    sequence: u16,
    config: &ExchangeConfig,
) -> Result<()> {
    let command = Command::Close;
    let frame = exchange(addr, &command, session_id, sequence, config)?;
    if frame.header.payload_len != 0 {
        tracing::warn!(
            %addr,
            payload_len = frame.header.payload_len,
            "close response has unexpected length"
        );
    }
    Ok(())
}
