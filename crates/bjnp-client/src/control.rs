//! Out-of-band control requests from the spooler.
//!
//! The channel carries newline-delimited JSON objects. Requests name an
//! operation in `type`; responses echo the type and add a `status` and,
//! where there is something to return, `data`.

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// CONTROL request: acknowledge once all print data reached the printer.
pub const CONTROL_DRAIN_OUTPUT: &str = "drain_output";
/// CONTROL request: does the device support a back channel.
pub const CONTROL_GET_BIDI: &str = "get_bidi";
/// CONTROL request: the device's IEEE1284 id.
pub const CONTROL_GET_DEVICE_ID: &str = "get_device_id";

/// Longest request line accepted.
const MAX_LINE: usize = 16 * 1024;

/// Result of a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    Ok,
    NotImplemented,
    IoError,
}

/// A control channel message, request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ControlStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ControlMessage {
    /// A request of the given type.
    pub fn request(msg_type: &str) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            status: None,
            data: None,
        }
    }

    /// A successful response.
    pub fn ok(msg_type: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            status: Some(ControlStatus::Ok),
            data,
        }
    }

    /// A response rejecting an unsupported request.
    pub fn not_implemented(msg_type: &str) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            status: Some(ControlStatus::NotImplemented),
            data: None,
        }
    }
}

/// A parsed control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    DrainOutput,
    GetBidi,
    GetDeviceId,
    /// Anything else, by type name (or `"malformed"` when unparseable).
    Unknown(String),
}

impl ControlRequest {
    pub fn from_message(message: &ControlMessage) -> Self {
        match message.msg_type.as_str() {
            CONTROL_DRAIN_OUTPUT => ControlRequest::DrainOutput,
            CONTROL_GET_BIDI => ControlRequest::GetBidi,
            CONTROL_GET_DEVICE_ID => ControlRequest::GetDeviceId,
            other => ControlRequest::Unknown(other.to_string()),
        }
    }

    /// The wire name of this request.
    pub fn name(&self) -> &str {
        match self {
            ControlRequest::DrainOutput => CONTROL_DRAIN_OUTPUT,
            ControlRequest::GetBidi => CONTROL_GET_BIDI,
            ControlRequest::GetDeviceId => CONTROL_GET_DEVICE_ID,
            ControlRequest::Unknown(name) => name,
        }
    }
}

/// The run loop's view of the spooler's control channel.
pub trait ControlChannel: AsRawFd {
    /// Read the requests that are available. Called only after the
    /// descriptor polled readable.
    fn read_requests(&mut self) -> io::Result<Vec<ControlRequest>>;

    /// Send one response.
    fn write_response(&mut self, response: &ControlMessage) -> io::Result<()>;

    /// True once the other end closed the channel.
    fn is_closed(&self) -> bool;
}

/// Newline-delimited JSON control channel over any stream.
#[derive(Debug)]
pub struct JsonControlChannel<S> {
    stream: S,
    pending: Vec<u8>,
    closed: bool,
}

impl<S: Read + Write + AsRawFd> JsonControlChannel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            closed: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn parse_line(line: &[u8]) -> ControlRequest {
        match serde_json::from_slice::<ControlMessage>(line) {
            Ok(message) => ControlRequest::from_message(&message),
            Err(e) => {
                warn!(error = %e, "malformed control request");
                ControlRequest::Unknown("malformed".to_string())
            }
        }
    }
}

impl<S: Read + Write + AsRawFd> AsRawFd for JsonControlChannel<S> {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl<S: Read + Write + AsRawFd> ControlChannel for JsonControlChannel<S> {
    fn read_requests(&mut self) -> io::Result<Vec<ControlRequest>> {
        let mut buf = [0u8; 4096];
        let n = match self.stream.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if n == 0 {
            debug!("control channel closed");
            self.closed = true;
        }
        self.pending.extend_from_slice(&buf[..n]);

        let mut requests = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = line.trim_ascii();
            if !line.is_empty() {
                requests.push(Self::parse_line(line));
            }
        }
        if self.pending.len() > MAX_LINE {
            warn!(len = self.pending.len(), "control request line too long");
            self.pending.clear();
            requests.push(ControlRequest::Unknown("malformed".to_string()));
        }
        if self.closed && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            let line = line.trim_ascii();
            if !line.is_empty() {
                requests.push(Self::parse_line(line));
            }
        }
        Ok(requests)
    }

    fn write_response(&mut self, response: &ControlMessage) -> io::Result<()> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');
        self.stream.write_all(&line)?;
        self.stream.flush()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::os::unix::net::UnixStream;

    #[test]
    fn reads_requests_split_across_writes() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let mut channel = JsonControlChannel::new(ours);

        theirs
            .write_all(b"{\"type\":\"get_bidi\"}\n{\"type\":\"drain_")
            .unwrap();
        assert_eq!(channel.read_requests().unwrap(), vec![ControlRequest::GetBidi]);

        theirs.write_all(b"output\"}\n").unwrap();
        assert_eq!(
            channel.read_requests().unwrap(),
            vec![ControlRequest::DrainOutput]
        );
    }

    #[test]
    fn unknown_and_malformed_requests() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let mut channel = JsonControlChannel::new(ours);
        theirs
            .write_all(b"{\"type\":\"soft_reset\"}\nnot json\n")
            .unwrap();
        assert_eq!(
            channel.read_requests().unwrap(),
            vec![
                ControlRequest::Unknown("soft_reset".into()),
                ControlRequest::Unknown("malformed".into()),
            ]
        );
    }

    #[test]
    fn writes_json_lines() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let mut channel = JsonControlChannel::new(ours);
        channel
            .write_response(&ControlMessage::ok(
                CONTROL_GET_BIDI,
                Some(serde_json::json!(false)),
            ))
            .unwrap();
        channel
            .write_response(&ControlMessage::not_implemented("soft_reset"))
            .unwrap();

        let mut reader = BufReader::new(theirs);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(
            line.trim_end(),
            r#"{"type":"get_bidi","status":"ok","data":false}"#
        );
        line.clear();
        reader.read_line(&mut line).unwrap();
        let message: ControlMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(message.status, Some(ControlStatus::NotImplemented));
    }

    #[test]
    fn close_is_detected() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let mut channel = JsonControlChannel::new(ours);
        theirs.write_all(b"{\"type\":\"get_device_id\"}").unwrap();
        drop(theirs);

        let mut requests = channel.read_requests().unwrap();
        requests.extend(channel.read_requests().unwrap());
        assert_eq!(requests, vec![ControlRequest::GetDeviceId]);
        assert!(channel.is_closed());
    }
}
