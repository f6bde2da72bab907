//! The print data event loop.
//!
//! One thread, one readiness wait per iteration over the local input, the
//! print channel and the optional control channel. At most one print write
//! is unacknowledged at any time, so data reaches the printer in order.

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::thread;
use std::time::Duration;

use bjnp_frame::{DeviceIdentity, PaperStatus};
use bjnp_transport::{wait_readiness, Interest, PollEntry};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::channel::{receive_ack, submit, AckOutcome};
use crate::control::{ControlChannel, ControlMessage, ControlRequest, CONTROL_DRAIN_OUTPUT};
use crate::error::{ClientError, FailureKind, Result};
use crate::session::{PaperProbe, Session};
use crate::state::{PrinterState, StateReporter};

/// Idle time after which a keep-alive frame is sent.
pub const KEEP_ALIVE_SECONDS: u64 = 3;

const INPUT: usize = 0;
const DEVICE: usize = 1;
const CONTROL: usize = 2;

/// Configuration for the run loop.
#[derive(Debug, Clone)]
pub struct RunLoopConfig {
    /// Idle time before a keep-alive frame is sent.
    pub keep_alive: Duration,
    /// Pause after the printer throttled before data is sent again.
    pub throttle_backoff: Duration,
    /// Size of the local input buffer.
    pub buffer_size: usize,
    /// Pause after a failed wait or a retryable write failure.
    pub poll_error_pause: Duration,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(KEEP_ALIVE_SECONDS),
            throttle_backoff: Duration::from_millis(40),
            buffer_size: 4096,
            poll_error_pause: Duration::from_secs(1),
        }
    }
}

/// Copies print data from a local source to the printer.
pub struct RunLoop<'a> {
    config: RunLoopConfig,
    probe: &'a dyn PaperProbe,
    reporter: &'a mut dyn StateReporter,
    control: Option<&'a mut dyn ControlChannel>,
    identity: Option<DeviceIdentity>,
    state: PrinterState,
}

impl<'a> RunLoop<'a> {
    pub fn new(
        config: RunLoopConfig,
        probe: &'a dyn PaperProbe,
        reporter: &'a mut dyn StateReporter,
    ) -> Self {
        Self {
            config,
            probe,
            reporter,
            control: None,
            identity: None,
            state: PrinterState::default(),
        }
    }

    /// Answer spooler requests arriving on `control`.
    pub fn with_control(mut self, control: &'a mut dyn ControlChannel) -> Self {
        self.control = Some(control);
        self
    }

    /// Identity returned for device id requests.
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Offline and paper-out conditions as last observed.
    pub fn state(&self) -> PrinterState {
        self.state
    }

    /// Copy `input` to the printer until end of input.
    ///
    /// Returns the number of bytes the printer acknowledged. Protocol
    /// desync and other fatal channel errors end the loop with an error.
    pub fn run<I, D>(
        &mut self,
        input: &mut I,
        device: &mut D,
        session: &mut Session,
    ) -> Result<u64>
    where
        I: Read + AsRawFd,
        D: Read + Write + AsRawFd,
    {
        let mut buffer = vec![0u8; self.config.buffer_size.max(1)];
        let (mut start, mut end) = (0usize, 0usize);
        let mut total: u64 = 0;
        let mut ack_pending = false;
        let mut draining = false;
        let mut send_keep_alive = false;

        loop {
            let print_bytes = end - start;

            if draining && print_bytes == 0 && !ack_pending {
                self.acknowledge_drain();
                draining = false;
            }

            let mut entries = [
                PollEntry::new(input.as_raw_fd(), Interest::NONE),
                PollEntry::new(device.as_raw_fd(), Interest::READ),
                PollEntry::new(-1, Interest::NONE),
            ];
            if print_bytes == 0 {
                entries[INPUT].set_interest(Interest::READ);
            }
            if (send_keep_alive || print_bytes > 0) && !ack_pending {
                entries[DEVICE].set_interest(Interest::BOTH);
            }
            if print_bytes == 0 && !draining {
                if let Some(control) = self.control.as_deref() {
                    if !control.is_closed() {
                        entries[CONTROL] = PollEntry::new(control.as_raw_fd(), Interest::READ);
                    }
                }
            }

            match wait_readiness(&mut entries, Some(self.config.keep_alive)) {
                Ok(0) => {
                    if !ack_pending {
                        send_keep_alive = true;
                    }
                    debug!(print_bytes, ack_pending, send_keep_alive, "idle");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    if e.raw_os_error() == Some(libc::ENXIO) {
                        self.state.set_offline(true, &mut *self.reporter);
                    } else if e.kind() == io::ErrorKind::Interrupted && total == 0 {
                        info!("interrupted before any data was written");
                        return Ok(0);
                    } else {
                        debug!(error = %e, "readiness wait failed");
                    }
                    thread::sleep(self.config.poll_error_pause);
                    continue;
                }
            }

            if entries[CONTROL].readable() {
                self.handle_control(&mut draining);
            }

            if entries[DEVICE].readable() {
                match receive_ack(device, session) {
                    Ok(AckOutcome::Acked(n)) => {
                        start += n;
                        total += n as u64;
                        ack_pending = false;
                        self.state.set_paper_out(false, &mut *self.reporter);
                        debug!(bytes = n, total, "printer acknowledged data");
                    }
                    Ok(AckOutcome::Throttled) => {
                        ack_pending = false;
                        thread::sleep(self.config.throttle_backoff);
                        if self.state.paper_out != Some(true)
                            && self.probe.paper_status(session) == PaperStatus::PaperOut
                        {
                            self.state.set_paper_out(true, &mut *self.reporter);
                        }
                    }
                    Ok(AckOutcome::NotAnAck) => {}
                    Err(e) => {
                        error!(error = %e, "print channel failed");
                        return Err(e.into());
                    }
                }
            }

            if entries[INPUT].readable() {
                match input.read(&mut buffer) {
                    Ok(0) => {
                        if draining {
                            self.acknowledge_drain();
                        }
                        info!(total, "end of print data");
                        break;
                    }
                    Ok(n) => {
                        start = 0;
                        end = n;
                        debug!(bytes = n, "read print data");
                    }
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                        ) => {}
                    Err(e) => return Err(ClientError::Input(e)),
                }
            }

            if entries[DEVICE].writable() && (send_keep_alive || end > start) {
                send_keep_alive = false;
                match submit(device, session, &buffer[start..end]) {
                    Ok(_) => {
                        self.state.set_offline(false, &mut *self.reporter);
                        ack_pending = true;
                    }
                    Err(e) => match e.kind() {
                        FailureKind::PaperOut => {
                            self.state.set_paper_out(true, &mut *self.reporter);
                            thread::sleep(self.config.poll_error_pause);
                        }
                        FailureKind::Offline => {
                            self.state.set_offline(true, &mut *self.reporter);
                            thread::sleep(self.config.poll_error_pause);
                        }
                        FailureKind::Retry => debug!(error = %e, "print write will be retried"),
                        FailureKind::Fatal => {
                            error!(error = %e, "unable to write print data");
                            return Err(e.into());
                        }
                    },
                }
            }
        }

        Ok(total)
    }

    fn acknowledge_drain(&mut self) {
        if let Some(control) = self.control.as_deref_mut() {
            debug!("output drained");
            if let Err(e) = control.write_response(&ControlMessage::ok(CONTROL_DRAIN_OUTPUT, None))
            {
                warn!(error = %e, "failed to acknowledge drain");
            }
        }
    }

    fn handle_control(&mut self, draining: &mut bool) {
        let Some(control) = self.control.as_deref_mut() else {
            return;
        };
        let requests = match control.read_requests() {
            Ok(requests) => requests,
            Err(e) => {
                warn!(error = %e, "failed to read control request");
                return;
            }
        };

        for request in requests {
            debug!(request = request.name(), "control request");
            let response = match &request {
                ControlRequest::DrainOutput => {
                    *draining = true;
                    continue;
                }
                ControlRequest::GetBidi => ControlMessage::ok(request.name(), Some(json!(false))),
                ControlRequest::GetDeviceId => match &self.identity {
                    Some(identity) if !identity.is_unknown() => ControlMessage::ok(
                        request.name(),
                        Some(json!({
                            "device_id": identity.ieee1284_id,
                            "model": identity.model,
                        })),
                    ),
                    _ => ControlMessage::not_implemented(request.name()),
                },
                ControlRequest::Unknown(name) => ControlMessage::not_implemented(name),
            };
            if let Err(e) = control.write_response(&response) {
                warn!(error = %e, "failed to answer control request");
            }
        }
    }
}
