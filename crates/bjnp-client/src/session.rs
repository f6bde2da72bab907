//! Print session negotiation, status queries and teardown.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use bjnp_frame::{parse_paper_status, JobDetails, PaperStatus};
use bjnp_transport::{connect_tcp, local_hostname};
use tracing::{debug, info, warn};

use crate::commands::{get_identity, get_status, send_close, send_job_details, ExchangeConfig};
use crate::error::{ClientError, Result};
use crate::printer::{rank_address, resolve_host, DiscoveredPrinter};
use crate::sequence::Sequencer;

/// The single in-flight print write of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoSlot {
    sequence: u16,
    count: usize,
    busy: bool,
}

impl IoSlot {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Sequence and byte count of the unacknowledged write, if any.
    pub fn pending(&self) -> Option<(u16, usize)> {
        self.busy.then_some((self.sequence, self.count))
    }

    pub(crate) fn occupy(&mut self, sequence: u16, count: usize) {
        self.sequence = sequence;
        self.count = count;
        self.busy = true;
    }

    pub(crate) fn release(&mut self) {
        self.busy = false;
    }

    /// Forget the pending write, e.g. after the connection was replaced.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A negotiated print session with one printer.
#[derive(Debug, Clone)]
pub struct Session {
    addr: SocketAddr,
    session_id: u16,
    sequencer: Sequencer,
    slot: IoSlot,
}

impl Session {
    pub fn new(addr: SocketAddr, session_id: u16) -> Self {
        Self::with_sequencer(addr, session_id, Sequencer::new())
    }

    fn with_sequencer(addr: SocketAddr, session_id: u16, sequencer: Sequencer) -> Self {
        Self {
            addr,
            session_id,
            sequencer,
            slot: IoSlot::default(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Issue the sequence number for the next outgoing frame.
    pub fn next_sequence(&mut self) -> u16 {
        self.sequencer.issue()
    }

    pub fn slot(&self) -> &IoSlot {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut IoSlot {
        &mut self.slot
    }
}

/// Asks the printer whether it is out of paper.
pub trait PaperProbe {
    fn paper_status(&self, session: &mut Session) -> PaperStatus;
}

/// Configuration for session setup.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Policy for the UDP exchanges of the session.
    pub exchange: ExchangeConfig,
    /// Bound on the TCP connect of the print channel.
    pub connect_timeout: Duration,
    /// Host name sent in the job details; the local host name when unset.
    pub hostname: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            connect_timeout: Duration::from_secs(30),
            hostname: None,
        }
    }
}

/// Opens, probes and closes print sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn hostname(&self) -> String {
        if let Some(name) = &self.config.hostname {
            return name.clone();
        }
        local_hostname().unwrap_or_else(|e| {
            debug!(error = %e, "could not read local host name");
            "localhost".to_string()
        })
    }

    /// Negotiate a session with the first candidate that answers.
    ///
    /// Candidates are tried best-ranked first, keeping resolver order among
    /// equals. The accepted printer's identity is fetched for reporting; a
    /// failure there is logged and does not fail the session.
    pub fn open_session(
        &self,
        candidates: &[SocketAddr],
        user: &str,
        title: &str,
    ) -> Result<(Session, DiscoveredPrinter)> {
        let hostname = self.hostname();
        let details = JobDetails {
            hostname: &hostname,
            username: user,
            title,
        };

        let mut ordered: Vec<SocketAddr> = candidates.to_vec();
        ordered.sort_by_key(|addr| std::cmp::Reverse(rank_address(&addr.ip(), true)));

        let mut last_error = None;
        for addr in ordered {
            let mut sequencer = Sequencer::new();
            match send_job_details(addr, details, sequencer.issue(), &self.config.exchange) {
                Ok(session_id) => {
                    info!(%addr, session_id, "print session opened");
                    let mut session = Session::with_sequencer(addr, session_id, sequencer);
                    let printer = self.describe(&mut session);
                    return Ok((session, printer));
                }
                Err(e) => {
                    debug!(%addr, error = %e, "candidate did not accept job details");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !e.is_unreachable() => Err(e),
            _ => Err(ClientError::NoPrinter(
                candidates
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    fn describe(&self, session: &mut Session) -> DiscoveredPrinter {
        let addr = session.addr();
        let sequence = session.next_sequence();
        let identity =
            get_identity(addr, session.session_id(), sequence, &self.config.exchange)
                .unwrap_or_else(|e| {
                    warn!(%addr, error = %e, "could not read printer identity");
                    bjnp_frame::DeviceIdentity::unidentified()
                });
        let (hostname, rank) = resolve_host(addr.ip());
        DiscoveredPrinter {
            addr: addr.ip(),
            port: addr.port(),
            hostname,
            rank,
            mac: None,
            identity,
        }
    }

    /// Query the paper condition. Any failure yields `Unknown`.
    pub fn paper_status(&self, session: &mut Session) -> PaperStatus {
        let addr = session.addr();
        let sequence = session.next_sequence();
        match get_status(addr, session.session_id(), sequence, &self.config.exchange) {
            Ok(status) => {
                let paper = parse_paper_status(&status);
                debug!(%addr, %status, ?paper, "paper status");
                paper
            }
            Err(e) => {
                debug!(%addr, error = %e, "paper status unavailable");
                PaperStatus::Unknown
            }
        }
    }

    /// End the session. Best effort: failures are logged only.
    pub fn close_session(&self, session: &mut Session) {
        let addr = session.addr();
        let sequence = session.next_sequence();
        match send_close(addr, session.session_id(), sequence, &self.config.exchange) {
            Ok(()) => info!(%addr, session_id = session.session_id(), "print session closed"),
            Err(e) => warn!(%addr, error = %e, "closing print session failed"),
        }
        session.slot_mut().reset();
    }

    /// Open the TCP print channel for `session`.
    pub fn connect(&self, session: &Session) -> Result<TcpStream> {
        Ok(connect_tcp(session.addr(), self.config.connect_timeout)?)
    }
}

impl PaperProbe for SessionManager {
    fn paper_status(&self, session: &mut Session) -> PaperStatus {
        SessionManager::paper_status(self, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePrinter;
    use std::net::{TcpListener, UdpSocket};

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig {
            exchange: ExchangeConfig {
                timeout: Duration::from_millis(200),
                max_tries: 2,
            },
            connect_timeout: Duration::from_secs(2),
            hostname: Some("workstation".to_string()),
        })
    }

    #[test]
    fn slot_lifecycle() {
        let mut slot = IoSlot::default();
        assert!(!slot.is_busy());
        slot.occupy(9, 100);
        assert_eq!(slot.pending(), Some((9, 100)));
        slot.release();
        assert_eq!(slot.pending(), None);
        slot.occupy(10, 5);
        slot.reset();
        assert!(!slot.is_busy());
    }

    #[test]
    fn session_sequence_increments() {
        let mut session = Session::new("127.0.0.1:8611".parse().unwrap(), 3);
        let first = session.next_sequence();
        assert_eq!(session.next_sequence(), first.wrapping_add(1));
    }

    #[test]
    fn opens_session_with_first_answering_candidate() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let printer = FakePrinter::start("127.0.0.1".parse().unwrap(), 0);
        let candidates = [silent.local_addr().unwrap(), printer.addr()];

        let (mut session, described) = manager()
            .open_session(&candidates, "alice", "report.pdf")
            .unwrap();

        assert_eq!(session.session_id(), FakePrinter::SESSION_ID);
        assert_eq!(session.addr(), printer.addr());
        assert_eq!(described.model(), "Canon PIXMA Test");
        assert_eq!(described.port, printer.addr().port());
        assert_eq!(
            printer.jobs(),
            vec![(
                "workstation".to_string(),
                "alice".to_string(),
                "report.pdf".to_string()
            )]
        );
        // Job details and identity used the first two sequence numbers.
        assert_eq!(session.next_sequence(), 3);
    }

    #[test]
    fn no_candidate_answers() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let err = manager()
            .open_session(&[silent.local_addr().unwrap()], "alice", "doc")
            .unwrap_err();
        assert!(matches!(err, ClientError::NoPrinter(_)));
        assert!(err.is_unreachable());
    }

    #[test]
    fn paper_status_and_close() {
        let printer = FakePrinter::start("127.0.0.1".parse().unwrap(), 0);
        let manager = manager();
        let mut session = Session::new(printer.addr(), 21);

        printer.set_status("MFG:Canon;BST:08;");
        assert_eq!(manager.paper_status(&mut session), PaperStatus::PaperOut);
        printer.set_status("BST:00;");
        assert_eq!(manager.paper_status(&mut session), PaperStatus::Ok);

        manager.close_session(&mut session);
        assert_eq!(printer.closed_sessions(), vec![21]);
    }

    #[test]
    fn unreachable_paper_status_is_unknown() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut session = Session::new(silent.local_addr().unwrap(), 1);
        assert_eq!(manager().paper_status(&mut session), PaperStatus::Unknown);
        // Closing an unreachable session does not fail.
        manager().close_session(&mut session);
    }

    #[test]
    fn connects_print_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let session = Session::new(listener.local_addr().unwrap(), 1);
        let stream = manager().connect(&session).unwrap();
        assert!(stream.nodelay().unwrap());
    }
}
