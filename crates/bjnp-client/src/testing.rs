//! Loopback printer doubles shared by the unit tests.

use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bjnp_frame::code::{CLOSE, DISCOVER, GET_IDENTITY, GET_STATUS, JOB_DETAILS, PRINT};
use bjnp_frame::command::{JOB_HOSTNAME_FIELD, JOB_UNKNOWN_FIELD, JOB_USERNAME_FIELD};
use bjnp_frame::wide::decode_wide_str;
use bjnp_frame::{
    decode_header, encode_response, DiscoverReply, Header, MacAddress, Response, HEADER_SIZE,
};
use bytes::BytesMut;

#[derive(Default)]
struct FakeState {
    status: String,
    identity_for_status: bool,
    jobs: Vec<(String, String, String)>,
    closed: Vec<u16>,
    discovers: usize,
}

/// A UDP printer on a loopback address answering every BJNP command.
pub(crate) struct FakePrinter {
    addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakePrinter {
    pub const SESSION_ID: u16 = 0x4242;
    pub const IDENTITY: &'static str =
        "MFG:Canon;CMD:BJL,BJRaster3;MDL:PIXMA Test;CLS:PRINTER;DES:Canon PIXMA Test;";

    pub fn start(ip: IpAddr, port: u16) -> Self {
        Self::with_mac(ip, port, MacAddress([0x00, 0x1e, 0x8f, 0x00, 0x00, 0x01]))
    }

    pub fn with_mac(ip: IpAddr, port: u16, mac: MacAddress) -> Self {
        let socket = UdpSocket::bind(SocketAddr::new(ip, port)).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        let state = Arc::new(Mutex::new(FakeState {
            status: "BST:00;".to_string(),
            ..FakeState::default()
        }));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_state = Arc::clone(&state);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 2048];
            while !thread_stop.load(Ordering::Relaxed) {
                let Ok((n, peer)) = socket.recv_from(&mut buf) else {
                    continue;
                };
                let Ok(header) = decode_header(&buf[..n]) else {
                    continue;
                };
                let payload = &buf[HEADER_SIZE..n];
                let response = {
                    let mut state = thread_state.lock().unwrap();
                    match header.code {
                        DISCOVER => {
                            state.discovers += 1;
                            Response::Discover(DiscoverReply {
                                mac,
                                addresses: vec![ip],
                            })
                        }
                        GET_IDENTITY => Response::Identity(Self::IDENTITY.to_string()),
                        GET_STATUS if state.identity_for_status => {
                            Response::Identity(Self::IDENTITY.to_string())
                        }
                        GET_STATUS => Response::Status(state.status.clone()),
                        JOB_DETAILS => {
                            let host = JOB_UNKNOWN_FIELD;
                            let user = host + JOB_HOSTNAME_FIELD;
                            let title = user + JOB_USERNAME_FIELD;
                            state.jobs.push((
                                decode_wide_str(&payload[host..user]),
                                decode_wide_str(&payload[user..title]),
                                decode_wide_str(&payload[title..]),
                            ));
                            Response::JobDetails {
                                session_id: Self::SESSION_ID,
                            }
                        }
                        CLOSE => {
                            state.closed.push(header.session_id);
                            Response::Close
                        }
                        _ => continue,
                    }
                };
                let mut out = BytesMut::new();
                encode_response(&response, header.session_id, header.sequence, &mut out).unwrap();
                let _ = socket.send_to(&out, peer);
            }
        });

        Self {
            addr,
            state,
            stop,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn set_status(&self, status: &str) {
        self.state.lock().unwrap().status = status.to_string();
    }

    pub fn answer_status_with_identity(&self) {
        self.state.lock().unwrap().identity_for_status = true;
    }

    pub fn jobs(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().jobs.clone()
    }

    pub fn closed_sessions(&self) -> Vec<u16> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn discover_count(&self) -> usize {
        self.state.lock().unwrap().discovers
    }
}

impl Drop for FakePrinter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Read one frame (header and payload) off a print channel stream.
pub(crate) fn read_frame(stream: &mut UnixStream) -> Option<(Header, Vec<u8>)> {
    let mut head = [0u8; HEADER_SIZE];
    stream.read_exact(&mut head).ok()?;
    let header = decode_header(&head).unwrap();
    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).ok()?;
    Some((header, payload))
}

/// Write a print acknowledgment for `header`.
pub(crate) fn write_ack(stream: &mut UnixStream, header: &Header, accepted: u32) {
    let mut out = BytesMut::new();
    encode_response(
        &Response::Print { accepted },
        header.session_id,
        header.sequence,
        &mut out,
    )
    .unwrap();
    stream.write_all(&out).unwrap();
}

/// Run a print device on `stream`. `plan` picks the accepted count for each
/// print frame; every accepted payload is collected and returned at EOF.
pub(crate) fn spawn_device<F>(mut stream: UnixStream, mut plan: F) -> JoinHandle<Vec<u8>>
where
    F: FnMut(usize, &Header, &[u8]) -> u32 + Send + 'static,
{
    thread::spawn(move || {
        let mut received = Vec::new();
        let mut index = 0;
        while let Some((header, payload)) = read_frame(&mut stream) {
            if header.code != PRINT {
                continue;
            }
            let accepted = plan(index, &header, &payload);
            index += 1;
            if accepted as usize == payload.len() {
                received.extend_from_slice(&payload);
            }
            write_ack(&mut stream, &header, accepted);
        }
        received
    })
}
