#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bjnp_frame::code::{CLOSE, GET_IDENTITY, GET_STATUS, JOB_DETAILS, PRINT};
use bjnp_frame::{decode_header, encode_response, Response, HEADER_SIZE};
use bytes::BytesMut;

const SESSION_ID: u16 = 0x0107;
const IDENTITY: &str = "MFG:Canon;CMD:BJL,BJRaster3;DES:Canon PIXMA Smoke;";

struct FakePrinter {
    addr: SocketAddr,
    received: mpsc::Receiver<Vec<u8>>,
}

/// A printer on loopback answering UDP requests and accepting one TCP print
/// channel on the same port number.
fn spawn_printer(status: &'static str) -> FakePrinter {
    let (udp, tcp) = (0..20)
        .find_map(|_| {
            let udp = UdpSocket::bind("127.0.0.1:0").ok()?;
            let port = udp.local_addr().ok()?.port();
            let tcp = TcpListener::bind(("127.0.0.1", port)).ok()?;
            Some((udp, tcp))
        })
        .expect("udp and tcp ports should be bindable");
    let addr = udp.local_addr().expect("udp socket should have an address");

    thread::spawn(move || {
        let mut buf = [0u8; 2048];
        while let Ok((len, peer)) = udp.recv_from(&mut buf) {
            let Ok(header) = decode_header(&buf[..len]) else {
                continue;
            };
            let response = match header.code {
                JOB_DETAILS => Response::JobDetails {
                    session_id: SESSION_ID,
                },
                GET_IDENTITY => Response::Identity(IDENTITY.to_string()),
                GET_STATUS => Response::Status(status.to_string()),
                CLOSE => Response::Close,
                _ => continue,
            };
            let mut out = BytesMut::new();
            encode_response(&response, SESSION_ID, header.sequence, &mut out)
                .expect("response should encode");
            let _ = udp.send_to(&out, peer);
        }
    });

    let (tx, received) = mpsc::channel();
    thread::spawn(move || {
        let Ok((stream, _)) = tcp.accept() else {
            return;
        };
        let _ = tx.send(serve_print_channel(stream));
    });

    FakePrinter { addr, received }
}

fn serve_print_channel(mut stream: TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let mut header_buf = [0u8; HEADER_SIZE];
    while stream.read_exact(&mut header_buf).is_ok() {
        let header = decode_header(&header_buf).expect("client should send valid frames");
        let mut payload = vec![0u8; header.payload_len as usize];
        if stream.read_exact(&mut payload).is_err() {
            break;
        }
        if header.code != PRINT {
            continue;
        }
        data.extend_from_slice(&payload);

        let mut ack = BytesMut::new();
        let response = Response::Print {
            accepted: header.payload_len,
        };
        encode_response(&response, SESSION_ID, header.sequence, &mut ack)
            .expect("ack should encode");
        if stream.write_all(&ack).is_err() {
            break;
        }
    }
    data
}

fn unique_temp_file(tag: &str, contents: &[u8]) -> PathBuf {
    let path = PathBuf::from(format!(
        "/tmp/bjnpcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, contents).expect("temp file should be writable");
    path
}

fn bjnp(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bjnp"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("bjnp should run")
}

#[test]
fn version_prints_package_version() {
    let output = bjnp(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("bjnp {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn status_reports_paper_out_as_json() {
    let printer = spawn_printer("MFG:Canon;BST:08;");
    let uri = format!("bjnp://{}", printer.addr);

    let output = bjnp(&["--format", "json", "status", &uri]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("status output should be json");
    assert_eq!(json["paper"], "paper_out");
    assert_eq!(json["status"], "MFG:Canon;BST:08;");
    assert_eq!(json["busy"], false);
}

#[test]
fn identity_cups_format_prints_raw_id() {
    let printer = spawn_printer("BST:00;");
    let uri = format!("bjnp://{}", printer.addr);

    let output = bjnp(&["--format", "cups", "identity", &uri]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), IDENTITY);
}

#[test]
fn print_file_delivers_every_byte() {
    let printer = spawn_printer("BST:00;");
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let path = unique_temp_file("job", &data);
    let uri = format!("bjnp://{}", printer.addr);

    let output = bjnp(&[
        "print",
        &uri,
        "--user",
        "alice",
        "--title",
        "smoke",
        "--post-job-delay",
        "0",
        "--connect-timeout",
        "5s",
        path.to_str().expect("temp path should be utf-8"),
    ]);
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success(), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("STATE: +connecting-to-device"));
    assert!(stderr.contains("STATE: -connecting-to-device"));
    assert!(stderr.contains("INFO: Sent print file, 10000 bytes..."));

    let received = printer
        .received
        .recv_timeout(Duration::from_secs(5))
        .expect("printer should see the print channel close");
    assert_eq!(received, data);
}

#[test]
fn print_to_foreign_scheme_stops_queue() {
    let output = bjnp(&["print", "ipp://printer.lan/ipp", "--post-job-delay", "0"]);
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad printer address"));
}

#[test]
fn missing_print_file_fails() {
    let output = bjnp(&["print", "bjnp://127.0.0.1", "/nonexistent/bjnp/job.prn"]);
    assert_eq!(output.status.code(), Some(1));
}
