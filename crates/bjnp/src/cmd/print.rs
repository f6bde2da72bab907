use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsFd, FromRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use bjnp_client::{
    ClientError, DiscoveredPrinter, JsonControlChannel, RunLoop, RunLoopConfig, Session,
    SessionConfig, SessionManager, SpoolerStateReporter,
};
use tracing::{info, warn};

use crate::cmd::{parse_duration, resolve_target, PrintArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, FAILED, SUCCESS};

/// First pause between attempts to reach an unreachable printer.
const RETRY_FIRST: Duration = Duration::from_secs(5);
/// Growth of the pause after each failed attempt.
const RETRY_STEP: Duration = Duration::from_secs(5);
/// Longest pause between attempts.
const RETRY_MAX: Duration = Duration::from_secs(30);
/// Pause before handing a class job back, so it does not requeue too fast.
const CLASS_REQUEUE_PAUSE: Duration = Duration::from_secs(5);

type Connection = (Session, DiscoveredPrinter, TcpStream);

pub fn run(args: PrintArgs) -> CliResult<i32> {
    let connect_timeout = match uri_option(&args.printer, "contimeout")
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
    {
        Some(secs) => Duration::from_secs(secs),
        None => parse_duration(&args.connect_timeout, false)?,
    };
    let post_job_delay = parse_duration(&args.post_job_delay, true)?;

    let from_file = args.file.is_some();
    let mut input = open_input(args.file.as_deref())?;
    let copies = if from_file { args.copies } else { 1 };
    if !from_file {
        defer_signals()?;
    }

    let (target, addrs) = resolve_target(&args.printer)?;
    spooler_line(&format!(
        "INFO: Attempting to connect to host {} on port {}",
        target.host, target.port
    ));

    let manager = SessionManager::new(SessionConfig {
        hostname: args.hostname.clone(),
        ..SessionConfig::default()
    });

    spooler_line("STATE: +connecting-to-device");
    let (mut session, printer, mut device) =
        connect_with_retry(&manager, &addrs, &args, connect_timeout)?;
    spooler_line("STATE: -connecting-to-device");
    spooler_line(&format!("INFO: Connected to {}...", target.host));
    info!(
        addr = %session.addr(),
        session_id = session.session_id(),
        model = %printer.model(),
        "connected to printer"
    );

    let mut control = match args.control_fd {
        Some(fd) => Some(open_control(fd)?),
        None => None,
    };
    let mut reporter = SpoolerStateReporter::stderr();

    let mut result = Ok(());
    for copy in 0..copies {
        if from_file {
            spooler_line("PAGE: 1 1");
            if let Err(err) = input.seek(SeekFrom::Start(0)) {
                result = Err(io_error("rewinding print file failed", err));
                break;
            }
        }

        let mut run_loop = RunLoop::new(RunLoopConfig::default(), &manager, &mut reporter);
        if !printer.identity.is_unknown() {
            run_loop = run_loop.with_identity(printer.identity.clone());
        }
        if let Some(control) = control.as_mut() {
            run_loop = run_loop.with_control(control);
        }

        match run_loop.run(&mut input, &mut device, &mut session) {
            Ok(bytes) => {
                info!(copy = copy + 1, copies, bytes, "print data sent");
                if from_file {
                    spooler_line(&format!("INFO: Sent print file, {bytes} bytes..."));
                }
            }
            Err(err) => {
                result = Err(client_error("printing failed", err));
                break;
            }
        }
    }

    drop(device);
    manager.close_session(&mut session);

    // Some models hang on the next job when it follows too closely.
    thread::sleep(post_job_delay);

    result?;
    spooler_line("INFO: Ready to print.");
    Ok(SUCCESS)
}

/// Open a session and its print channel, retrying while the printer is
/// unreachable until `timeout` has passed.
fn connect_with_retry(
    manager: &SessionManager,
    addrs: &[SocketAddr],
    args: &PrintArgs,
    timeout: Duration,
) -> CliResult<Connection> {
    let start = Instant::now();
    let mut delay = RETRY_FIRST;
    let mut recovered = false;

    loop {
        let err = match try_connect(manager, addrs, args) {
            Ok(connection) => {
                if recovered {
                    spooler_line("INFO: recovered: ");
                }
                return Ok(connection);
            }
            Err(err) => err,
        };

        if args.class.is_some() {
            spooler_line("INFO: Unable to contact printer, queuing on next printer in class...");
            thread::sleep(CLASS_REQUEUE_PAUSE);
            return Err(client_error("unable to contact printer", err));
        }
        if start.elapsed() > timeout {
            warn!(error = %err, ?timeout, "giving up on printer");
            return Err(CliError::new(FAILED, "printer not responding"));
        }

        recovered = true;
        let pause = if err.is_unreachable() {
            spooler_line(&format!(
                "WARNING: recoverable: Network host '{}' is busy; will retry in {} seconds...",
                args.printer,
                delay.as_secs()
            ));
            let pause = delay;
            delay = next_delay(delay);
            pause
        } else {
            warn!(error = %err, "connection error");
            spooler_line(
                "ERROR: recoverable: Unable to connect to printer; will retry in 30 seconds...",
            );
            RETRY_MAX
        };
        thread::sleep(pause);
    }
}

fn next_delay(delay: Duration) -> Duration {
    (delay + RETRY_STEP).min(RETRY_MAX)
}

fn try_connect(
    manager: &SessionManager,
    addrs: &[SocketAddr],
    args: &PrintArgs,
) -> Result<Connection, ClientError> {
    let (mut session, printer) = manager.open_session(addrs, &args.user, &args.title)?;
    match manager.connect(&session) {
        Ok(device) => Ok((session, printer, device)),
        Err(err) => {
            manager.close_session(&mut session);
            Err(err)
        }
    }
}

/// The print file, or a private handle on standard input. Reads bypass the
/// buffered `Stdin` so readiness on the descriptor matches what is unread.
fn open_input(path: Option<&Path>) -> CliResult<File> {
    match path {
        Some(path) => File::open(path)
            .map_err(|err| io_error(&format!("unable to open print file {}", path.display()), err)),
        None => io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .map(File::from)
            .map_err(|err| io_error("unable to read standard input", err)),
    }
}

fn open_control(fd: RawFd) -> CliResult<JsonControlChannel<UnixStream>> {
    // SAFETY: fcntl only inspects the descriptor table entry.
    if fd < 0 || unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(CliError::usage(format!("control fd {fd} is not open")));
    }
    // SAFETY: the descriptor is open and handed to this process for its
    // exclusive use; nothing else in the process owns it.
    let stream = unsafe { UnixStream::from_raw_fd(fd) };
    Ok(JsonControlChannel::new(stream))
}

/// While the job streams from standard input, interrupting it would leave the
/// printer with half a page. Log the signal and keep going.
fn defer_signals() -> CliResult<()> {
    ctrlc::set_handler(|| {
        warn!("signal received while printing from standard input; finishing the job");
    })
    .map_err(|err| CliError::new(FAILED, format!("signal handler setup failed: {err}")))
}

/// A line for the spooler, which reads backend messages from stderr.
fn spooler_line(line: &str) {
    eprintln!("{line}");
}

/// Value of a `?name=value` option on the device URI. Options are separated
/// by `&` or `+`.
pub fn uri_option<'a>(uri: &'a str, name: &str) -> Option<&'a str> {
    let (_, options) = uri.split_once('?')?;
    options
        .split(['&', '+'])
        .filter_map(|option| option.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}
