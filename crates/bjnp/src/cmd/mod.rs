use clap::{Args, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bjnp_client::{ExchangeConfig, PrinterTarget, Sequencer};
use tracing::debug;

use crate::exit::{client_error, target_error, CliError, CliResult};
use crate::logging::LogLevel;
use crate::output::OutputFormat;

pub mod discover;
pub mod identity;
pub mod print;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Broadcast for printers and list those that answer.
    Discover(DiscoverArgs),
    /// Send a print job to a printer.
    Print(PrintArgs),
    /// Show a printer's status string and paper condition.
    Status(QueryArgs),
    /// Show a printer's IEEE1284 identity.
    Identity(QueryArgs),
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    /// Log level requested through `?debuglevel=` on a print job's device URI.
    pub fn uri_log_level(&self) -> Option<LogLevel> {
        match self {
            Command::Print(args) => print::uri_option(&args.printer, "debuglevel")
                .and_then(LogLevel::from_debuglevel),
            _ => None,
        }
    }
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Discover(args) => discover::run(args, format),
        Command::Print(args) => print::run(args),
        Command::Status(args) => status::run(args, format),
        Command::Identity(args) => identity::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// UDP port printers listen on.
    #[arg(long, default_value_t = bjnp_frame::code::PORT_PRINT)]
    pub port: u16,
    /// Quiet period that ends collection (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub window: String,
    /// Discover frames sent per interface.
    #[arg(long, default_value_t = 2)]
    pub attempts: u32,
}

#[derive(Args, Debug)]
pub struct PrintArgs {
    /// Printer address: bjnp://host[:port] or host[:port].
    pub printer: String,
    /// File to print. Standard input when omitted.
    pub file: Option<PathBuf>,
    /// Job owner sent to the printer.
    #[arg(long, default_value = "bjnp")]
    pub user: String,
    /// Job title sent to the printer.
    #[arg(long, default_value = "bjnp print job")]
    pub title: String,
    /// Number of copies. Only honoured when printing a file.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub copies: u32,
    /// Give up reaching the printer after this long (e.g. 3600s).
    #[arg(long, default_value = "604800s")]
    pub connect_timeout: String,
    /// Pause after closing the session before exiting.
    #[arg(long, default_value = "15s")]
    pub post_job_delay: String,
    /// Host name sent in the job details. Local host name when omitted.
    #[arg(long)]
    pub hostname: Option<String>,
    /// File descriptor of a bidirectional spooler control socket.
    #[arg(long, value_name = "FD")]
    pub control_fd: Option<i32>,
    /// Set by the spooler when the job went to a printer class; the job is
    /// handed back instead of waiting for this printer.
    #[arg(long, env = "CLASS", hide = true)]
    pub class: Option<String>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Printer address: bjnp://host[:port] or host[:port].
    pub printer: String,
    /// Time to wait for each answer (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a printer address and resolve it to socket addresses.
pub fn resolve_target(printer: &str) -> CliResult<(PrinterTarget, Vec<SocketAddr>)> {
    let target =
        PrinterTarget::parse(printer).map_err(|err| target_error("bad printer address", err))?;
    let addrs = target
        .resolve()
        .map_err(|err| target_error(&format!("unable to locate printer '{target}'"), err))?;
    if addrs.is_empty() {
        return Err(target_error("unable to locate printer", &target));
    }
    Ok((target, addrs))
}

/// Run one UDP request against each address of the printer until one answers.
pub fn query<T>(
    args: &QueryArgs,
    ask: impl Fn(SocketAddr, u16, &ExchangeConfig) -> bjnp_client::Result<T>,
) -> CliResult<(SocketAddr, T)> {
    let (target, addrs) = resolve_target(&args.printer)?;
    let config = ExchangeConfig {
        timeout: parse_duration(&args.timeout, false)?,
        ..ExchangeConfig::default()
    };

    let mut sequencer = Sequencer::new();
    let mut last_error = None;
    for addr in addrs {
        match ask(addr, sequencer.issue(), &config) {
            Ok(value) => return Ok((addr, value)),
            Err(err) => {
                debug!(%addr, error = %err, "printer did not answer");
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(err) => Err(client_error(&format!("query to {target} failed"), err)),
        None => Err(target_error("unable to locate printer", &target)),
    }
}

/// Parse `5s`, `150ms` or a bare number of seconds. Zero is allowed only
/// when `allow_zero` is set.
pub fn parse_duration(input: &str, allow_zero: bool) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration: {input}")))?;

    if value == 0 && !allow_zero {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
