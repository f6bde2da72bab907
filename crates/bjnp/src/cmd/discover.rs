use bjnp_client::{Discovery, DiscoveryConfig};
use tracing::info;

use crate::cmd::{parse_duration, DiscoverArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_printers, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat) -> CliResult<i32> {
    let config = DiscoveryConfig {
        port: args.port,
        window: parse_duration(&args.window, false)?,
        broadcast_attempts: args.attempts.max(1),
        ..DiscoveryConfig::default()
    };

    let printers = Discovery::new(config)
        .discover_all()
        .map_err(|err| client_error("discovery failed", err))?;
    info!(count = printers.len(), "discovery finished");

    print_printers(&printers, format);
    Ok(SUCCESS)
}
