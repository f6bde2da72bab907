use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Map a backend debug level name, as given in `?debuglevel=` on the
    /// device URI, to a log level.
    ///
    /// Names are case-insensitive and anything after a `_` is ignored, so
    /// `debug_cups` reads as `debug`. Levels quieter than `error` collapse
    /// onto it and `debug2` turns on frame hexdumps.
    pub fn from_debuglevel(name: &str) -> Option<LogLevel> {
        let name = name.split('_').next().unwrap_or(name).to_ascii_lowercase();
        let level = match name.as_str() {
            "none" | "emerg" | "alert" | "crit" | "error" => LogLevel::Error,
            "warning" | "warn" => LogLevel::Warn,
            "notice" | "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "debug2" => LogLevel::Trace,
            _ => return None,
        };
        Some(level)
    }
}

/// Install the stderr subscriber. Stdout stays reserved for command output.
///
/// `uri_level` wins over `level` when a print job's device URI names one.
pub fn init_logging(format: LogFormat, level: LogLevel, uri_level: Option<LogLevel>) {
    let effective = uri_level.unwrap_or(level);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(effective.as_filter())
        .with_ansi(false)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    if installed && uri_level.is_some() {
        tracing::debug!(level = ?effective, "log level taken from device URI");
    }
}
