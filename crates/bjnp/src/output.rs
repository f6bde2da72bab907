use std::io::IsTerminal;

use bjnp_client::{AddressRank, DiscoveredPrinter};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Listing line the spooler expects when no printer answered discovery.
pub const CUPS_NO_PRINTERS: &str = "network bjnp \"Unknown\" \"Canon network printer\"";

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    /// Spooler device listing lines.
    Cups,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct PrinterOutput<'a> {
    pub uri: String,
    pub address: String,
    pub port: u16,
    pub hostname: &'a str,
    pub rank: AddressRank,
    pub mac: Option<String>,
    pub model: &'a str,
    pub ieee1284_id: &'a str,
}

impl<'a> From<&'a DiscoveredPrinter> for PrinterOutput<'a> {
    fn from(printer: &'a DiscoveredPrinter) -> Self {
        Self {
            uri: printer.device_uri(),
            address: printer.addr.to_string(),
            port: printer.port,
            hostname: &printer.hostname,
            rank: printer.rank,
            mac: printer.mac.map(|mac| mac.to_string()),
            model: printer.model(),
            ieee1284_id: &printer.identity.ieee1284_id,
        }
    }
}

#[derive(Serialize)]
struct PrinterList<'a> {
    printers: Vec<PrinterOutput<'a>>,
    count: usize,
}

pub fn print_printers(printers: &[DiscoveredPrinter], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PrinterList {
                printers: printers.iter().map(PrinterOutput::from).collect(),
                count: printers.len(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["URI", "MODEL", "ADDRESS", "MAC"]);
            for printer in printers {
                table.add_row(vec![
                    printer.device_uri(),
                    printer.model().to_string(),
                    printer.addr.to_string(),
                    printer
                        .mac
                        .map(|mac| mac.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Cups => {
            if printers.is_empty() {
                println!("{CUPS_NO_PRINTERS}");
            }
            for printer in printers {
                println!("{}", printer.cups_listing());
            }
        }
    }
}

/// Key/value rows rendered as a two-column table.
pub fn print_fields(fields: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (name, value) in fields {
        table.add_row(vec![name.to_string(), value.clone()]);
    }
    println!("{table}");
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
