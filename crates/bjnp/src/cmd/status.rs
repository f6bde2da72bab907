use bjnp_client::get_status;
use bjnp_frame::{parse_paper_status, parse_status_flags, PaperStatus};
use serde::Serialize;

use crate::cmd::{query, QueryArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct StatusOutput {
    printer: String,
    status: String,
    paper: &'static str,
    printing: Option<bool>,
    busy: Option<bool>,
}

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    let (addr, status) = query(&args, |addr, sequence, config| {
        get_status(addr, 0, sequence, config)
    })?;

    let flags = parse_status_flags(&status);
    let out = StatusOutput {
        printer: addr.to_string(),
        paper: paper_label(parse_paper_status(&status)),
        printing: flags.map(|f| f.printing()),
        busy: flags.map(|f| f.busy()),
        status,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&[
            ("printer", out.printer.clone()),
            ("paper", out.paper.to_string()),
            ("printing", flag_label(out.printing)),
            ("busy", flag_label(out.busy)),
            ("status", out.status.clone()),
        ]),
        OutputFormat::Cups => println!("{}", out.status),
    }
    Ok(SUCCESS)
}

fn paper_label(paper: PaperStatus) -> &'static str {
    match paper {
        PaperStatus::Ok => "ok",
        PaperStatus::PaperOut => "paper_out",
        PaperStatus::Unknown => "unknown",
    }
}

fn flag_label(flag: Option<bool>) -> String {
    flag.map_or_else(|| "unknown".to_string(), |f| f.to_string())
}
