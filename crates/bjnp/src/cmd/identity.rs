use bjnp_client::get_identity;
use serde::Serialize;

use crate::cmd::{query, QueryArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct IdentityOutput {
    printer: String,
    model: String,
    ieee1284_id: String,
}

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    let (addr, identity) = query(&args, |addr, sequence, config| {
        get_identity(addr, 0, sequence, config)
    })?;

    let out = IdentityOutput {
        printer: addr.to_string(),
        model: identity.model,
        ieee1284_id: identity.ieee1284_id,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&[
            ("printer", out.printer.clone()),
            ("model", out.model.clone()),
            ("ieee1284_id", out.ieee1284_id.clone()),
        ]),
        OutputFormat::Cups => println!("{}", out.ieee1284_id),
    }
    Ok(SUCCESS)
}
