use ipcsearch_proto::{machine_name, ProtoError};
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{proto_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct InfoOutput {
    service_version: String,
    ipc_version: u32,
    target_machine: String,
    db_loaded: bool,
    instance: Option<String>,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = args.connect.connect()?;
    let query = |err: ProtoError| proto_error("query failed", &err);

    let version = client.version().map_err(query)?;
    let ipc_version = client.ipc_version().map_err(query)?;
    let machine = client.target_machine().map_err(query)?;
    let db_loaded = client.is_db_loaded().map_err(query)?;

    let out = InfoOutput {
        service_version: version.to_string(),
        ipc_version,
        target_machine: machine_name(machine)
            .map(str::to_string)
            .unwrap_or_else(|| format!("unknown ({machine})")),
        db_loaded,
        instance: args.connect.instance.clone(),
    };
    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Service Info:");
            println!("  Version:          {}", out.service_version);
            println!("  IPC version:      {}", out.ipc_version);
            println!("  Target machine:   {}", out.target_machine);
            println!(
                "  Database:         {}",
                if out.db_loaded { "loaded" } else { "loading" }
            );
            if let Some(instance) = &out.instance {
                println!("  Instance:         {instance}");
            }
        }
        OutputFormat::Raw => {
            println!("{}", out.service_version);
        }
    }
}
