use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    readers: [&'static str; 4],
    i2c: bool,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("telehub {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let out = VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
        readers: ["serial", "radio", "socket", "bus"],
        i2c: telehub::transport::I2C_SUPPORTED,
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        _ => {
            println!("name: {}", out.name);
            println!("version: {}", out.version);
            println!("target: {}-{}", out.target_arch, out.target_os);
            println!("readers: {}", out.readers.join(", "));
            println!(
                "i2c: {}",
                if out.i2c { "available" } else { "not compiled in" }
            );
        }
    }

    Ok(SUCCESS)
}
