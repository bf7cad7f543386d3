use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use telehub::config::HubConfig;
use telehub::frame::NodeTable;
use telehub::reader::{ReaderInit, SettingsMap};

use crate::cmd::ShowSettingsArgs;
use crate::exit::{config_error, reader_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct ReaderOutput<'a> {
    name: &'a str,
    /// Init settings with defaults filled in; absent for ignored readers.
    #[serde(skip_serializing_if = "Option::is_none")]
    init: Option<ReaderInit>,
    runtime: &'a SettingsMap,
}

#[derive(Debug, Serialize)]
struct SettingsOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    loglevel: Option<&'a str>,
    readers: Vec<ReaderOutput<'a>>,
    nodes: &'a NodeTable,
}

pub fn run(args: ShowSettingsArgs, format: OutputFormat) -> CliResult<i32> {
    let config = HubConfig::load(&args.config)
        .map_err(|err| config_error("loading configuration", err))?;

    let mut readers = Vec::with_capacity(config.readers.len());
    for (name, section) in &config.readers {
        let init = section
            .reader_init()
            .map_err(|err| reader_error(&format!("reader {name}"), err))?;
        readers.push(ReaderOutput {
            name,
            init,
            runtime: &section.runtime,
        });
    }

    let output = SettingsOutput {
        loglevel: config.hub.loglevel.as_deref(),
        readers,
        nodes: &config.nodes,
    };
    print_settings(&output, format);
    Ok(SUCCESS)
}

fn print_settings(output: &SettingsOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["READER", "INIT", "RUNTIME"]);
            for reader in &output.readers {
                table.add_row(vec![
                    reader.name.to_string(),
                    init_text(reader.init.as_ref()),
                    compact_json(reader.runtime),
                ]);
            }
            println!("{table}");
            println!("nodes: {}", compact_json(output.nodes));
        }
        OutputFormat::Pretty => {
            if let Some(level) = output.loglevel {
                println!("loglevel: {level}");
            }
            for reader in &output.readers {
                println!("[{}]", reader.name);
                println!("  init:    {}", init_text(reader.init.as_ref()));
                println!("  runtime: {}", compact_json(reader.runtime));
            }
            println!("nodes: {}", compact_json(output.nodes));
        }
    }
}

fn init_text(init: Option<&ReaderInit>) -> String {
    match init {
        Some(init) => compact_json(init),
        None => "(no type, ignored)".to_string(),
    }
}

fn compact_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
