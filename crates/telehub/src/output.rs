use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use telehub::frame::DecodedFrame;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Space-separated `timestamp node values.. [signal] reference`.
    Raw,
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

pub fn print_frame(frame: &DecodedFrame, format: OutputFormat) {
    println!("{}", render_frame(frame, format));
}

pub fn render_frame(frame: &DecodedFrame, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(frame).unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["READER", "REF", "TIME", "NODE", "VALUES", "SIGNAL"])
                .add_row(vec![
                    frame.reader.clone(),
                    frame.reference.to_string(),
                    format!("{:.2}", frame.timestamp),
                    frame.node.to_string(),
                    join_values(frame),
                    frame
                        .signal_quality
                        .map(|s| s.to_string())
                        .unwrap_or_default(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => {
            let mut line = format!(
                "reader={} ref={} time={:.2} node={} values=[{}]",
                frame.reader,
                frame.reference,
                frame.timestamp,
                frame.node,
                join_values(frame)
            );
            if let Some(signal) = frame.signal_quality {
                line.push_str(&format!(" signal={signal}"));
            }
            line
        }
        OutputFormat::Raw => frame
            .to_row()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn join_values(frame: &DecodedFrame) -> String {
    frame
        .values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
