use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dockwire_frame::StreamKind;
use dockwire_json::ProgressRecord;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

#[derive(Serialize)]
struct FrameOutput<'a> {
    stream: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct RecordOutput<'a, T> {
    kind: &'a str,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    record: &'a T,
}

pub fn print_frame(kind: StreamKind, payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                stream: kind.name(),
                payload_size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    kind.name().to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{kind} size={} payload={}",
                payload.len(),
                payload_preview(payload).trim_end()
            );
        }
        // Payload bytes go back to the stream they came from.
        OutputFormat::Raw => match kind {
            StreamKind::Stderr => write_all(&mut std::io::stderr(), payload),
            StreamKind::Stdout | StreamKind::Stdin => print_raw(payload),
        },
    }
}

pub fn print_record<T>(kind: &str, record: &T, format: OutputFormat)
where
    T: ProgressRecord + Serialize,
{
    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                kind,
                summary: record.summary(),
                error: record.error_message(),
                record,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SUMMARY", "ERROR"])
                .add_row(vec![
                    kind.to_string(),
                    record.summary(),
                    record.error_message().unwrap_or("-").to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("[{kind}] {}", record.summary()),
        OutputFormat::Raw => println!(
            "{}",
            serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
        ),
    }
}

pub fn print_raw(data: &[u8]) {
    write_all(&mut std::io::stdout(), data);
}

fn write_all(out: &mut impl Write, data: &[u8]) {
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
