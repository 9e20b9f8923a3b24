use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use espat_command::{LineAccumulator, ResponseLine};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
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

/// One operation: what went out and what came back.
#[derive(Debug, Serialize)]
pub struct Exchange {
    pub schema_id: &'static str,
    pub operation: String,
    pub sent: Vec<String>,
    pub responses: Vec<String>,
    pub timestamp: String,
}

impl Exchange {
    pub fn new(operation: &str, sent: Vec<String>, received: &[u8]) -> Self {
        Self {
            schema_id: "https://schemas.3leaps.dev/espat/cli/v1/exchange.schema.json",
            operation: operation.to_string(),
            sent,
            responses: split_lines(received),
            timestamp: now_unix_seconds(),
        }
    }
}

/// Split received bytes into display lines, keeping the `>` prompt.
pub fn split_lines(received: &[u8]) -> Vec<String> {
    let mut acc = LineAccumulator::new();
    acc.push(received);
    let mut lines: Vec<String> = acc.by_ref().map(|line| line.text()).collect();
    lines.extend(acc.finish().map(|line| line.text()));
    lines
}

pub fn print_exchange(exchange: &Exchange, received: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(exchange).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIRECTION", "LINE"]);
            for line in &exchange.sent {
                table.add_row(vec!["sent".to_string(), line.clone()]);
            }
            for line in &exchange.responses {
                table.add_row(vec!["recv".to_string(), line.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}:", exchange.operation);
            for line in &exchange.sent {
                println!("  > {line}");
            }
            for line in &exchange.responses {
                println!("  < {line}");
            }
        }
        OutputFormat::Raw => print_raw(received),
    }
}

#[derive(Serialize)]
struct LineOutput<'a> {
    schema_id: &'a str,
    line: String,
    prompt: bool,
    timestamp: String,
}

/// Print one received line as it arrives.
pub fn print_line(line: &ResponseLine, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = LineOutput {
                schema_id: "https://schemas.3leaps.dev/espat/cli/v1/response-line.schema.json",
                line: line.text(),
                prompt: matches!(line, ResponseLine::Prompt),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("< {}", line.text()),
        OutputFormat::Raw => match line {
            ResponseLine::Line(bytes) => {
                print_raw(bytes);
                print_raw(b"\r\n");
            }
            ResponseLine::Prompt => print_raw(b"> "),
        },
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Payload as shown in output: text when it is UTF-8.
pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.escape_debug().to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_prompt_and_trailing_text() {
        let lines = split_lines(b"OK\r\n> \r\nRecv 5 bytes\r\npartial");
        assert_eq!(lines, vec!["OK", ">", "Recv 5 bytes", "partial"]);
        assert_eq!(split_lines(b"OK\r\n>"), vec!["OK", ">"]);
    }

    #[test]
    fn preview_escapes_control_bytes() {
        assert_eq!(payload_preview(b"a\r\n"), "a\\r\\n");
        assert_eq!(payload_preview(&[0xff, 0x00]), "<binary 2 bytes>");
    }
}
