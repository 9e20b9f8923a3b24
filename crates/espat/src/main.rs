mod cmd;
mod exit;
mod link;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{parse_duration, Command, Context};
use crate::exit::CliResult;
use crate::link::LinkSettings;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "espat", version, about = "ESP-AT co-processor driver CLI")]
struct Cli {
    /// Serial device path, or `sim` for the built-in emulator.
    #[arg(long, env = "ESPAT_DEVICE", global = true)]
    device: Option<String>,

    /// UART device id passed to the hardware layer.
    #[arg(long, value_name = "N", global = true)]
    device_id: Option<u32>,

    /// Serial line speed (default 115200, 8N1).
    #[arg(long, value_name = "BAUD", global = true)]
    baud: Option<u32>,

    /// JSON config file (device, transport, driver delays).
    #[arg(long, value_name = "FILE", env = "ESPAT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Keep collecting responses this long after the command (e.g. 2s).
    #[arg(long, value_name = "DURATION", global = true)]
    listen: Option<String>,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn context(&self) -> CliResult<Context> {
        Ok(Context {
            settings: LinkSettings::resolve(
                self.device.clone(),
                self.device_id,
                self.baud,
                self.config.clone(),
            )?,
            listen: self.listen.as_deref().map(parse_duration).transpose()?,
            format: self.format.unwrap_or_else(OutputFormat::default_for_stdout),
        })
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = cli.context().and_then(|ctx| cmd::run(cli.command, &ctx));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
