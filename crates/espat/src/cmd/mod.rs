use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use espat_command::{encode_line, Command as AtCommand, TERMINATOR};

use crate::exit::{driver_error, validation_error, CliError, CliResult, SUCCESS, USAGE};
use crate::link::{CliDriver, Link, LinkSettings};
use crate::output::{print_exchange, Exchange, OutputFormat};

pub mod about;
pub mod basic;
pub mod config;
pub mod monitor;
pub mod session;
pub mod stream;
pub mod wifi;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restart the co-processor (AT+RST).
    Reset(ResetArgs),
    /// Query firmware version (AT+GMR).
    Version,
    /// Enter deep sleep for a number of milliseconds (AT+GSLP).
    Sleep(SleepArgs),
    /// Query or set the Wi-Fi mode (AT+CWMODE).
    Mode(ModeArgs),
    /// Station operations: current AP, join, scan.
    Ap(ApArgs),
    /// Query or set DHCP (AT+CWDHCP).
    Dhcp(DhcpArgs),
    /// Soft-AP operations: config and attached stations.
    Softap(SoftapArgs),
    /// Query connection status (AT+CIPSTATUS).
    Status,
    /// Open a TCP session (AT+CIPSTART).
    Connect(ConnectArgs),
    /// Send a payload over the open session (AT+CIPSEND).
    Send(SendArgs),
    /// Reset, connect, and push a status payload at an interval.
    Stream(StreamArgs),
    /// Print co-processor output as it arrives.
    Monitor(MonitorArgs),
    /// Print the effective link configuration.
    Config,
    /// Show version and build information.
    About(AboutArgs),
}

/// Global settings shared by every subcommand.
pub struct Context {
    pub settings: LinkSettings,
    pub listen: Option<Duration>,
    pub format: OutputFormat,
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Reset(args) => basic::reset(args, ctx),
        Command::Version => basic::version(ctx),
        Command::Sleep(args) => basic::sleep(args, ctx),
        Command::Status => basic::status(ctx),
        Command::Mode(args) => wifi::mode(args, ctx),
        Command::Ap(args) => wifi::ap(args, ctx),
        Command::Dhcp(args) => wifi::dhcp(args, ctx),
        Command::Softap(args) => wifi::softap(args, ctx),
        Command::Connect(args) => session::connect(args, ctx),
        Command::Send(args) => session::send(args, ctx),
        Command::Stream(args) => stream::run(args, ctx),
        Command::Monitor(args) => monitor::run(args, ctx),
        Command::Config => config::run(ctx),
        Command::About(args) => about::run(args, ctx.format),
    }
}

/// Encoded form of `command` for display. Fails on invalid parameters,
/// before any link is opened.
pub fn sent_line(command: &AtCommand) -> CliResult<String> {
    let line = encode_line(command)
        .map_err(|err| validation_error(&format!("{} rejected", command.descriptor().name), err))?;
    let body = line.strip_suffix(TERMINATOR).unwrap_or(&line[..]);
    Ok(String::from_utf8_lossy(body).into_owned())
}

/// Open the link, run one operation, and print what came back.
pub fn exchange(
    ctx: &Context,
    operation: &str,
    sent: Vec<String>,
    op: impl FnOnce(&mut CliDriver) -> espat_driver::Result<()>,
) -> CliResult<i32> {
    let mut link = Link::open(&ctx.settings)?;
    op(link.driver()).map_err(|err| driver_error(&format!("{operation} failed"), err))?;
    let received = link.collect(ctx.listen);
    print_exchange(&Exchange::new(operation, sent, &received), &received, ctx.format);
    Ok(SUCCESS)
}

/// [`exchange`] for an operation that maps to exactly one command.
pub fn exchange_one(
    ctx: &Context,
    command: &AtCommand,
    op: impl FnOnce(&mut CliDriver) -> espat_driver::Result<()>,
) -> CliResult<i32> {
    let sent = sent_line(command)?;
    exchange(ctx, command.descriptor().name, vec![sent], op)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Also wait for the co-processor to restart.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct SleepArgs {
    /// Sleep time in milliseconds.
    pub millis: u32,
}

#[derive(Args, Debug)]
pub struct ModeArgs {
    #[command(subcommand)]
    pub action: ModeAction,
}

#[derive(Subcommand, Debug)]
pub enum ModeAction {
    /// Ask which modes are available (AT+CWMODE=?).
    Get,
    /// 0 off, 1 station, 2 soft-AP, 3 both.
    Set { mode: u8 },
}

#[derive(Args, Debug)]
pub struct ApArgs {
    #[command(subcommand)]
    pub action: ApAction,
}

#[derive(Subcommand, Debug)]
pub enum ApAction {
    /// Query the AP the station is joined to (AT+CWJAP?).
    Get,
    /// Join an access point (AT+CWJAP=...).
    Join {
        ssid: String,
        #[arg(long, default_value = "")]
        password: String,
        /// Pick one AP among several sharing the SSID (xx:xx:xx:xx:xx:xx).
        #[arg(long)]
        bssid: Option<String>,
    },
    /// Scan for access points (AT+CWLAP).
    List {
        /// Only report this SSID.
        #[arg(long)]
        ssid: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct DhcpArgs {
    #[command(subcommand)]
    pub action: DhcpAction,
}

#[derive(Subcommand, Debug)]
pub enum DhcpAction {
    /// Query DHCP state (AT+CWDHCP?).
    Get,
    /// Enable or disable DHCP: mode 0 neither, 1 station, 2 soft-AP, 3 both.
    Set {
        mode: u8,
        #[arg(long)]
        disable: bool,
    },
}

#[derive(Args, Debug)]
pub struct SoftapArgs {
    #[command(subcommand)]
    pub action: SoftapAction,
}

#[derive(Subcommand, Debug)]
pub enum SoftapAction {
    /// Query the soft-AP configuration (AT+CWSAP?).
    Get,
    /// Configure the soft-AP (AT+CWSAP=...).
    Set {
        ssid: String,
        /// Ignored when --encryption is 0.
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value_t = 1)]
        channel: u8,
        /// 0 open, 2 WPA-PSK, 3 WPA2-PSK, 4 WPA/WPA2-PSK.
        #[arg(long, default_value_t = 3)]
        encryption: u8,
        #[arg(long)]
        max_conn: Option<u8>,
        /// Hide the SSID. Needs --max-conn.
        #[arg(long)]
        hidden: bool,
    },
    /// List stations attached to the soft-AP (AT+CWLIF).
    Clients,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    pub host: String,
    pub port: u16,
    /// TCP keepalive interval in seconds (0 disables).
    #[arg(long, default_value_t = 0)]
    pub keepalive: u16,
    /// Open an SSL session instead of plain TCP.
    #[arg(long)]
    pub ssl: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    pub host: String,
    pub port: u16,
    /// Payload pushed on every tick.
    #[arg(long)]
    pub data: String,
    /// Time between payloads (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Stop after N payloads. Default: until interrupted.
    #[arg(long)]
    pub count: Option<u64>,
    #[arg(long, default_value_t = 10)]
    pub keepalive: u16,
    /// Skip the initial reset.
    #[arg(long)]
    pub no_reset: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Exit after printing N lines.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long without output (e.g. 5s).
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct AboutArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn sent_line_validates() {
        assert_eq!(sent_line(&AtCommand::Version).unwrap(), "AT+GMR");
        let err = sent_line(&AtCommand::PrepareSend { len: 0 }).unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }
}
