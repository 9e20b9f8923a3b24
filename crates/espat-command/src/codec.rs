//! Command values and their wire form.
//!
//! `encode_command` validates a [`Command`] and writes its `AT+...` body;
//! `decode_command` is the inverse for a received line.

use bytes::{BufMut, BytesMut};

use crate::descriptor::{self, CommandDescriptor, Form};
use crate::error::{DecodeError, Result};
use crate::params::{
    check_range, check_text, Bssid, DhcpMode, Encryption, SessionParams, SessionProtocol,
    SoftApConfig, WifiMode, MAX_PASSWORD_LEN, MAX_SSID_LEN,
};

/// Line terminator the co-processor expects after every command.
pub const TERMINATOR: &[u8; 2] = b"\r\n";

/// Largest payload one `AT+CIPSEND` accepts.
pub const MAX_SEND_LEN: usize = 2048;

/// One AT directive with typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AT+RST`
    Reset,
    /// `AT+GMR`
    Version,
    /// `AT+GSLP=<ms>`
    DeepSleep { millis: u32 },
    /// `AT+CWMODE=?`
    QueryWifiMode,
    /// `AT+CWMODE=<mode>`
    SetWifiMode(WifiMode),
    /// `AT+CWJAP?`
    QueryAp,
    /// `AT+CWJAP="<ssid>","<pwd>"[,"<bssid>"]`
    JoinAp {
        ssid: String,
        password: String,
        bssid: Option<Bssid>,
    },
    /// `AT+CWLAP[="<ssid>"]`
    ListAps { ssid: Option<String> },
    /// `AT+CWDHCP=<enable>,<mode>`
    SetDhcp { enable: bool, mode: DhcpMode },
    /// `AT+CWDHCP?`
    QueryDhcp,
    /// `AT+CWSAP?`
    QuerySoftAp,
    /// `AT+CWSAP="<ssid>","<pwd>",<chl>,<ecn>[,<max conn>[,<hidden>]]`
    SetSoftAp(SoftApConfig),
    /// `AT+CWLIF`
    ListSoftApClients,
    /// `AT+CIPSTATUS`
    ConnectionStatus,
    /// `AT+CIPSTART="TCP","<host>",<port>,<keepalive>`
    OpenSession(SessionParams),
    /// `AT+CIPSEND=<len>`; `len` raw bytes follow.
    PrepareSend { len: usize },
}

/// A single positional parameter on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Str(String),
}

impl Param {
    fn str(value: &str) -> Self {
        Param::Str(value.to_string())
    }

    fn flag(value: bool) -> Self {
        Param::Int(i64::from(value))
    }
}

impl Command {
    /// Static description of this command.
    pub fn descriptor(&self) -> &'static CommandDescriptor {
        match self {
            Command::Reset => &descriptor::RESET,
            Command::Version => &descriptor::VERSION,
            Command::DeepSleep { .. } => &descriptor::DEEP_SLEEP,
            Command::QueryWifiMode => &descriptor::QUERY_WIFI_MODE,
            Command::SetWifiMode(_) => &descriptor::SET_WIFI_MODE,
            Command::QueryAp => &descriptor::QUERY_AP,
            Command::JoinAp { .. } => &descriptor::JOIN_AP,
            Command::ListAps { .. } => &descriptor::LIST_APS,
            Command::SetDhcp { .. } => &descriptor::SET_DHCP,
            Command::QueryDhcp => &descriptor::QUERY_DHCP,
            Command::QuerySoftAp => &descriptor::QUERY_SOFTAP,
            Command::SetSoftAp(_) => &descriptor::SET_SOFTAP,
            Command::ListSoftApClients => &descriptor::LIST_SOFTAP_CLIENTS,
            Command::ConnectionStatus => &descriptor::CONNECTION_STATUS,
            Command::OpenSession(_) => &descriptor::OPEN_SESSION,
            Command::PrepareSend { .. } => &descriptor::PREPARE_SEND,
        }
    }

    /// Check every parameter against the protocol's limits.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::JoinAp { ssid, password, .. } => {
                check_text("ssid", ssid, 1, MAX_SSID_LEN)?;
                check_text("password", password, 0, MAX_PASSWORD_LEN)
            }
            Command::ListAps { ssid: Some(ssid) } => check_text("ssid", ssid, 1, MAX_SSID_LEN),
            Command::SetSoftAp(config) => config.validate(),
            Command::OpenSession(params) => params.validate(),
            Command::PrepareSend { len } => check_range(
                "payload length",
                i64::try_from(*len).unwrap_or(i64::MAX),
                1,
                MAX_SEND_LEN as i64,
            ),
            _ => Ok(()),
        }
    }

    /// Positional parameters in wire order.
    pub fn params(&self) -> Vec<Param> {
        match self {
            Command::DeepSleep { millis } => vec![Param::Int((*millis).into())],
            Command::SetWifiMode(mode) => vec![Param::Int(mode.as_u8().into())],
            Command::JoinAp {
                ssid,
                password,
                bssid,
            } => {
                let mut params = vec![Param::str(ssid), Param::str(password)];
                if let Some(bssid) = bssid {
                    params.push(Param::Str(bssid.to_string()));
                }
                params
            }
            Command::ListAps { ssid } => ssid.iter().map(|s| Param::str(s)).collect(),
            Command::SetDhcp { enable, mode } => {
                vec![Param::flag(*enable), Param::Int(mode.as_u8().into())]
            }
            Command::SetSoftAp(config) => {
                let mut params = vec![
                    Param::str(&config.ssid),
                    Param::str(config.effective_password()),
                    Param::Int(config.channel.into()),
                    Param::Int(config.encryption.as_u8().into()),
                ];
                if let Some(max_conn) = config.max_conn {
                    params.push(Param::Int(max_conn.into()));
                    if let Some(hidden) = config.hidden {
                        params.push(Param::flag(hidden));
                    }
                }
                params
            }
            Command::OpenSession(session) => vec![
                Param::str(session.protocol.as_str()),
                Param::str(&session.host),
                Param::Int(session.port.into()),
                Param::Int(session.keepalive.into()),
            ],
            Command::PrepareSend { len } => vec![Param::Int(*len as i64)],
            _ => Vec::new(),
        }
    }
}

/// Encode a command body (no terminator) into `dst`.
///
/// Validation runs first; on error `dst` is left untouched.
pub fn encode_command(command: &Command, dst: &mut BytesMut) -> Result<()> {
    command.validate()?;

    let descriptor = command.descriptor();
    let params = command.params();

    dst.reserve(descriptor.prefix.len() + 8 + params.len() * 16);
    dst.put_slice(descriptor.prefix.as_bytes());
    match descriptor.form {
        Form::Execute => {}
        Form::Query => dst.put_u8(b'?'),
        Form::Test => dst.put_slice(b"=?"),
        Form::Set if params.is_empty() => {}
        Form::Set => {
            dst.put_u8(b'=');
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    dst.put_u8(b',');
                }
                put_param(param, dst);
            }
        }
    }
    Ok(())
}

/// Encode a full command line including [`TERMINATOR`].
pub fn encode_line(command: &Command) -> Result<BytesMut> {
    let mut dst = BytesMut::new();
    encode_command(command, &mut dst)?;
    dst.put_slice(TERMINATOR);
    Ok(dst)
}

fn put_param(param: &Param, dst: &mut BytesMut) {
    match param {
        Param::Int(value) => dst.put_slice(value.to_string().as_bytes()),
        Param::Str(value) => {
            dst.put_u8(b'"');
            for byte in value.bytes() {
                if matches!(byte, b'"' | b',' | b'\\') {
                    dst.put_u8(b'\\');
                }
                dst.put_u8(byte);
            }
            dst.put_u8(b'"');
        }
    }
}

/// A command line split into its prefix, form, and raw parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub prefix: String,
    pub form: Form,
    pub params: Vec<Param>,
}

/// Split a command line without interpreting its parameters.
///
/// A trailing [`TERMINATOR`] is accepted and ignored.
pub fn split_command(line: &[u8]) -> std::result::Result<RawCommand, DecodeError> {
    let line = line.strip_suffix(TERMINATOR).unwrap_or(line);
    let text = std::str::from_utf8(line).map_err(|_| DecodeError::NotText)?;
    let rest = text.strip_prefix("AT+").ok_or(DecodeError::MissingPrefix)?;

    let name_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let (name, tail) = rest.split_at(name_len);
    if name.is_empty() {
        return Err(DecodeError::UnknownCommand(text.to_string()));
    }
    let prefix = format!("AT+{name}");

    let (form, params) = match tail {
        "" => (Form::Execute, Vec::new()),
        "?" => (Form::Query, Vec::new()),
        "=?" => (Form::Test, Vec::new()),
        _ => match tail.strip_prefix('=') {
            Some(args) => (
                Form::Set,
                split_params(args).ok_or_else(|| DecodeError::Syntax(text.to_string()))?,
            ),
            None => return Err(DecodeError::UnknownCommand(text.to_string())),
        },
    };

    Ok(RawCommand {
        prefix,
        form,
        params,
    })
}

fn split_params(args: &str) -> Option<Vec<Param>> {
    let mut params = Vec::new();
    let mut chars = args.chars().peekable();
    loop {
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next()? {
                    '\\' => value.push(chars.next()?),
                    '"' => break,
                    c => value.push(c),
                }
            }
            params.push(Param::Str(value));
        } else {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                token.push(c);
                chars.next();
            }
            params.push(Param::Int(token.parse().ok()?));
        }

        match chars.next() {
            None => return Some(params),
            Some(',') => continue,
            Some(_) => return None,
        }
    }
}

/// Parse a command line back into a [`Command`].
///
/// Inverse of [`encode_line`] for every command that passes validation.
pub fn decode_command(line: &[u8]) -> std::result::Result<Command, DecodeError> {
    let raw = split_command(line)?;
    let descriptor = descriptor::descriptor_for_prefix(&raw.prefix, raw.form)
        .ok_or_else(|| DecodeError::UnknownCommand(raw.prefix.clone()))?;
    if !descriptor.accepts_arity(raw.params.len()) {
        return Err(DecodeError::Arity {
            command: descriptor.name,
            got: raw.params.len(),
            min: descriptor.min_params,
            max: descriptor.max_params,
        });
    }

    let args = Args {
        name: descriptor.name,
        params: &raw.params,
    };
    let command = match descriptor.prefix {
        "AT+RST" => Command::Reset,
        "AT+GMR" => Command::Version,
        "AT+GSLP" => Command::DeepSleep {
            millis: args.int(0)?,
        },
        "AT+CWMODE" if raw.form == Form::Test => Command::QueryWifiMode,
        "AT+CWMODE" => Command::SetWifiMode(WifiMode::try_from(args.int::<u8>(0)?)?),
        "AT+CWJAP" if raw.form == Form::Query => Command::QueryAp,
        "AT+CWJAP" => Command::JoinAp {
            ssid: args.text(0)?,
            password: args.text(1)?,
            bssid: args.opt_text(2)?.map(|b| b.parse::<Bssid>()).transpose()?,
        },
        "AT+CWLAP" => Command::ListAps {
            ssid: args.opt_text(0)?,
        },
        "AT+CWDHCP" if raw.form == Form::Query => Command::QueryDhcp,
        "AT+CWDHCP" => Command::SetDhcp {
            enable: args.flag(0)?,
            mode: DhcpMode::try_from(args.int::<u8>(1)?)?,
        },
        "AT+CWSAP" if raw.form == Form::Query => Command::QuerySoftAp,
        "AT+CWSAP" => Command::SetSoftAp(SoftApConfig {
            ssid: args.text(0)?,
            password: args.text(1)?,
            channel: args.int(2)?,
            encryption: Encryption::try_from(args.int::<u8>(3)?)?,
            max_conn: args.opt_int(4)?,
            hidden: args.opt_int::<u8>(5)?.map(|h| h != 0),
        }),
        "AT+CWLIF" => Command::ListSoftApClients,
        "AT+CIPSTATUS" => Command::ConnectionStatus,
        "AT+CIPSTART" => Command::OpenSession(SessionParams {
            protocol: args.text(0)?.parse::<SessionProtocol>()?,
            host: args.text(1)?,
            port: args.int(2)?,
            keepalive: args.int(3)?,
        }),
        "AT+CIPSEND" => Command::PrepareSend { len: args.int(0)? },
        other => return Err(DecodeError::UnknownCommand(other.to_string())),
    };

    command.validate()?;
    Ok(command)
}

struct Args<'a> {
    name: &'static str,
    params: &'a [Param],
}

impl Args<'_> {
    fn malformed(&self, index: usize) -> DecodeError {
        DecodeError::Malformed {
            command: self.name,
            index,
        }
    }

    fn int<T: TryFrom<i64>>(&self, index: usize) -> std::result::Result<T, DecodeError> {
        self.opt_int(index)?.ok_or_else(|| self.malformed(index))
    }

    fn opt_int<T: TryFrom<i64>>(&self, index: usize) -> std::result::Result<Option<T>, DecodeError> {
        match self.params.get(index) {
            None => Ok(None),
            Some(Param::Int(value)) => T::try_from(*value)
                .map(Some)
                .map_err(|_| self.malformed(index)),
            Some(Param::Str(_)) => Err(self.malformed(index)),
        }
    }

    fn flag(&self, index: usize) -> std::result::Result<bool, DecodeError> {
        match self.int::<u8>(index)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(self.malformed(index)),
        }
    }

    fn text(&self, index: usize) -> std::result::Result<String, DecodeError> {
        self.opt_text(index)?.ok_or_else(|| self.malformed(index))
    }

    fn opt_text(&self, index: usize) -> std::result::Result<Option<String>, DecodeError> {
        match self.params.get(index) {
            None => Ok(None),
            Some(Param::Str(value)) => Ok(Some(value.clone())),
            Some(Param::Int(_)) => Err(self.malformed(index)),
        }
    }
}
