//! Typed, range-checked command parameters.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ValidationError};

/// Longest SSID the co-processor accepts.
pub const MAX_SSID_LEN: usize = 32;
/// Longest station or soft-AP password.
pub const MAX_PASSWORD_LEN: usize = 64;
/// Shortest soft-AP password when encryption is enabled.
pub const MIN_SOFTAP_PASSWORD_LEN: usize = 8;
/// Longest remote host accepted by `AT+CIPSTART`.
pub const MAX_HOST_LEN: usize = 64;
/// Largest TCP keepalive interval, seconds.
pub const MAX_KEEPALIVE_SECS: u16 = 7200;
/// Soft-AP radio channel range.
pub const SOFTAP_CHANNELS: (u8, u8) = (1, 14);
/// Soft-AP station limit range.
pub const SOFTAP_MAX_CONN: (u8, u8) = (1, 10);

/// Wi-Fi operating mode (`AT+CWMODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WifiMode {
    /// Radio off.
    Null = 0,
    Station = 1,
    SoftAp = 2,
    SoftApAndStation = 3,
}

impl WifiMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WifiMode {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WifiMode::Null),
            1 => Ok(WifiMode::Station),
            2 => Ok(WifiMode::SoftAp),
            3 => Ok(WifiMode::SoftApAndStation),
            other => Err(out_of_range("wifi mode", other.into(), 0, 3)),
        }
    }
}

/// Which interfaces a DHCP change applies to (`AT+CWDHCP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DhcpMode {
    /// Affects neither interface.
    Neither = 0,
    Station = 1,
    SoftAp = 2,
    Both = 3,
}

impl DhcpMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DhcpMode {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DhcpMode::Neither),
            1 => Ok(DhcpMode::Station),
            2 => Ok(DhcpMode::SoftAp),
            3 => Ok(DhcpMode::Both),
            other => Err(out_of_range("dhcp mode", other.into(), 0, 3)),
        }
    }
}

/// Soft-AP encryption (`AT+CWSAP` `<ecn>`).
///
/// Value 1 (WEP) exists in the protocol but soft-AP mode rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encryption {
    /// No password; any supplied password is ignored.
    Open = 0,
    WpaPsk = 2,
    Wpa2Psk = 3,
    WpaWpa2Psk = 4,
}

impl Encryption {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn requires_password(self) -> bool {
        self != Encryption::Open
    }
}

impl TryFrom<u8> for Encryption {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Encryption::Open),
            1 => Err(ValidationError::Unsupported {
                param: "encryption",
                value: 1,
            }),
            2 => Ok(Encryption::WpaPsk),
            3 => Ok(Encryption::Wpa2Psk),
            4 => Ok(Encryption::WpaWpa2Psk),
            other => Err(out_of_range("encryption", other.into(), 0, 4)),
        }
    }
}

/// Access point MAC address used to pick one of several APs sharing an SSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bssid(pub [u8; 6]);

impl FromStr for Bssid {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ValidationError::InvalidBssid(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Bssid(octets))
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Soft-AP configuration (`AT+CWSAP=...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftApConfig {
    pub ssid: String,
    /// Ignored when `encryption` is [`Encryption::Open`].
    pub password: String,
    pub channel: u8,
    pub encryption: Encryption,
    /// Station limit. `None` omits the field.
    pub max_conn: Option<u8>,
    /// Hide the SSID. `None` omits the field; needs `max_conn`.
    pub hidden: Option<bool>,
}

impl SoftApConfig {
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        channel: u8,
        encryption: Encryption,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            channel,
            encryption,
            max_conn: None,
            hidden: None,
        }
    }

    pub fn with_max_conn(mut self, max_conn: u8) -> Self {
        self.max_conn = Some(max_conn);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    /// Password as it goes on the wire: empty for open networks.
    pub fn effective_password(&self) -> &str {
        if self.encryption.requires_password() {
            &self.password
        } else {
            ""
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_text("ssid", &self.ssid, 1, MAX_SSID_LEN)?;
        if self.encryption.requires_password() {
            check_text(
                "password",
                &self.password,
                MIN_SOFTAP_PASSWORD_LEN,
                MAX_PASSWORD_LEN,
            )?;
        }
        check_range(
            "channel",
            self.channel.into(),
            SOFTAP_CHANNELS.0.into(),
            SOFTAP_CHANNELS.1.into(),
        )?;
        if let Some(max_conn) = self.max_conn {
            check_range(
                "max connections",
                max_conn.into(),
                SOFTAP_MAX_CONN.0.into(),
                SOFTAP_MAX_CONN.1.into(),
            )?;
        }
        if self.hidden.is_some() && self.max_conn.is_none() {
            return Err(ValidationError::MissingDependency {
                param: "hidden",
                requires: "max connections",
            });
        }
        Ok(())
    }
}

/// Transport requested from `AT+CIPSTART`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionProtocol {
    Tcp,
    Ssl,
}

impl SessionProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionProtocol::Tcp => "TCP",
            SessionProtocol::Ssl => "SSL",
        }
    }
}

impl FromStr for SessionProtocol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TCP" => Ok(SessionProtocol::Tcp),
            "SSL" => Ok(SessionProtocol::Ssl),
            other => Err(ValidationError::UnknownName {
                param: "session protocol",
                value: other.to_string(),
            }),
        }
    }
}

/// Remote endpoint of a session (`AT+CIPSTART=...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub protocol: SessionProtocol,
    /// IPv4 address or host name.
    pub host: String,
    pub port: u16,
    /// TCP keepalive probe interval, seconds. 0 disables it.
    pub keepalive: u16,
}

impl SessionParams {
    pub fn tcp(host: impl Into<String>, port: u16, keepalive: u16) -> Self {
        Self {
            protocol: SessionProtocol::Tcp,
            host: host.into(),
            port,
            keepalive,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_text("host", &self.host, 1, MAX_HOST_LEN)?;
        check_range("port", self.port.into(), 1, u16::MAX.into())?;
        check_range(
            "keepalive",
            self.keepalive.into(),
            0,
            MAX_KEEPALIVE_SECS.into(),
        )
    }
}

/// Check a string parameter's byte length and reject framing bytes.
pub fn check_text(param: &'static str, value: &str, min: usize, max: usize) -> Result<()> {
    if let Some(ch) = value.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
        return Err(ValidationError::InvalidChar { param, ch });
    }
    let len = value.len();
    if len < min || len > max {
        return Err(ValidationError::Length {
            param,
            len,
            min,
            max,
        });
    }
    Ok(())
}

pub(crate) fn check_range(param: &'static str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(out_of_range(param, value, min, max));
    }
    Ok(())
}

fn out_of_range(param: &'static str, value: i64, min: i64, max: i64) -> ValidationError {
    ValidationError::OutOfRange {
        param,
        value,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_mode_accepts_zero_through_three() {
        for raw in 0u8..=3 {
            assert_eq!(WifiMode::try_from(raw).unwrap().as_u8(), raw);
        }
        for raw in 4u8..=u8::MAX {
            assert!(matches!(
                WifiMode::try_from(raw),
                Err(ValidationError::OutOfRange { max: 3, .. })
            ));
        }
    }

    #[test]
    fn dhcp_mode_range() {
        assert_eq!(DhcpMode::try_from(3).unwrap(), DhcpMode::Both);
        assert!(DhcpMode::try_from(4).is_err());
    }

    #[test]
    fn encryption_rejects_wep_and_above_four() {
        assert!(matches!(
            Encryption::try_from(1),
            Err(ValidationError::Unsupported { value: 1, .. })
        ));
        assert!(Encryption::try_from(5).is_err());
        assert_eq!(Encryption::try_from(4).unwrap(), Encryption::WpaWpa2Psk);
    }

    #[test]
    fn bssid_parse_and_display() {
        let bssid: Bssid = "AA:bb:0C:dd:ee:01".parse().unwrap();
        assert_eq!(bssid.0, [0xaa, 0xbb, 0x0c, 0xdd, 0xee, 0x01]);
        assert_eq!(bssid.to_string(), "aa:bb:0c:dd:ee:01");

        for bad in [
            "",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:ff:00",
            "a:bb:cc:dd:ee:ff",
            "zz:bb:cc:dd:ee:ff",
            "+a:bb:cc:dd:ee:ff",
        ] {
            assert!(bad.parse::<Bssid>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn softap_password_bounds_depend_on_encryption() {
        let short = SoftApConfig::new("ap", "1234567", 6, Encryption::Wpa2Psk);
        assert!(matches!(
            short.validate(),
            Err(ValidationError::Length { param: "password", len: 7, .. })
        ));

        let long = SoftApConfig::new("ap", "x".repeat(65), 6, Encryption::WpaPsk);
        assert!(long.validate().is_err());

        let open = SoftApConfig::new("ap", "short", 6, Encryption::Open);
        assert!(open.validate().is_ok());
        assert_eq!(open.effective_password(), "");

        let edge = SoftApConfig::new("ap", "x".repeat(64), 6, Encryption::WpaPsk);
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn softap_optional_fields() {
        let base = SoftApConfig::new("ap", "password1", 1, Encryption::Wpa2Psk);
        assert!(base.clone().with_max_conn(0).validate().is_err());
        assert!(base.clone().with_max_conn(11).validate().is_err());
        assert!(base
            .clone()
            .with_max_conn(10)
            .with_hidden(true)
            .validate()
            .is_ok());
        assert!(matches!(
            base.clone().with_hidden(false).validate(),
            Err(ValidationError::MissingDependency { param: "hidden", .. })
        ));
        assert!(SoftApConfig { channel: 15, ..base }.validate().is_err());
    }

    #[test]
    fn session_params_validation() {
        assert!(SessionParams::tcp("192.168.1.101", 5005, 10).validate().is_ok());
        assert!(SessionParams::tcp("", 5005, 10).validate().is_err());
        assert!(SessionParams::tcp("host", 0, 10).validate().is_err());
        assert!(SessionParams::tcp("host", 80, 7201).validate().is_err());
        assert!(matches!(
            SessionParams::tcp("bad\r\nhost", 80, 0).validate(),
            Err(ValidationError::InvalidChar { ch: '\r', .. })
        ));
    }

    #[test]
    fn protocol_names() {
        assert_eq!("TCP".parse::<SessionProtocol>().unwrap(), SessionProtocol::Tcp);
        assert_eq!(SessionProtocol::Ssl.as_str(), "SSL");
        assert!("UDP".parse::<SessionProtocol>().is_err());
    }
}
