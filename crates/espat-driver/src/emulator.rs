//! A scripted co-processor for dry runs and tests.
//!
//! Attach it to a [`SimUart`](espat_transport::SimUart) with
//! `set_responder` and every transmitted command line gets a plausible
//! ESP-AT reply. Only framing and state that a caller can observe
//! through queries are modelled.

use espat_command::{decode_command, Command, SessionParams, SoftApConfig, WifiMode};
use espat_transport::Responder;
use tracing::trace;

/// Firmware version reported for `AT+GMR`.
pub const EMULATED_AT_VERSION: &str = "AT version:1.7.4.0(emulated)";
/// SDK version reported for `AT+GMR`.
pub const EMULATED_SDK_VERSION: &str = "SDK version:3.0.4";

#[derive(Debug, Default)]
pub struct Emulator {
    mode: Option<WifiMode>,
    joined: Option<String>,
    soft_ap: Option<SoftApConfig>,
    session: Option<SessionParams>,
    /// Payload bytes still expected after a `CIPSEND` prompt.
    pending_payload: usize,
    payload_len: usize,
}

impl Emulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to one transmitted line (terminator already stripped).
    pub fn respond(&mut self, line: &[u8]) -> Vec<u8> {
        let command = match decode_command(line) {
            Ok(command) => command,
            Err(e) => {
                trace!(error = %e, "emulator rejected line");
                return b"ERROR\r\n".to_vec();
            }
        };

        let body = match command {
            Command::Reset => {
                self.session = None;
                return b"OK\r\n\r\nready\r\n".to_vec();
            }
            Command::Version => format!("{EMULATED_AT_VERSION}\r\n{EMULATED_SDK_VERSION}\r\n"),
            Command::DeepSleep { .. } => {
                self.session = None;
                String::new()
            }
            Command::QueryWifiMode => "+CWMODE:(1-3)\r\n".to_string(),
            Command::SetWifiMode(mode) => {
                self.mode = Some(mode);
                String::new()
            }
            Command::QueryAp => match &self.joined {
                Some(ssid) => format!("+CWJAP:\"{ssid}\"\r\n"),
                None => "No AP\r\n".to_string(),
            },
            Command::JoinAp { .. } if matches!(self.mode, Some(WifiMode::Null | WifiMode::SoftAp)) => {
                return b"+CWJAP:3\r\n\r\nFAIL\r\n".to_vec();
            }
            Command::JoinAp { ssid, .. } => {
                self.joined = Some(ssid);
                "WIFI CONNECTED\r\nWIFI GOT IP\r\n".to_string()
            }
            Command::ListAps { ssid } => format!(
                "+CWLAP:(3,\"{}\",-42,\"ca:fe:00:00:be:ef\",6)\r\n",
                ssid.as_deref().unwrap_or("emulated")
            ),
            Command::SetDhcp { .. } => String::new(),
            Command::QueryDhcp => "+CWDHCP:3\r\n".to_string(),
            Command::QuerySoftAp => match &self.soft_ap {
                Some(ap) => format!(
                    "+CWSAP:\"{}\",\"{}\",{},{}\r\n",
                    ap.ssid,
                    ap.effective_password(),
                    ap.channel,
                    ap.encryption.as_u8()
                ),
                None => "+CWSAP:\"ESP_EMU\",\"\",1,0\r\n".to_string(),
            },
            Command::SetSoftAp(config) => {
                self.soft_ap = Some(config);
                String::new()
            }
            Command::ListSoftApClients => String::new(),
            Command::ConnectionStatus => {
                let status = match (&self.session, &self.joined) {
                    (Some(_), _) => 3,
                    (None, Some(_)) => 2,
                    (None, None) => 5,
                };
                format!("STATUS:{status}\r\n")
            }
            Command::OpenSession(params) => {
                self.session = Some(params);
                "CONNECT\r\n".to_string()
            }
            Command::PrepareSend { len } => {
                self.pending_payload = len;
                self.payload_len = len;
                return b"OK\r\n> ".to_vec();
            }
        };

        let mut reply = body.into_bytes();
        reply.extend_from_slice(b"OK\r\n");
        reply
    }

    /// Count payload bytes after a `CIPSEND` prompt. The payload is
    /// acknowledged once the announced length has arrived.
    fn absorb_payload(&mut self, received: usize) -> Vec<u8> {
        let taken = received.min(self.pending_payload);
        self.pending_payload -= taken;
        if self.pending_payload == 0 {
            format!("\r\nRecv {} bytes\r\n\r\nSEND OK\r\n", self.payload_len).into_bytes()
        } else {
            Vec::new()
        }
    }
}

impl Responder for Emulator {
    fn on_line(&mut self, line: &[u8]) -> Vec<u8> {
        self.respond(line)
    }

    fn raw_pending(&self) -> usize {
        self.pending_payload
    }

    fn on_raw(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.absorb_payload(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(emulator: &mut Emulator, line: &str) -> String {
        String::from_utf8(emulator.respond(line.as_bytes())).unwrap()
    }

    #[test]
    fn unknown_lines_get_error() {
        let mut emu = Emulator::new();
        assert_eq!(reply(&mut emu, "AT+BOGUS"), "ERROR\r\n");
        assert_eq!(reply(&mut emu, "AT+CWMODE=9"), "ERROR\r\n");
    }

    #[test]
    fn join_then_query() {
        let mut emu = Emulator::new();
        assert_eq!(reply(&mut emu, "AT+CWJAP?"), "No AP\r\nOK\r\n");
        reply(&mut emu, "AT+CWJAP=\"MyNet\",\"pass1234\"");
        assert_eq!(reply(&mut emu, "AT+CWJAP?"), "+CWJAP:\"MyNet\"\r\nOK\r\n");
        assert_eq!(reply(&mut emu, "AT+CIPSTATUS"), "STATUS:2\r\nOK\r\n");
    }

    #[test]
    fn join_fails_in_softap_only_mode() {
        let mut emu = Emulator::new();
        reply(&mut emu, "AT+CWMODE=2");
        assert!(reply(&mut emu, "AT+CWJAP=\"MyNet\",\"pass1234\"").ends_with("FAIL\r\n"));
        assert_eq!(reply(&mut emu, "AT+CWJAP?"), "No AP\r\nOK\r\n");
    }

    #[test]
    fn cipsend_prompts_then_acknowledges_payload() {
        let mut emu = Emulator::new();
        reply(&mut emu, "AT+CIPSTART=\"TCP\",\"10.0.0.2\",80,0");
        assert_eq!(reply(&mut emu, "AT+CIPSEND=7"), "OK\r\n> ");
        assert_eq!(emu.raw_pending(), 7);
        assert!(emu.on_raw(b"AT\r\n").is_empty());
        assert_eq!(emu.on_raw(b"x\r\n"), b"\r\nRecv 7 bytes\r\n\r\nSEND OK\r\n");
        assert_eq!(emu.raw_pending(), 0);
        assert_eq!(reply(&mut emu, "AT+GMR").lines().last(), Some("OK"));
    }

    #[test]
    fn reset_drops_session() {
        let mut emu = Emulator::new();
        reply(&mut emu, "AT+CIPSTART=\"TCP\",\"10.0.0.2\",80,0");
        assert_eq!(reply(&mut emu, "AT+CIPSTATUS"), "STATUS:3\r\nOK\r\n");
        assert!(reply(&mut emu, "AT+RST").ends_with("ready\r\n"));
        assert_eq!(reply(&mut emu, "AT+CIPSTATUS"), "STATUS:5\r\nOK\r\n");
    }
}
