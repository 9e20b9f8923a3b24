use bytes::BytesMut;
use espat_command::{
    encode_command, Bssid, Command, DhcpMode, SessionParams, SoftApConfig, WifiMode,
};
use espat_transport::{SerialChannel, UartHardware};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::delay::Delay;
use crate::error::Result;

/// What the driver last did to the co-processor's TCP session.
///
/// Kept for diagnostics. Nothing is refused based on it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session opened since start-up, reset, or deep sleep.
    #[default]
    Idle,
    /// `AT+CIPSTART` was sent for this endpoint.
    Opened { host: String, port: u16 },
}

/// Drives one co-processor over a [`SerialChannel`].
///
/// Each operation encodes and validates its command in full before the
/// first byte goes out, then sends the body followed by the terminator.
/// `Ok(())` means the link accepted every byte. Replies arrive on the
/// channel's response sink and are not inspected here.
pub struct AtDriver<H, D> {
    channel: SerialChannel<H>,
    delay: D,
    config: DriverConfig,
    session: SessionState,
    scratch: BytesMut,
}

impl<H: UartHardware, D: Delay> AtDriver<H, D> {
    pub fn new(channel: SerialChannel<H>, delay: D) -> Self {
        Self::with_config(channel, delay, DriverConfig::default())
    }

    pub fn with_config(channel: SerialChannel<H>, delay: D, config: DriverConfig) -> Self {
        Self {
            channel,
            delay,
            config,
            session: SessionState::Idle,
            scratch: BytesMut::with_capacity(128),
        }
    }

    /// `AT+RST`. The co-processor reboots; wait before the next command.
    pub fn reset(&mut self) -> Result<()> {
        self.send_command(&Command::Reset)?;
        self.session = SessionState::Idle;
        Ok(())
    }

    /// [`reset`](Self::reset), then wait the configured reset settle time.
    pub fn reset_and_wait(&mut self) -> Result<()> {
        self.reset()?;
        let settle = self.config.reset_settle;
        debug!(?settle, "waiting for co-processor restart");
        self.delay.delay(settle);
        Ok(())
    }

    /// `AT+GMR`
    pub fn check_version(&mut self) -> Result<()> {
        self.send_command(&Command::Version)
    }

    /// `AT+GSLP=<millis>`
    pub fn enter_deep_sleep(&mut self, millis: u32) -> Result<()> {
        self.send_command(&Command::DeepSleep { millis })?;
        self.session = SessionState::Idle;
        Ok(())
    }

    /// `AT+CWMODE=?`
    pub fn get_wifi_mode(&mut self) -> Result<()> {
        self.send_command(&Command::QueryWifiMode)
    }

    pub fn set_wifi_mode(&mut self, mode: WifiMode) -> Result<()> {
        self.send_command(&Command::SetWifiMode(mode))
    }

    /// `AT+CWJAP?`
    pub fn get_current_ap(&mut self) -> Result<()> {
        self.send_command(&Command::QueryAp)
    }

    pub fn join_ap(&mut self, ssid: &str, password: &str, bssid: Option<Bssid>) -> Result<()> {
        self.send_command(&Command::JoinAp {
            ssid: ssid.to_string(),
            password: password.to_string(),
            bssid,
        })
    }

    /// `AT+CWLAP`, optionally filtered by SSID.
    pub fn list_aps(&mut self, ssid: Option<&str>) -> Result<()> {
        self.send_command(&Command::ListAps {
            ssid: ssid.map(str::to_string),
        })
    }

    pub fn set_dhcp(&mut self, enable: bool, mode: DhcpMode) -> Result<()> {
        self.send_command(&Command::SetDhcp { enable, mode })
    }

    pub fn get_dhcp(&mut self) -> Result<()> {
        self.send_command(&Command::QueryDhcp)
    }

    pub fn get_soft_ap(&mut self) -> Result<()> {
        self.send_command(&Command::QuerySoftAp)
    }

    pub fn set_soft_ap(&mut self, config: &SoftApConfig) -> Result<()> {
        self.send_command(&Command::SetSoftAp(config.clone()))
    }

    /// `AT+CWLIF`: stations attached to the soft-AP.
    pub fn list_soft_ap_clients(&mut self) -> Result<()> {
        self.send_command(&Command::ListSoftApClients)
    }

    /// `AT+CIPSTATUS`
    pub fn connection_status(&mut self) -> Result<()> {
        self.send_command(&Command::ConnectionStatus)
    }

    /// Open a TCP session and wait for the co-processor to connect.
    ///
    /// Blocks for the configured session settle time after the command is
    /// sent.
    pub fn establish_session(&mut self, params: &SessionParams) -> Result<()> {
        self.send_command(&Command::OpenSession(params.clone()))?;
        let settle = self.config.session_settle;
        debug!(?settle, "waiting for session");
        self.delay.delay(settle);

        info!(host = %params.host, port = params.port, "session opened");
        self.session = SessionState::Opened {
            host: params.host.clone(),
            port: params.port,
        };
        Ok(())
    }

    /// Send `payload` over the open session.
    ///
    /// Transmits `AT+CIPSEND=<len>`, waits the payload settle time, then
    /// sends the raw bytes one at a time. A failure after the first phase
    /// leaves the co-processor waiting for payload bytes.
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<()> {
        if self.session == SessionState::Idle {
            warn!(len = payload.len(), "sending payload with no session opened");
        }

        self.send_command(&Command::PrepareSend {
            len: payload.len(),
        })?;
        self.delay.delay(self.config.payload_settle);
        self.channel.send_bytes_safe(payload)?;
        debug!(len = payload.len(), "payload sent");
        Ok(())
    }

    /// Validate, encode, and transmit one command with its terminator.
    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        self.scratch.clear();
        encode_command(command, &mut self.scratch)?;

        let descriptor = command.descriptor();
        debug!(
            command = descriptor.name,
            len = self.scratch.len(),
            "sending command"
        );
        if descriptor.byte_safe {
            self.channel.send_bytes_safe(&self.scratch)?;
        } else {
            self.channel.send_bytes(&self.scratch)?;
        }
        self.channel.send_terminator()?;
        Ok(())
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn channel(&self) -> &SerialChannel<H> {
        &self.channel
    }
}

impl<H, D> std::fmt::Debug for AtDriver<H, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtDriver")
            .field("channel", &self.channel)
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use espat_command::{Encryption, ValidationError};
    use espat_transport::{SimUart, SoftInterruptController};

    use super::*;
    use crate::error::DriverError;

    /// Records each delay together with how many bytes had been
    /// transmitted when it started.
    struct RecordingDelay {
        uart: Arc<SimUart>,
        log: Vec<(Duration, usize)>,
    }

    impl Delay for RecordingDelay {
        fn delay(&mut self, duration: Duration) {
            self.log.push((duration, self.uart.transmitted_len()));
        }
    }

    fn driver() -> (Arc<SimUart>, AtDriver<SimUart, RecordingDelay>) {
        let mut intc = SoftInterruptController::new();
        let uart = Arc::new(SimUart::new());
        let channel = SerialChannel::initialize(Arc::clone(&uart), 0, &mut intc, 1, |_: &[u8]| {})
            .expect("init should succeed");
        let delay = RecordingDelay {
            uart: Arc::clone(&uart),
            log: Vec::new(),
        };
        (uart, AtDriver::new(channel, delay))
    }

    #[test]
    fn every_wifi_mode_is_one_line() {
        let (uart, mut driver) = driver();
        for raw in 0u8..=3 {
            let mode = WifiMode::try_from(raw).unwrap();
            driver.set_wifi_mode(mode).unwrap();
            assert_eq!(uart.take_transmitted(), format!("AT+CWMODE={raw}\r\n").as_bytes());
        }
    }

    #[test]
    fn join_ap_wire_bytes() {
        let (uart, mut driver) = driver();
        driver.join_ap("MyNet", "pass1234", None).unwrap();
        assert_eq!(uart.transmitted_text(), "AT+CWJAP=\"MyNet\",\"pass1234\"\r\n");
    }

    #[test]
    fn short_commands_use_one_call_plus_terminator() {
        let (uart, mut driver) = driver();
        driver.check_version().unwrap();
        assert_eq!(uart.send_calls(), vec![6, 2]);
    }

    #[test]
    fn version_and_status_are_repeatable() {
        let (uart, mut driver) = driver();
        driver.check_version().unwrap();
        let first = uart.take_transmitted();
        driver.check_version().unwrap();
        assert_eq!(uart.take_transmitted(), first);

        driver.connection_status().unwrap();
        let first = uart.take_transmitted();
        driver.connection_status().unwrap();
        assert_eq!(uart.take_transmitted(), first);
        assert_eq!(first, b"AT+CIPSTATUS\r\n");
    }

    #[test]
    fn session_settles_after_command() {
        let (uart, mut driver) = driver();
        driver
            .establish_session(&SessionParams::tcp("192.168.1.101", 5005, 10))
            .unwrap();

        let expected = "AT+CIPSTART=\"TCP\",\"192.168.1.101\",5005,10\r\n";
        assert_eq!(uart.transmitted_text(), expected);
        assert!(uart.send_calls()[..expected.len() - 2].iter().all(|&n| n == 1));
        assert_eq!(
            driver.delay.log,
            vec![(Duration::from_secs(10), expected.len())]
        );
        assert_eq!(
            driver.session(),
            &SessionState::Opened {
                host: "192.168.1.101".into(),
                port: 5005
            }
        );
    }

    #[test]
    fn payload_follows_prompt_delay() {
        let (uart, mut driver) = driver();
        driver.send_payload(b"hello").unwrap();

        let header = b"AT+CIPSEND=5\r\n";
        let mut expected = header.to_vec();
        expected.extend_from_slice(b"hello");
        assert_eq!(uart.transmitted(), expected);
        assert_eq!(
            driver.delay.log,
            vec![(Duration::from_millis(100), header.len())]
        );
        assert_eq!(&uart.send_calls()[header.len() - 2..], &[2, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn invalid_payload_length_sends_nothing() {
        let (uart, mut driver) = driver();
        let err = driver.send_payload(b"").unwrap_err();
        assert!(matches!(err, DriverError::Validation(_)));

        let err = driver.send_payload(&vec![0u8; 2049]).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert!(uart.transmitted().is_empty());
        assert!(driver.delay.log.is_empty());
    }

    #[test]
    fn softap_password_bounds_send_nothing() {
        let (uart, mut driver) = driver();
        let long = "x".repeat(65);
        for password in ["short", long.as_str()] {
            let config = SoftApConfig::new("esp", password, 6, Encryption::Wpa2Psk);
            assert!(driver.set_soft_ap(&config).is_err());
        }
        assert!(uart.transmitted().is_empty());
    }

    #[test]
    fn open_softap_sends_empty_password() {
        let (uart, mut driver) = driver();
        let config = SoftApConfig::new("esp", "anything", 6, Encryption::Open);
        driver.set_soft_ap(&config).unwrap();
        assert_eq!(uart.transmitted_text(), "AT+CWSAP=\"esp\",\"\",6,0\r\n");
    }

    #[test]
    fn transport_failure_surfaces() {
        let (uart, mut driver) = driver();
        uart.fail_sends(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(
            driver.reset(),
            Err(DriverError::Transport(_))
        ));
    }

    #[test]
    fn reset_clears_session_and_waits_on_request() {
        let (_uart, mut driver) = driver();
        driver
            .establish_session(&SessionParams::tcp("10.0.0.1", 80, 0))
            .unwrap();
        driver.reset().unwrap();
        assert_eq!(driver.session(), &SessionState::Idle);
        assert_eq!(driver.delay.log.len(), 1);

        driver.reset_and_wait().unwrap();
        assert_eq!(driver.delay.log.last().unwrap().0, Duration::from_secs(6));
    }

    #[test]
    fn remaining_operations_encode() {
        let (uart, mut driver) = driver();
        driver.enter_deep_sleep(2000).unwrap();
        driver.get_wifi_mode().unwrap();
        driver.get_current_ap().unwrap();
        driver.list_aps(Some("lab")).unwrap();
        driver.set_dhcp(true, DhcpMode::Station).unwrap();
        driver.get_dhcp().unwrap();
        driver.get_soft_ap().unwrap();
        driver.list_soft_ap_clients().unwrap();
        assert_eq!(
            uart.transmitted_text(),
            "AT+GSLP=2000\r\nAT+CWMODE=?\r\nAT+CWJAP?\r\nAT+CWLAP=\"lab\"\r\n\
             AT+CWDHCP=1,1\r\nAT+CWDHCP?\r\nAT+CWSAP?\r\nAT+CWLIF\r\n"
        );
    }
}
