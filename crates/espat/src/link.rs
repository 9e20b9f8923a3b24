use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use espat_driver::{AtDriver, DriverConfig, Emulator, ThreadDelay};
use espat_transport::{
    response_channel, HostUart, Responses, SerialChannel, SimUart, SoftInterruptController,
    TracingSink, TransportConfig, UartHardware, DEFAULT_BAUD,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exit::{init_error, io_error, transport_error, CliError, CliResult, USAGE};

/// Device name selecting the built-in emulated co-processor.
pub const SIM_DEVICE: &str = "sim";

const UART_IRQ: u32 = 1;

pub type CliDriver = AtDriver<DeviceUart, ThreadDelay>;

/// Contents of the optional JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub device: Option<String>,
    pub device_id: Option<u32>,
    pub baud: Option<u32>,
    pub transport: TransportConfig,
    pub driver: Option<DriverConfig>,
}

impl FileConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        serde_json::from_str(&text).map_err(|err| {
            CliError::new(
                USAGE,
                format!("invalid config file {}: {err}", path.display()),
            )
        })
    }
}

/// Effective link settings after merging file config and flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSettings {
    pub device: String,
    pub device_id: u32,
    pub baud: u32,
    pub config_file: Option<PathBuf>,
    pub transport: TransportConfig,
    pub driver: DriverConfig,
}

impl LinkSettings {
    /// Flags win over the config file. Without either, the emulator is
    /// used. The emulator gets zero settle delays unless the file sets them.
    pub fn resolve(
        device: Option<String>,
        device_id: Option<u32>,
        baud: Option<u32>,
        config_file: Option<PathBuf>,
    ) -> CliResult<Self> {
        let file = match &config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let device = device
            .or(file.device)
            .unwrap_or_else(|| SIM_DEVICE.to_string());
        let driver = file.driver.unwrap_or_else(|| {
            if device == SIM_DEVICE {
                DriverConfig::immediate()
            } else {
                DriverConfig::default()
            }
        });

        Ok(Self {
            device_id: device_id.or(file.device_id).unwrap_or(0),
            baud: baud.or(file.baud).unwrap_or(DEFAULT_BAUD),
            device,
            config_file,
            transport: file.transport,
            driver,
        })
    }

    pub fn is_simulated(&self) -> bool {
        self.device == SIM_DEVICE
    }
}

/// The UART behind the CLI: emulated or a host device node.
pub enum DeviceUart {
    Sim(SimUart),
    Host(HostUart),
}

impl UartHardware for DeviceUart {
    fn configure(&self, device_id: u32) -> io::Result<()> {
        match self {
            DeviceUart::Sim(uart) => uart.configure(device_id),
            DeviceUart::Host(uart) => uart.configure(device_id),
        }
    }

    fn is_sending(&self) -> bool {
        match self {
            DeviceUart::Sim(uart) => uart.is_sending(),
            DeviceUart::Host(uart) => uart.is_sending(),
        }
    }

    fn send(&self, chunk: &[u8]) -> io::Result<usize> {
        match self {
            DeviceUart::Sim(uart) => uart.send(chunk),
            DeviceUart::Host(uart) => uart.send(chunk),
        }
    }

    fn is_receive_empty(&self) -> bool {
        match self {
            DeviceUart::Sim(uart) => uart.is_receive_empty(),
            DeviceUart::Host(uart) => uart.is_receive_empty(),
        }
    }

    fn recv_byte(&self) -> u8 {
        match self {
            DeviceUart::Sim(uart) => uart.recv_byte(),
            DeviceUart::Host(uart) => uart.recv_byte(),
        }
    }

    fn enable_interrupt(&self) -> io::Result<()> {
        match self {
            DeviceUart::Sim(uart) => uart.enable_interrupt(),
            DeviceUart::Host(uart) => uart.enable_interrupt(),
        }
    }
}

/// An initialized link: driver plus the stream of received bytes.
pub struct Link {
    driver: CliDriver,
    responses: Responses,
}

impl Link {
    pub fn open(settings: &LinkSettings) -> CliResult<Self> {
        let mut controller = SoftInterruptController::new();
        let line = controller.line(UART_IRQ);

        let uart = if settings.is_simulated() {
            let uart = SimUart::with_irq(line);
            uart.set_responder(Emulator::new());
            DeviceUart::Sim(uart)
        } else {
            let uart = HostUart::open(&settings.device, settings.baud, line)
                .map_err(|err| transport_error("open failed", err))?;
            DeviceUart::Host(uart)
        };

        let (sink, responses) = response_channel();
        let channel = SerialChannel::initialize(
            Arc::new(uart),
            settings.device_id,
            &mut controller,
            UART_IRQ,
            (sink, TracingSink),
        )
        .map_err(|err| init_error("link setup failed", err))?
        .with_config(settings.transport.clone());

        debug!(device = %settings.device, baud = settings.baud, "link open");
        Ok(Self {
            driver: AtDriver::with_config(channel, ThreadDelay, settings.driver.clone()),
            responses,
        })
    }

    pub fn driver(&mut self) -> &mut CliDriver {
        &mut self.driver
    }

    pub fn responses(&self) -> &Responses {
        &self.responses
    }

    /// Everything received so far, plus whatever arrives within `listen`.
    pub fn collect(&self, listen: Option<Duration>) -> Vec<u8> {
        let mut received = self.responses.drain_now();
        if let Some(listen) = listen {
            let deadline = Instant::now() + listen;
            while let Some(left) = deadline.checked_duration_since(Instant::now()) {
                match self.responses.recv_timeout(left) {
                    Some(chunk) => received.extend_from_slice(&chunk),
                    None => break,
                }
            }
        }
        received
    }
}
