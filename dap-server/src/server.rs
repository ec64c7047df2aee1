use std::{
    error::Error,
    fmt::Display,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use dap_protocol::Port;

use crate::{
    Pins,
    dap::Dap,
    error::PinError,
    swo::{SwoSink, SwoUart},
    transport::{Transport, TransportError},
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Largest request and response packet
    pub max_packet_size: usize,
    /// Size of the request and response buffers. Queued requests have to fit.
    pub buffer_size: usize,
    pub swo_buffer_size: usize,
    /// SWD/JTAG clock in Hz after reset
    pub default_clock: u32,
    /// Port selected by a connect request for the default port
    pub default_port: Port,
    /// Upper bound for the WAIT and match retry counts a host may configure
    pub max_retries: u16,
    /// Single LED for connect and running state
    pub leds_combined: bool,
    pub vendor: String,
    pub product: String,
    pub serial_number: String,
    pub firmware_version: String,
    /// Wait between polls for a transport peer
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_packet_size: 512,
            buffer_size: 2048,
            swo_buffer_size: 2048,
            default_clock: 1_000_000,
            default_port: Port::Swd,
            max_retries: u16::MAX,
            leds_combined: false,
            vendor: String::new(),
            // hosts look for "CMSIS-DAP" in the product string
            product: "CMSIS-DAP".to_string(),
            serial_number: "0001".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
pub enum ServerError {
    Transport(TransportError),
    Pin(PinError),
}

impl From<TransportError> for ServerError {
    fn from(value: TransportError) -> Self {
        ServerError::Transport(value)
    }
}

impl From<PinError> for ServerError {
    fn from(value: PinError) -> Self {
        ServerError::Pin(value)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Transport(error) => write!(f, "Transport error: {}", error),
            ServerError::Pin(error) => write!(f, "{}", error),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerError::Transport(error) => Some(error),
            ServerError::Pin(error) => Some(error),
        }
    }
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use dap_server::server::Builder;
///
/// let server = Builder::new()
///     .default_clock(4_000_000)
///     .serial_number("E6614C311B")
///     .build(my_pins)?;
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the largest packet exchanged with the host. The request and response buffers
    /// grow to at least this size.
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.config.max_packet_size = size;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn swo_buffer_size(mut self, size: usize) -> Self {
        self.config.swo_buffer_size = size;
        self
    }

    pub fn default_clock(mut self, rate_hz: u32) -> Self {
        self.config.default_clock = rate_hz;
        self
    }

    pub fn default_port(mut self, port: Port) -> Self {
        self.config.default_port = port;
        self
    }

    pub fn max_retries(mut self, retries: u16) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn leds_combined(mut self, combined: bool) -> Self {
        self.config.leds_combined = combined;
        self
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.config.vendor = vendor.into();
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.config.product = product.into();
        self
    }

    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.config.serial_number = serial.into();
        self
    }

    pub fn firmware_version(mut self, version: impl Into<String>) -> Self {
        self.config.firmware_version = version.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Build and return the server
    pub fn build<P: Pins>(mut self, pins: P) -> Result<Server<P>, ServerError> {
        self.config.max_packet_size = self.config.max_packet_size.max(1);
        self.config.buffer_size = self.config.buffer_size.max(self.config.max_packet_size);
        Server::new(pins, self.config)
    }
}

pub struct Server<P: Pins> {
    dap: Dap<P>,
    transports: Vec<Box<dyn Transport>>,
    active: Option<usize>,
    config: Config,
}

impl<P: Pins> Server<P> {
    pub fn new(pins: P, config: Config) -> Result<Server<P>, ServerError> {
        Ok(Server {
            dap: Dap::new(pins, &config)?,
            transports: Vec::new(),
            active: None,
            config,
        })
    }

    pub fn add_transport(&mut self, transport: impl Transport + 'static) {
        self.transports.push(Box::new(transport));
    }

    pub fn set_swo_uart(&mut self, uart: impl SwoUart + 'static) {
        self.dap.set_swo_uart(Box::new(uart));
    }

    /// Producer handle for received SWO bytes
    pub fn swo_sink(&self) -> SwoSink {
        self.dap.swo_sink()
    }

    pub fn dap(&self) -> &Dap<P> {
        &self.dap
    }

    pub fn dap_mut(&mut self) -> &mut Dap<P> {
        &mut self.dap
    }

    /// Serves hosts until a pin failure occurs.
    pub fn run(&mut self) -> Result<(), ServerError> {
        self.run_until(&AtomicBool::new(false))
    }

    /// Serves hosts until `stop` is set. The flag is checked between requests.
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<(), ServerError> {
        for transport in &mut self.transports {
            if let Err(err) = transport.init() {
                log::error!("Transport {} init failed: {}", transport.name(), err);
                return Err(err.into());
            }
        }

        while !stop.load(Ordering::Acquire) {
            match self.active {
                Some(index) => self.exchange(index)?,
                None => {
                    if !self.select_transport() {
                        thread::sleep(self.config.poll_interval);
                    }
                }
            }
        }
        log::info!("Stopping server");
        self.dap.reset()?;
        Ok(())
    }

    fn select_transport(&mut self) -> bool {
        for (index, transport) in self.transports.iter_mut().enumerate() {
            match transport.configure() {
                Ok(()) => {
                    log::info!("Configured transport {}", transport.name());
                    self.active = Some(index);
                    return true;
                }
                Err(TransportError::Retry) => {}
                Err(err) => {
                    log::error!("Transport {} configuration failed: {}", transport.name(), err)
                }
            }
        }
        false
    }

    /// Releases the target and waits for the next peer.
    fn disconnect(&mut self) -> Result<(), ServerError> {
        self.active = None;
        self.dap.reset()?;
        Ok(())
    }

    /// Receives one request and, unless it was queued, answers it.
    fn exchange(&mut self, index: usize) -> Result<(), ServerError> {
        let transport = &mut self.transports[index];
        let len = match transport.recv(self.dap.request_space()) {
            Ok(len) => len,
            Err(TransportError::Retry) => return Ok(()),
            Err(TransportError::Shutdown) => {
                log::info!("Client disconnected from {}", transport.name());
                return self.disconnect();
            }
            Err(err) => {
                log::error!("Transport {} receive failed: {}", transport.name(), err);
                return self.disconnect();
            }
        };
        if !self.dap.commit_request(len) {
            return Ok(());
        }

        let response = self.dap.process()?;
        match transport.send(response) {
            Ok(sent) if sent < response.len() => {
                log::error!("Transport dropped {} response bytes", response.len() - sent);
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(TransportError::Shutdown) => {
                log::info!("Client disconnected from {}", transport.name());
                self.disconnect()
            }
            Err(err) => {
                log::error!("Transport {} send failed: {}", transport.name(), err);
                self.disconnect()
            }
        }
    }
}
