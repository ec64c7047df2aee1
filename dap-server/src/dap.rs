//! Request processing of the probe.
//!
//! [`Dap`] owns the pins, the probe state and the request/response buffers. A transport
//! receives a packet into [`Dap::request_space`], commits it with [`Dap::commit_request`] and,
//! unless the packet was queued, sends the bytes returned by [`Dap::process`].
use dap_protocol::{Command, Status};

use crate::{
    Pin, PinMode, Pins,
    bits::BitEngine,
    buffer::RingBuffer,
    commands,
    error::{BufferError, CommandError, PinError},
    server::Config,
    state::DriverState,
    swo::{SwoCapture, SwoSink, SwoUart},
};

pub struct Dap<P> {
    pub(crate) bits: BitEngine<P>,
    pub(crate) state: DriverState,
    pub(crate) request: RingBuffer,
    pub(crate) response: RingBuffer,
    pub(crate) swo: SwoCapture,
    pub(crate) config: Config,
    /// A packet did not fit behind the queued ones. The next answer reports the loss.
    dropped: bool,
}

impl<P: Pins> Dap<P> {
    /// Creates the probe and puts all debug pins into a safe state.
    pub fn new(pins: P, config: &Config) -> Result<Dap<P>, PinError> {
        let mut dap = Dap {
            bits: BitEngine::new(pins, config.default_clock),
            state: DriverState::default(),
            request: RingBuffer::new(config.buffer_size),
            response: RingBuffer::new(config.buffer_size),
            swo: SwoCapture::new(config.swo_buffer_size),
            config: config.clone(),
            dropped: false,
        };
        dap.bits.set_mode(Pin::Vtref, PinMode::INPUT)?;
        dap.bits.set_mode(Pin::LedConnect, PinMode::output(false))?;
        dap.bits.set_mode(Pin::LedRunning, PinMode::output(false))?;
        dap.reset()?;
        Ok(dap)
    }

    /// Returns to the state after startup: every debug pin released, default settings,
    /// no buffered data and no capture running.
    pub fn reset(&mut self) -> Result<(), PinError> {
        log::info!("Resetting probe state");
        for pin in Pin::DEBUG {
            self.bits.set_mode(pin, PinMode::INPUT)?;
        }
        self.state = DriverState::default();
        self.bits.set_clock(self.config.default_clock);
        self.bits.set(Pin::LedConnect, false);
        self.bits.set(Pin::LedRunning, false);
        self.swo.reset();
        self.request.reset();
        self.response.reset();
        self.dropped = false;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Current SWD/JTAG clock rate in Hz
    pub fn clock(&self) -> u32 {
        self.bits.clock()
    }

    pub fn pins(&self) -> &P {
        self.bits.pins()
    }

    pub fn pins_mut(&mut self) -> &mut P {
        self.bits.pins_mut()
    }

    pub fn swo_sink(&self) -> SwoSink {
        self.swo.sink()
    }

    pub fn set_swo_uart(&mut self, uart: Box<dyn SwoUart>) {
        self.swo.set_uart(uart);
    }

    /// Free space for the next request packet.
    pub fn request_space(&mut self) -> &mut [u8] {
        self.request.put_claim(self.config.max_packet_size)
    }

    /// Commits `len` bytes received into [`Dap::request_space`].
    ///
    /// Returns `false` if the packet only queues commands and must not be answered yet.
    /// A packet larger than the free space drops every queued packet and is answered with
    /// `0xff`.
    pub fn commit_request(&mut self, len: usize) -> bool {
        let start = self.request.len();
        if let Err(error) = self.request.put_finish(len) {
            self.drop_requests(len, error);
            return true;
        }
        let queued = self.request.peek(start) == Some(Command::QueueCommands.into());
        if queued {
            log::debug!("Queued {} request bytes", len);
        }
        !queued
    }

    /// Processes all committed requests and returns the response.
    ///
    /// A malformed request is answered with the single byte `0xff`. Only pin failures are
    /// returned as errors.
    pub fn process(&mut self) -> Result<&[u8], PinError> {
        self.response.reset();
        log::trace!(
            "Request: {:02x?}",
            self.request.get_claim(self.request.len())
        );
        let result = if std::mem::take(&mut self.dropped) {
            Err(CommandError::RequestOverflow)
        } else {
            self.execute_request()
        };
        self.request.reset();
        match result {
            Ok(()) => {}
            Err(CommandError::Pin(error)) => {
                self.response.reset();
                return Err(error);
            }
            Err(error) => {
                log::warn!("Request failed: {}", error);
                self.response.reset();
                self.response.put(&[Status::Error.into()]);
            }
        }
        let response = self.response.get_claim(self.response.len());
        log::trace!("Response: {:02x?}", response);
        Ok(response)
    }

    /// Runs one request packet and returns its response, or `None` if it was queued.
    ///
    /// A queued packet that does not fit is not answered either. The loss is reported with
    /// the next request instead.
    pub fn transact(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>, PinError> {
        let space = self.request_space();
        let available = space.len();
        if let Some(space) = space.get_mut(..packet.len()) {
            space.copy_from_slice(packet);
            if !self.commit_request(packet.len()) {
                return Ok(None);
            }
        } else {
            let error = BufferError::Overflow {
                needed: packet.len(),
                available,
            };
            self.drop_requests(packet.len(), error);
            if packet.first() == Some(&Command::QueueCommands.into()) {
                return Ok(None);
            }
        }
        Ok(Some(self.process()?.to_vec()))
    }

    fn drop_requests(&mut self, len: usize, error: BufferError) {
        log::error!(
            "Dropping request of {} bytes and {} queued bytes: {}",
            len,
            self.request.len(),
            error
        );
        self.request.reset();
        self.dropped = true;
    }

    fn execute_request(&mut self) -> Result<(), CommandError> {
        loop {
            let id = self.request.take_u8()?;
            let queued = id == u8::from(Command::QueueCommands);
            if queued || id == u8::from(Command::ExecuteCommands) {
                let count = self.request.take_u8()?;
                // queued batches answer like executed ones
                self.response.put_u8(Command::ExecuteCommands.into())?;
                self.response.put_u8(count)?;
                for _ in 0..count {
                    let inner = self.request.take_u8()?;
                    commands::execute(self, inner)?;
                }
                if queued {
                    continue;
                }
            } else {
                commands::execute(self, id)?;
            }
            return Ok(());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::emulator::EmulatedPins;

    fn dap() -> Dap<EmulatedPins> {
        Dap::new(EmulatedPins::new(), &Config::default()).unwrap()
    }

    #[test]
    fn reset_releases_debug_pins() {
        let dap = dap();
        for pin in Pin::DEBUG {
            assert_eq!(dap.pins().mode(pin), PinMode::INPUT);
        }
        assert!(dap.pins().mode(Pin::LedConnect).is_output());
    }

    #[test]
    fn unknown_command_is_answered_with_error() {
        let mut dap = dap();
        assert_eq!(dap.transact(&[0x0b]).unwrap(), Some(vec![0xff]));
        assert_eq!(dap.transact(&[]).unwrap(), Some(vec![0xff]));
        // the next request starts clean
        assert_eq!(dap.transact(&[0x0a]).unwrap(), Some(vec![0x0a, 0x00, 0x00]));
    }

    #[test]
    fn nested_batches_are_rejected() {
        let mut dap = dap();
        assert_eq!(
            dap.transact(&[0x7f, 0x01, 0x7f, 0x01, 0x0a]).unwrap(),
            Some(vec![0xff])
        );
    }

    #[test]
    fn packet_behind_full_queue_drops_the_queue() {
        let config = Config {
            buffer_size: 10,
            max_packet_size: 5,
            ..Config::default()
        };
        let mut dap = Dap::new(EmulatedPins::new(), &config).unwrap();
        let connect_led = [0x7e, 0x01, 0x01, 0x00, 0x01];
        assert_eq!(dap.transact(&connect_led).unwrap(), None);
        assert_eq!(dap.transact(&connect_led).unwrap(), None);
        assert_eq!(dap.transact(&[0x0a]).unwrap(), Some(vec![0xff]));
        assert!(!dap.pins().level(Pin::LedConnect));
        assert!(!dap.dropped);
        assert_eq!(dap.transact(&[0x0a]).unwrap(), Some(vec![0x0a, 0x00, 0x00]));
    }

    #[test]
    fn queued_packets_wait_for_next_request() {
        let mut dap = dap();
        assert_eq!(dap.transact(&[0x7e, 0x01, 0x0a]).unwrap(), None);
        assert_eq!(
            dap.transact(&[0x0a]).unwrap(),
            Some(vec![0x7f, 0x01, 0x0a, 0x00, 0x00, 0x0a, 0x00, 0x00])
        );
    }
}
