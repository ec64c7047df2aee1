//! SWD packets: 8-bit request, turnaround, 3-bit acknowledge and an optional 32-bit data phase
//! with even parity.
use dap_protocol::{TransferRequest, ack};

use crate::{Pin, PinMode, Pins, bits::BitEngine, error::PinError, state::SwdConfig};

/// Parity bit that makes the number of set bits in `value` even.
pub fn parity(value: u32) -> bool {
    value.count_ones() % 2 == 1
}

pub struct Swd<'a, P> {
    bits: &'a mut BitEngine<P>,
    config: SwdConfig,
}

impl<'a, P: Pins> Swd<'a, P> {
    pub fn new(bits: &'a mut BitEngine<P>, config: SwdConfig) -> Swd<'a, P> {
        Swd { bits, config }
    }

    /// Releases SWDIO to the target.
    pub fn release(&mut self) -> Result<(), PinError> {
        self.bits.set_mode(Pin::TmsSwdio, PinMode::INPUT)
    }

    /// Takes SWDIO back at the level it was last driven to.
    pub fn drive(&mut self) -> Result<(), PinError> {
        let level = self.bits.latch(Pin::TmsSwdio);
        self.bits.set_mode(Pin::TmsSwdio, PinMode::output(level))
    }

    pub fn write_cycle(&mut self, bit: bool) {
        self.bits.write_cycle(Pin::TmsSwdio, bit);
    }

    pub fn read_cycle(&mut self) -> bool {
        self.bits.read_cycle(Pin::TmsSwdio)
    }

    fn turnaround(&mut self) {
        self.bits
            .clock_cycles(usize::from(self.config.turnaround_cycles));
    }

    /// Writes `count` bits of `value`, LSB first. SWDIO must be driven.
    pub fn write_bits(&mut self, mut value: u8, count: u8) {
        for _ in 0..count.min(8) {
            self.write_cycle(value & 1 != 0);
            value >>= 1;
        }
    }

    /// Reads `count` bits, LSB first. SWDIO must be released.
    pub fn read_bits(&mut self, count: u8) -> u8 {
        let mut value = 0u8;
        for i in 0..count.min(8) {
            value |= u8::from(self.read_cycle()) << i;
        }
        value
    }

    /// One complete packet. Returns the acknowledge, or [`ack::ERROR`] for a read whose parity
    /// does not match. Read data is stored in `data`.
    pub fn transfer(
        &mut self,
        request: TransferRequest,
        data: &mut u32,
        idle_cycles: u8,
    ) -> Result<u8, PinError> {
        let header = [request.is_ap(), request.is_read(), request.a2(), request.a3()];
        let header_parity = header.iter().filter(|bit| **bit).count() % 2 == 1;

        self.write_cycle(true);
        for bit in header {
            self.write_cycle(bit);
        }
        self.write_cycle(header_parity);
        // stop, park
        self.write_cycle(false);
        self.write_cycle(true);

        self.release()?;
        self.turnaround();

        let mut response = 0u8;
        for i in 0..3 {
            response |= u8::from(self.read_cycle()) << i;
        }

        match response {
            ack::OK => {
                if request.is_read() {
                    let mut value = 0u32;
                    for i in 0..32 {
                        value |= u32::from(self.read_cycle()) << i;
                    }
                    if self.read_cycle() != parity(value) {
                        response = ack::ERROR;
                    }
                    *data = value;
                    self.turnaround();
                    self.drive()?;
                } else {
                    self.turnaround();
                    self.drive()?;
                    let mut value = *data;
                    for _ in 0..32 {
                        self.write_cycle(value & 1 != 0);
                        value >>= 1;
                    }
                    self.write_cycle(parity(*data));
                }
                for _ in 0..idle_cycles {
                    self.write_cycle(false);
                }
            }
            ack::WAIT | ack::FAULT => {
                if self.config.data_phase && request.is_read() {
                    self.bits.clock_cycles(33);
                }
                self.turnaround();
                self.drive()?;
                if self.config.data_phase && !request.is_read() {
                    self.bits.set(Pin::TmsSwdio, false);
                    self.bits.clock_cycles(33);
                }
            }
            _ => {
                self.bits
                    .clock_cycles(usize::from(self.config.turnaround_cycles) + 33);
                self.drive()?;
            }
        }
        self.bits.set(Pin::TmsSwdio, true);
        Ok(response)
    }
}
