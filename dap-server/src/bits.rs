//! Clock cycle primitives shared by the JTAG and SWD engines.
//!
//! Every cycle drives the data pin (when writing), pulls the clock low, waits half a period,
//! samples the input (when reading), raises the clock and waits another half period.
use std::time::Duration;

use crate::{Pin, PinMode, Pins, error::PinError, timing};

#[derive(Debug)]
pub struct BitEngine<P> {
    pins: P,
    clock_hz: u32,
    half_period: Duration,
    /// Last level written to each output latch, one bit per [`Pin::index`]
    latches: u8,
}

impl<P: Pins> BitEngine<P> {
    pub fn new(pins: P, clock_hz: u32) -> BitEngine<P> {
        let mut engine = BitEngine {
            pins,
            clock_hz: 0,
            half_period: Duration::ZERO,
            latches: 0,
        };
        engine.set_clock(clock_hz);
        engine
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    pub fn clock(&self) -> u32 {
        self.clock_hz
    }

    /// Sets the clock rate and the derived half period together.
    pub fn set_clock(&mut self, rate_hz: u32) {
        self.clock_hz = rate_hz;
        self.half_period = Duration::from_nanos(timing::half_period_ns(rate_hz).into());
    }

    pub fn half_period(&self) -> Duration {
        self.half_period
    }

    #[inline]
    fn half_cycle(&self) {
        timing::busy_wait(self.half_period);
    }

    pub fn set(&mut self, pin: Pin, level: bool) {
        self.record_latch(pin, level);
        self.pins.set(pin, level);
    }

    /// Level last written to the output latch of `pin`, whether or not it is driven.
    pub fn latch(&self, pin: Pin) -> bool {
        self.latches & (1 << pin.index()) != 0
    }

    fn record_latch(&mut self, pin: Pin, level: bool) {
        if level {
            self.latches |= 1 << pin.index();
        } else {
            self.latches &= !(1 << pin.index());
        }
    }

    pub fn get(&mut self, pin: Pin) -> bool {
        self.pins.get(pin)
    }

    pub fn set_mode(&mut self, pin: Pin, mode: PinMode) -> Result<(), PinError> {
        if let PinMode::Output { level, .. } = mode {
            self.record_latch(pin, level);
        }
        self.pins
            .set_mode(pin, mode)
            .map_err(|e| PinError::new(pin, e))
    }

    /// One clock period without touching any data pin.
    pub fn clock_cycle(&mut self) {
        self.pins.set(Pin::TckSwclk, false);
        self.half_cycle();
        self.pins.set(Pin::TckSwclk, true);
        self.half_cycle();
    }

    pub fn clock_cycles(&mut self, count: usize) {
        for _ in 0..count {
            self.clock_cycle();
        }
    }

    pub fn write_cycle(&mut self, pin: Pin, bit: bool) {
        self.set(pin, bit);
        self.clock_cycle();
    }

    pub fn read_cycle(&mut self, pin: Pin) -> bool {
        self.pins.set(Pin::TckSwclk, false);
        self.half_cycle();
        let bit = self.pins.get(pin);
        self.pins.set(Pin::TckSwclk, true);
        self.half_cycle();
        bit
    }

    pub fn read_write_cycle(&mut self, output: Pin, input: Pin, bit: bool) -> bool {
        self.set(output, bit);
        self.read_cycle(input)
    }
}
