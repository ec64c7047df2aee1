//! Software pins for tests and bench runs without hardware.
//!
//! [`EmulatedPins`] watches the clock pin. On every rising edge it records the direction and
//! level of TMS/SWDIO and the level of TDI, then counts the cycle. On every falling edge it
//! presents the next bit of the programmed TDO and SWDIO input streams, so the probe samples
//! them during the low phase exactly like it would sample a real target.
//!
//! All bit streams are packed LSB first: bit `n % 8` of byte `n / 8` belongs to cycle `n`.
use std::io;

use crate::{Pin, PinMode, Pins};

/// Cycles beyond this count are still counted but no longer recorded.
pub const MAX_TRACE_CYCLES: usize = 8192;

/// What the probe did on the wire since the last [`EmulatedPins::reset_trace`].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct EmulatorTrace {
    clock_cycles: usize,
    tms_swdio_dir: Vec<u8>,
    tms_swdio_out: Vec<u8>,
    tdi_out: Vec<u8>,
}

impl EmulatorTrace {
    pub fn clock_cycles(&self) -> usize {
        self.clock_cycles
    }

    /// Direction of TMS/SWDIO per cycle, `1` while the probe was not driving it.
    pub fn tms_swdio_dir(&self) -> &[u8] {
        &self.tms_swdio_dir
    }

    pub fn tms_swdio_out(&self) -> &[u8] {
        &self.tms_swdio_out
    }

    pub fn tdi_out(&self) -> &[u8] {
        &self.tdi_out
    }

    fn record(&mut self, swdio_input: bool, swdio: bool, tdi: bool) {
        let cycle = self.clock_cycles;
        self.clock_cycles += 1;
        if cycle >= MAX_TRACE_CYCLES {
            return;
        }
        if cycle % 8 == 0 {
            self.tms_swdio_dir.push(0);
            self.tms_swdio_out.push(0);
            self.tdi_out.push(0);
        }
        let (byte, bit) = (cycle / 8, cycle % 8);
        self.tms_swdio_dir[byte] |= u8::from(swdio_input) << bit;
        self.tms_swdio_out[byte] |= u8::from(swdio) << bit;
        self.tdi_out[byte] |= u8::from(tdi) << bit;
    }
}

#[derive(Debug, Clone, Copy)]
struct PinState {
    mode: PinMode,
    latch: bool,
    input: bool,
}

impl Default for PinState {
    fn default() -> Self {
        PinState {
            mode: PinMode::INPUT,
            latch: false,
            input: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmulatedPins {
    pins: [PinState; Pin::ALL.len()],
    tdo_in: Vec<u8>,
    swdio_in: Vec<u8>,
    trace: EmulatorTrace,
}

impl Default for EmulatedPins {
    fn default() -> Self {
        EmulatedPins::new()
    }
}

fn stream_bit(stream: &[u8], cycle: usize) -> bool {
    stream
        .get(cycle / 8)
        .is_some_and(|byte| (byte >> (cycle % 8)) & 1 == 1)
}

impl EmulatedPins {
    /// All pins start as inputs. The target reference voltage reads high.
    pub fn new() -> EmulatedPins {
        let mut pins = [PinState::default(); Pin::ALL.len()];
        pins[Pin::Vtref.index()].input = true;
        EmulatedPins {
            pins,
            tdo_in: Vec::new(),
            swdio_in: Vec::new(),
            trace: EmulatorTrace::default(),
        }
    }

    /// Level seen on `pin` while it is an input.
    pub fn set_input(&mut self, pin: Pin, level: bool) {
        self.pins[pin.index()].input = level;
    }

    pub fn set_vtref(&mut self, level: bool) {
        self.set_input(Pin::Vtref, level);
    }

    /// Bits presented on TDO, one per cycle counted from the last trace reset.
    pub fn set_tdo_input(&mut self, stream: &[u8]) {
        self.tdo_in = stream.to_vec();
    }

    /// Bits presented on SWDIO during cycles in which the probe is not driving it.
    pub fn set_swdio_input(&mut self, stream: &[u8]) {
        self.swdio_in = stream.to_vec();
    }

    /// Clears the recorded trace and the input streams.
    pub fn reset_trace(&mut self) {
        self.trace = EmulatorTrace::default();
        self.tdo_in.clear();
        self.swdio_in.clear();
    }

    pub fn trace(&self) -> &EmulatorTrace {
        &self.trace
    }

    pub fn mode(&self, pin: Pin) -> PinMode {
        self.pins[pin.index()].mode
    }

    /// Level currently seen on `pin`, as [`Pins::get`] would report it.
    pub fn level(&self, pin: Pin) -> bool {
        let state = &self.pins[pin.index()];
        if state.mode.is_output() {
            state.latch
        } else {
            state.input
        }
    }

    fn rising_edge(&mut self) {
        let swdio_input = !self.mode(Pin::TmsSwdio).is_output();
        let swdio = self.level(Pin::TmsSwdio);
        let tdi = self.level(Pin::Tdi);
        self.trace.record(swdio_input, swdio, tdi);
    }

    fn falling_edge(&mut self) {
        let cycle = self.trace.clock_cycles;
        let tdo = stream_bit(&self.tdo_in, cycle);
        self.set_input(Pin::Tdo, tdo);
        if !self.mode(Pin::TmsSwdio).is_output() {
            let swdio = stream_bit(&self.swdio_in, cycle);
            self.set_input(Pin::TmsSwdio, swdio);
        }
    }
}

impl Pins for EmulatedPins {
    fn set(&mut self, pin: Pin, level: bool) {
        let state = &mut self.pins[pin.index()];
        let edge = state.mode.is_output() && state.latch != level;
        state.latch = level;
        if pin == Pin::TckSwclk && edge {
            if level {
                self.rising_edge();
            } else {
                self.falling_edge();
            }
        }
    }

    fn get(&mut self, pin: Pin) -> bool {
        self.level(pin)
    }

    fn set_mode(&mut self, pin: Pin, mode: PinMode) -> io::Result<()> {
        let state = &mut self.pins[pin.index()];
        state.mode = mode;
        if let PinMode::Output { level, .. } = mode {
            state.latch = level;
        }
        Ok(())
    }
}
