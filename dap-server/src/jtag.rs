//! JTAG scans over a chain of up to four devices.
//!
//! Every scan starts and ends in Run-Test/Idle. Devices other than the selected one are kept in
//! BYPASS, so each of them adds its IR length to IR scans and a single bit to DR scans.
use dap_protocol::{TransferRequest, ack};

use crate::{Pin, Pins, bits::BitEngine, state::JtagChain};

/// Instructions of the ARM JTAG debug port.
pub mod ir {
    pub const ABORT: u32 = 0x08;
    pub const DPACC: u32 = 0x0a;
    pub const APACC: u32 = 0x0b;
    pub const IDCODE: u32 = 0x0e;
}

pub struct Jtag<'a, P> {
    bits: &'a mut BitEngine<P>,
    chain: &'a JtagChain,
}

impl<'a, P: Pins> Jtag<'a, P> {
    pub fn new(bits: &'a mut BitEngine<P>, chain: &'a JtagChain) -> Jtag<'a, P> {
        Jtag { bits, chain }
    }

    fn tms(&mut self, level: bool) {
        self.bits.set(Pin::TmsSwdio, level);
    }

    fn tck_cycles(&mut self, count: usize) {
        self.bits.clock_cycles(count);
    }

    fn tdi_cycle(&mut self, bit: bool) {
        self.bits.write_cycle(Pin::Tdi, bit);
    }

    fn tdo_cycle(&mut self) -> bool {
        self.bits.read_cycle(Pin::Tdo)
    }

    fn tdio_cycle(&mut self, bit: bool) -> bool {
        self.bits.read_write_cycle(Pin::Tdi, Pin::Tdo, bit)
    }

    fn index(&self) -> usize {
        usize::from(self.chain.index)
    }

    /// Loads `ir` into the selected device and BYPASS into all others.
    pub fn set_ir(&mut self, mut ir: u32) {
        let index = self.index();
        let before = usize::from(self.chain.ir_before[index]);
        let length = usize::from(self.chain.ir_length[index]);
        let after = usize::from(self.chain.ir_after[index]);

        // Select-DR-Scan, Select-IR-Scan
        self.tms(true);
        self.tck_cycles(2);
        // Capture-IR, Shift-IR
        self.tms(false);
        self.tck_cycles(2);

        self.bits.set(Pin::Tdi, true);
        self.tck_cycles(before);
        for _ in 0..length.saturating_sub(1) {
            self.tdi_cycle(ir & 1 != 0);
            ir >>= 1;
        }
        if after == 0 {
            self.tms(true);
            self.tdi_cycle(ir & 1 != 0);
        } else {
            self.tdi_cycle(ir & 1 != 0);
            self.bits.set(Pin::Tdi, true);
            self.tck_cycles(after - 1);
            self.tms(true);
            self.tck_cycles(1);
        }

        self.update_and_idle();
    }

    /// Moves from Idle to Shift-DR and skips the devices in front of the target.
    fn enter_shift_dr(&mut self) {
        self.tms(true);
        self.tck_cycles(1);
        self.tms(false);
        self.tck_cycles(2);
        self.tck_cycles(self.index());
    }

    /// Update-DR / Update-IR followed by one cycle in Idle.
    fn update_and_idle(&mut self) {
        self.tck_cycles(1);
        self.tms(false);
        self.tck_cycles(1);
        self.bits.set(Pin::Tdi, true);
    }

    /// Reads the 32-bit IDCODE of the selected device. The IR must hold [`ir::IDCODE`].
    pub fn read_idcode(&mut self) -> u32 {
        self.enter_shift_dr();
        let mut idcode = 0u32;
        for i in 0..31 {
            idcode |= u32::from(self.tdo_cycle()) << i;
        }
        self.tms(true);
        idcode |= u32::from(self.tdo_cycle()) << 31;
        self.update_and_idle();
        idcode
    }

    /// One DPACC/APACC access. The IR must already select the right access port.
    ///
    /// Returns the acknowledge translated to the DAP encoding. Read data is stored in `data`.
    pub fn transfer(&mut self, request: TransferRequest, data: &mut u32, idle_cycles: u8) -> u8 {
        self.enter_shift_dr();

        // JTAG OK/FAULT is 0b010 and WAIT is 0b001, the DAP encoding swaps the two low bits.
        let mut response = 0u8;
        response |= u8::from(self.tdio_cycle(request.is_read())) << 1;
        response |= u8::from(self.tdio_cycle(request.a2()));
        response |= u8::from(self.tdio_cycle(request.a3())) << 2;

        if response != ack::OK {
            // Exit1-DR
            self.tms(true);
            self.tck_cycles(1);
        } else {
            let after = usize::from(self.chain.devices_after());
            if request.is_read() {
                let mut value = 0u32;
                for i in 0..31 {
                    value |= u32::from(self.tdo_cycle()) << i;
                }
                if after > 0 {
                    value |= u32::from(self.tdo_cycle()) << 31;
                    self.tck_cycles(after - 1);
                    self.tms(true);
                    self.tck_cycles(1);
                } else {
                    self.tms(true);
                    value |= u32::from(self.tdo_cycle()) << 31;
                }
                *data = value;
            } else {
                let mut value = *data;
                for _ in 0..31 {
                    self.tdi_cycle(value & 1 != 0);
                    value >>= 1;
                }
                if after > 0 {
                    self.tdi_cycle(value & 1 != 0);
                    self.tck_cycles(after - 1);
                    self.tms(true);
                    self.tck_cycles(1);
                } else {
                    self.tms(true);
                    self.tdi_cycle(value & 1 != 0);
                }
            }
        }

        self.update_and_idle();
        self.tck_cycles(usize::from(idle_cycles));
        response
    }

    /// Clocks up to 8 cycles with a fixed TMS level and returns the captured TDO bits,
    /// LSB first.
    pub fn sequence(&mut self, tms: bool, mut tdi: u8, cycles: u8) -> u8 {
        self.tms(tms);
        let mut tdo = 0u8;
        for i in 0..cycles.min(8) {
            tdo |= u8::from(self.tdio_cycle(tdi & 1 != 0)) << i;
            tdi >>= 1;
        }
        tdo
    }
}
