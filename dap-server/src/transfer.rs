//! DP/AP register accesses on top of the JTAG and SWD engines.
//!
//! On JTAG, and for AP registers on SWD, the data of a read only arrives with the following
//! access. Reads of that kind are posted: the engine issues the next access (or a trailing read
//! of DP RDBUFF) and then appends the data of the previous read to the response.
use dap_protocol::{Port, TransferRequest, ack};

use crate::{
    Pins,
    bits::BitEngine,
    buffer::RingBuffer,
    error::{CommandError, PinError},
    jtag::{Jtag, ir},
    state::DriverState,
    swd::Swd,
};

pub struct Transfer<'a, P> {
    bits: &'a mut BitEngine<P>,
    state: &'a mut DriverState,
    /// Last instruction loaded by this command
    last_ir: Option<u32>,
}

impl<'a, P: Pins> Transfer<'a, P> {
    pub fn new(bits: &'a mut BitEngine<P>, state: &'a mut DriverState) -> Transfer<'a, P> {
        Transfer {
            bits,
            state,
            last_ir: None,
        }
    }

    /// Selects the JTAG device addressed by a transfer command.
    /// Fails when the port is disabled or the index is outside the scan chain.
    pub fn select_target(&mut self, index: u8) -> bool {
        match self.state.port {
            Port::Disabled => false,
            Port::Swd => true,
            Port::Jtag => self.state.jtag.select(index),
        }
    }

    /// Loads `instruction` unless it is already loaded. No-op on SWD.
    pub fn select_ir(&mut self, instruction: u32) {
        if self.last_ir != Some(instruction) {
            self.reload_ir(instruction);
        }
    }

    /// Loads `instruction` regardless of what was loaded before. No-op on SWD.
    pub fn reload_ir(&mut self, instruction: u32) {
        if self.state.port == Port::Jtag {
            Jtag::new(&mut *self.bits, &self.state.jtag).set_ir(instruction);
            self.last_ir = Some(instruction);
        }
    }

    fn access_port_ir(request: TransferRequest) -> u32 {
        if request.is_ap() { ir::APACC } else { ir::DPACC }
    }

    /// Whether the data of `request` only arrives with the next access.
    fn posts_reads(&self, request: TransferRequest) -> bool {
        self.state.port == Port::Jtag || request.is_ap()
    }

    /// One register access, repeated while the target answers WAIT.
    pub fn transfer(&mut self, request: TransferRequest, data: &mut u32) -> Result<u8, PinError> {
        let idle_cycles = self.state.transfer.idle_cycles;
        let mut response = ack::FAULT;
        for _ in 0..=self.state.transfer.wait_retries {
            response = match self.state.port {
                Port::Disabled => return Ok(ack::FAULT),
                Port::Jtag => {
                    Jtag::new(&mut *self.bits, &self.state.jtag).transfer(request, data, idle_cycles)
                }
                Port::Swd => {
                    Swd::new(&mut *self.bits, self.state.swd).transfer(request, data, idle_cycles)?
                }
            };
            if response != ack::WAIT {
                break;
            }
        }
        Ok(response)
    }

    /// Writes `value` into the DP ABORT register.
    pub fn write_abort(&mut self, mut value: u32) -> Result<u8, PinError> {
        self.reload_ir(ir::ABORT);
        self.transfer(TransferRequest::ABORT_WRITE, &mut value)
    }

    /// Runs the requests of a transfer command.
    ///
    /// Writes `count, ack, data*` to `response`. Requests after the first failing one are
    /// consumed from `request` without being executed.
    pub fn execute_sequence(
        &mut self,
        request: &mut RingBuffer,
        response: &mut RingBuffer,
    ) -> Result<(), CommandError> {
        let count_slot = response.reserve(1)?;
        let ack_slot = response.reserve(1)?;

        let index = request.take_u8()?;
        let mut remaining = request.take_u8()?;
        log::debug!("Transfer: index={}, count={}", index, remaining);

        let mut completed = 0u8;
        let mut response_ack = 0u8;
        let mut read_pending = false;
        let mut ack_pending = false;

        if self.select_target(index) {
            while remaining > 0 {
                let transfer = TransferRequest::new(request.take_u8()?);
                let value = if transfer.carries_data() {
                    request.take_le32()?
                } else {
                    0
                };
                remaining -= 1;

                if read_pending {
                    self.select_ir(ir::DPACC);
                    let mut posted = 0;
                    response_ack = self.transfer(TransferRequest::RDBUFF_READ, &mut posted)?;
                    read_pending = false;
                    if response_ack != ack::OK {
                        break;
                    }
                    response.put_le32(posted)?;
                }

                if transfer.is_read() {
                    self.select_ir(Self::access_port_ir(transfer));
                    let mut data = 0;
                    if transfer.has_match_value() {
                        if self.posts_reads(transfer) {
                            response_ack = self.transfer(transfer, &mut data)?;
                            if response_ack != ack::OK {
                                break;
                            }
                        }
                        let mask = self.state.transfer.match_mask;
                        for _ in 0..=self.state.transfer.match_retries {
                            response_ack = self.transfer(transfer, &mut data)?;
                            if response_ack != ack::OK || data & mask == value {
                                break;
                            }
                        }
                        if data & mask != value {
                            response_ack |= ack::MISMATCH;
                        }
                        if response_ack != ack::OK {
                            break;
                        }
                    } else {
                        response_ack = self.transfer(transfer, &mut data)?;
                        if response_ack != ack::OK {
                            break;
                        }
                        if self.posts_reads(transfer) {
                            read_pending = true;
                        } else {
                            response.put_le32(data)?;
                        }
                    }
                    ack_pending = false;
                } else if transfer.has_match_mask() {
                    self.state.transfer.match_mask = value;
                    response_ack = ack::OK;
                } else {
                    self.select_ir(Self::access_port_ir(transfer));
                    let mut data = value;
                    response_ack = self.transfer(transfer, &mut data)?;
                    if response_ack != ack::OK {
                        break;
                    }
                    ack_pending = true;
                }
                completed += 1;
            }
        }

        for _ in 0..remaining {
            let transfer = TransferRequest::new(request.take_u8()?);
            if transfer.carries_data() {
                request.skip(4)?;
            }
        }

        if response_ack == ack::OK && (read_pending || ack_pending) {
            self.select_ir(ir::DPACC);
            let mut data = 0;
            response_ack = self.transfer(TransferRequest::RDBUFF_READ, &mut data)?;
            if response_ack == ack::OK && read_pending {
                response.put_le32(data)?;
            }
        }

        log::debug!("Transfer completed {} with ack 0x{:02x}", completed, response_ack);
        response.patch(count_slot, &[completed]);
        response.patch(ack_slot, &[response_ack]);
        Ok(())
    }

    /// Runs a transfer block command.
    ///
    /// Writes `count:u16, ack, data*` to `response`. Unused write words are consumed.
    pub fn execute_block(
        &mut self,
        request: &mut RingBuffer,
        response: &mut RingBuffer,
    ) -> Result<(), CommandError> {
        let count_slot = response.reserve(2)?;
        let ack_slot = response.reserve(1)?;

        let index = request.take_u8()?;
        let mut remaining = request.take_le16()?;
        let transfer = TransferRequest::new(request.take_u8()?);
        log::debug!(
            "TransferBlock: index={}, count={}, request=0x{:02x}",
            index,
            remaining,
            transfer.bits()
        );

        let mut completed = 0u16;
        let mut response_ack = 0u8;
        if self.select_target(index) {
            self.reload_ir(Self::access_port_ir(transfer));
            response_ack = if transfer.is_read() {
                self.read_block(transfer, &mut remaining, &mut completed, response)?
            } else {
                self.write_block(transfer, &mut remaining, &mut completed, request)?
            };
        }

        if !transfer.is_read() && remaining > 0 {
            request.skip(usize::from(remaining) * 4)?;
        }

        response.patch(count_slot, &completed.to_le_bytes());
        response.patch(ack_slot, &[response_ack]);
        Ok(())
    }

    fn read_block(
        &mut self,
        transfer: TransferRequest,
        remaining: &mut u16,
        completed: &mut u16,
        response: &mut RingBuffer,
    ) -> Result<u8, CommandError> {
        let posted = self.posts_reads(transfer);
        let mut data = 0;
        let mut response_ack = 0;
        if posted {
            response_ack = self.transfer(transfer, &mut data)?;
            if response_ack != ack::OK {
                return Ok(response_ack);
            }
        }
        while *remaining > 0 {
            *remaining -= 1;
            let mut current = transfer;
            if *remaining == 0 && posted {
                self.select_ir(ir::DPACC);
                current = TransferRequest::RDBUFF_READ;
            }
            response_ack = self.transfer(current, &mut data)?;
            if response_ack != ack::OK {
                return Ok(response_ack);
            }
            response.put_le32(data)?;
            *completed += 1;
        }
        Ok(response_ack)
    }

    fn write_block(
        &mut self,
        transfer: TransferRequest,
        remaining: &mut u16,
        completed: &mut u16,
        request: &mut RingBuffer,
    ) -> Result<u8, CommandError> {
        while *remaining > 0 {
            *remaining -= 1;
            let mut data = request.take_le32()?;
            let response_ack = self.transfer(transfer, &mut data)?;
            if response_ack != ack::OK {
                return Ok(response_ack);
            }
            *completed += 1;
        }
        self.select_ir(ir::DPACC);
        let mut data = 0;
        Ok(self.transfer(TransferRequest::RDBUFF_READ, &mut data)?)
    }
}
