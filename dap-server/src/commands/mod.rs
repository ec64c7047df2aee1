//! Command handlers.
//!
//! [`execute`] echoes the command id into the response and hands the request to the handler,
//! which reads its parameters from the request buffer and appends the rest of the response.
use dap_protocol::Command;

use crate::{Pins, dap::Dap, error::CommandError};

mod general;
mod jtag;
mod swd;
mod swj;
mod swo;
mod transfer;

pub(crate) fn execute<P: Pins>(dap: &mut Dap<P>, id: u8) -> Result<(), CommandError> {
    let command = Command::try_from(id).map_err(CommandError::Unsupported)?;
    log::debug!("Processing {:?}", command);

    // an aborted transfer has no response at all
    if command != Command::TransferAbort {
        dap.response.put_u8(id)?;
    }

    match command {
        Command::Info => general::info(dap),
        Command::HostStatus => general::host_status(dap),
        Command::Connect => general::connect(dap),
        Command::Disconnect => general::disconnect(dap),
        Command::Delay => general::delay(dap),
        Command::ResetTarget => general::reset_target(dap),
        Command::TransferConfigure => transfer::configure(dap),
        Command::Transfer => transfer::transfer(dap),
        Command::TransferBlock => transfer::transfer_block(dap),
        Command::TransferAbort => Ok(()),
        Command::WriteAbort => transfer::write_abort(dap),
        Command::SwjPins => swj::pins(dap),
        Command::SwjClock => swj::clock(dap),
        Command::SwjSequence => swj::sequence(dap),
        Command::SwdConfigure => swd::configure(dap),
        Command::SwdSequence => swd::sequence(dap),
        Command::JtagSequence => jtag::sequence(dap),
        Command::JtagConfigure => jtag::configure(dap),
        Command::JtagIdcode => jtag::idcode(dap),
        Command::SwoTransport => swo::transport(dap),
        Command::SwoMode => swo::mode(dap),
        Command::SwoBaudrate => swo::baudrate(dap),
        Command::SwoControl => swo::control(dap),
        Command::SwoStatus => swo::status(dap),
        Command::SwoExtendedStatus => swo::extended_status(dap),
        Command::SwoData => swo::data(dap),
        Command::QueueCommands | Command::ExecuteCommands => Err(CommandError::Unsupported(id)),
    }
}
