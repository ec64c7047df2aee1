use dap_protocol::Status;

use crate::{Pins, dap::Dap, error::CommandError, transfer::Transfer};

pub(super) fn configure<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let idle_cycles = dap.request.take_u8()?;
    let wait_retries = dap.request.take_le16()?;
    let match_retries = dap.request.take_le16()?;
    let limit = dap.config.max_retries;
    let config = &mut dap.state.transfer;
    config.idle_cycles = idle_cycles;
    config.wait_retries = wait_retries.min(limit);
    config.match_retries = match_retries.min(limit);
    log::debug!(
        "Transfer configured: idle={}, wait={}, match={}",
        config.idle_cycles,
        config.wait_retries,
        config.match_retries
    );
    dap.response.put_u8(Status::Ok.into())?;
    Ok(())
}

pub(super) fn transfer<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    Transfer::new(&mut dap.bits, &mut dap.state)
        .execute_sequence(&mut dap.request, &mut dap.response)
}

pub(super) fn transfer_block<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    Transfer::new(&mut dap.bits, &mut dap.state)
        .execute_block(&mut dap.request, &mut dap.response)
}

/// The acknowledge of the abort write itself is not reported.
pub(super) fn write_abort<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let index = dap.request.take_u8()?;
    let value = dap.request.take_le32()?;
    let mut transfer = Transfer::new(&mut dap.bits, &mut dap.state);
    let selected = transfer.select_target(index);
    if selected {
        transfer.write_abort(value)?;
    }
    dap.response.put_u8(Status::from_ok(selected).into())?;
    Ok(())
}
