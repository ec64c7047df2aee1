use dap_protocol::{Port, Status, swo_mode, swo_transport};

use crate::{Pins, dap::Dap, error::CommandError};

pub(super) fn transport<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let transport = dap.request.take_u8()?;
    // trace data is only delivered through the SWO data command
    let ok = matches!(transport, swo_transport::NONE | swo_transport::COMMAND);
    if ok {
        dap.state.swo.transport = transport;
    }
    dap.response.put_u8(Status::from_ok(ok).into())?;
    Ok(())
}

pub(super) fn mode<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let mode = dap.request.take_u8()?;
    let ok = dap.state.port == Port::Swd && mode < swo_mode::MANCHESTER;
    if ok {
        if dap.state.swo.mode == swo_mode::UART {
            dap.swo.set_capture(false);
        }
        dap.state.swo.mode = mode;
    }
    dap.response.put_u8(Status::from_ok(ok).into())?;
    Ok(())
}

/// Responds with the configured rate, or 0 if the UART rejected it.
pub(super) fn baudrate<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let baudrate = dap.request.take_le32()?;
    if dap.state.swo.mode == swo_mode::UART {
        dap.state.swo.baudrate = match dap.swo.configure_baudrate(baudrate) {
            Ok(()) => baudrate,
            Err(err) => {
                log::warn!("SWO UART rejected {} baud: {}", baudrate, err);
                0
            }
        };
    }
    dap.response.put_le32(dap.state.swo.baudrate)?;
    Ok(())
}

pub(super) fn control<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let control = dap.request.take_u8()?;
    let start = control == 1;
    let ok =
        dap.state.port == Port::Swd && (!start || dap.state.swo.mode == swo_mode::UART);
    if ok {
        dap.swo.set_capture(start);
        log::debug!("SWO capture {}", if start { "started" } else { "stopped" });
    }
    dap.response.put_u8(Status::from_ok(ok).into())?;
    Ok(())
}

pub(super) fn status<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    dap.response.put_u8(dap.swo.status())?;
    dap.response.put_le32(dap.swo.len() as u32)?;
    Ok(())
}

pub(super) fn extended_status<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let control = dap.request.take_u8()?;
    if control & 0x01 != 0 {
        dap.response.put_u8(dap.swo.status())?;
    }
    if control & 0x02 != 0 {
        dap.response.put_le32(dap.swo.len() as u32)?;
    }
    Ok(())
}

pub(super) fn data<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let max = usize::from(dap.request.take_le16()?);
    dap.response.put_u8(dap.swo.status())?;
    let count_slot = dap.response.reserve(2)?;
    // id, status and count already take four bytes of the packet
    let limit = max.min(dap.config.max_packet_size.saturating_sub(4));
    let count = dap.swo.drain_into(limit, &mut dap.response)?;
    dap.response
        .patch(count_slot, &(count as u16).to_le_bytes());
    Ok(())
}
