use dap_protocol::{MAX_JTAG_DEVICES, Port, Status};

use crate::{
    Pins,
    dap::Dap,
    error::CommandError,
    jtag::{Jtag, ir},
};

pub(super) fn sequence<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let status_slot = dap.response.reserve(1)?;
    let count = dap.request.take_u8()?;
    let enabled = dap.state.port == Port::Jtag;
    let mut jtag = Jtag::new(&mut dap.bits, &dap.state.jtag);

    for _ in 0..count {
        let info = dap.request.take_u8()?;
        let mut cycles = match info & 0x3f {
            0 => 64,
            n => n,
        };
        if !enabled {
            dap.request.skip(usize::from(cycles).div_ceil(8))?;
            continue;
        }
        let tms = info & 0x40 != 0;
        let capture = info & 0x80 != 0;
        while cycles > 0 {
            let n = cycles.min(8);
            let tdo = jtag.sequence(tms, dap.request.take_u8()?, n);
            if capture {
                dap.response.put_u8(tdo)?;
            }
            cycles -= n;
        }
    }

    dap.response
        .patch(status_slot, &[Status::from_ok(enabled).into()]);
    Ok(())
}

pub(super) fn configure<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let count = usize::from(dap.request.take_u8()?);
    let ok = if count > MAX_JTAG_DEVICES {
        dap.request.skip(count)?;
        false
    } else {
        let mut ir_lengths = [0u8; MAX_JTAG_DEVICES];
        dap.request.take_exact(&mut ir_lengths[..count])?;
        dap.state.jtag.configure(&ir_lengths[..count])
    };
    if ok {
        log::debug!("JTAG chain: {:?}", &dap.state.jtag.ir_length[..count]);
    }
    dap.response.put_u8(Status::from_ok(ok).into())?;
    Ok(())
}

pub(super) fn idcode<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let index = dap.request.take_u8()?;
    let selected = dap.state.port == Port::Jtag && dap.state.jtag.select(index);
    let idcode = if selected {
        let mut jtag = Jtag::new(&mut dap.bits, &dap.state.jtag);
        jtag.set_ir(ir::IDCODE);
        jtag.read_idcode()
    } else {
        0
    };
    dap.response.put_u8(Status::from_ok(selected).into())?;
    dap.response.put_le32(idcode)?;
    Ok(())
}
