use dap_protocol::{Port, Status};

use crate::{Pins, dap::Dap, error::CommandError, state::SwdConfig, swd::Swd};

pub(super) fn configure<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    dap.state.swd = SwdConfig::from_request(dap.request.take_u8()?);
    dap.response.put_u8(Status::Ok.into())?;
    Ok(())
}

pub(super) fn sequence<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let status_slot = dap.response.reserve(1)?;
    let count = dap.request.take_u8()?;
    let enabled = dap.state.port == Port::Swd;
    let mut swd = Swd::new(&mut dap.bits, dap.state.swd);

    for _ in 0..count {
        let info = dap.request.take_u8()?;
        let input = info & 0x80 != 0;
        let mut cycles = match info & 0x3f {
            0 => 64,
            n => n,
        };
        let bytes = usize::from(cycles).div_ceil(8);

        if !enabled {
            // keep the response shape of a successful sequence
            if input {
                for _ in 0..bytes {
                    dap.response.put_u8(0)?;
                }
            } else {
                dap.request.skip(bytes)?;
            }
            continue;
        }

        if input {
            swd.release()?;
            while cycles > 0 {
                let n = cycles.min(8);
                dap.response.put_u8(swd.read_bits(n))?;
                cycles -= n;
            }
        } else {
            swd.drive()?;
            while cycles > 0 {
                let n = cycles.min(8);
                swd.write_bits(dap.request.take_u8()?, n);
                cycles -= n;
            }
        }
    }

    if enabled {
        swd.drive()?;
    }
    dap.response
        .patch(status_slot, &[Status::from_ok(enabled).into()]);
    Ok(())
}
