use std::time::Duration;

use dap_protocol::Status;

use crate::{Pin, Pins, dap::Dap, error::CommandError, timing::Deadline};

/// Pin positions in the SWJ pins bitfield. nTRST (bit 5) is not wired.
const PIN_BITS: [(Pin, u8); 5] = [
    (Pin::TckSwclk, 0),
    (Pin::TmsSwdio, 1),
    (Pin::Tdi, 2),
    (Pin::Tdo, 3),
    (Pin::NReset, 7),
];

const MAX_PIN_WAIT: Duration = Duration::from_secs(3);

pub(super) fn pins<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let output = dap.request.take_u8()?;
    let select = dap.request.take_u8()?;
    let wait_us = dap.request.take_le32()?;

    for (pin, bit) in PIN_BITS {
        if select & (1 << bit) != 0 {
            dap.bits.set(pin, output & (1 << bit) != 0);
        }
    }

    // nRESET is open drain and may be held by the target; the other pins are push-pull
    let wait = Duration::from_micros(wait_us.into()).min(MAX_PIN_WAIT);
    if !wait.is_zero() && select & 0x80 != 0 {
        let expected = output & 0x80 != 0;
        let bits = &mut dap.bits;
        if !Deadline::after(wait).poll(Duration::from_micros(1), || {
            bits.get(Pin::NReset) == expected
        }) {
            log::debug!("nRESET did not reach level {} within {:?}", expected, wait);
        }
    }

    let mut input = 0u8;
    for (pin, bit) in PIN_BITS {
        input |= u8::from(dap.bits.get(pin)) << bit;
    }
    dap.response.put_u8(input)?;
    Ok(())
}

pub(super) fn clock<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let rate = dap.request.take_le32()?;
    if rate != 0 {
        dap.bits.set_clock(rate);
        log::debug!("Clock set to {} Hz", rate);
    }
    dap.response.put_u8(Status::from_ok(rate != 0).into())?;
    Ok(())
}

/// Clocks out up to 256 TMS/SWDIO bits, LSB first.
pub(super) fn sequence<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let count = match dap.request.take_u8()? {
        0 => 256,
        n => usize::from(n),
    };
    let len = count.div_ceil(8);
    if dap.request.len() < len {
        return Err(CommandError::Truncated);
    }
    let mut remaining = count;
    for _ in 0..len {
        let mut value = dap.request.take_u8()?;
        for _ in 0..remaining.min(8) {
            dap.bits.write_cycle(Pin::TmsSwdio, value & 1 != 0);
            value >>= 1;
        }
        remaining = remaining.saturating_sub(8);
    }
    dap.response.put_u8(Status::Ok.into())?;
    Ok(())
}
