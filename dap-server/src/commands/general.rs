use std::time::Duration;

use dap_protocol::{Capabilities, InfoId, PROTOCOL_VERSION, Port, Status};

use crate::{
    Bias, Pin, PinMode, Pins, buffer::RingBuffer, dap::Dap, error::CommandError, timing,
};

const CAPABILITIES: u8 = Capabilities::SWD
    | Capabilities::JTAG
    | Capabilities::SWO_UART
    | Capabilities::ATOMIC_COMMANDS
    | Capabilities::SWO_STREAMING_TRACE;

/// Length-prefixed, NUL terminated string.
fn put_string(response: &mut RingBuffer, value: &str) -> Result<(), CommandError> {
    let bytes = &value.as_bytes()[..value.len().min(u8::MAX as usize - 1)];
    response.put_u8(bytes.len() as u8 + 1)?;
    response.put_all(bytes)?;
    response.put_u8(0)?;
    Ok(())
}

pub(super) fn info<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let id = dap.request.take_u8()?;
    let config = &dap.config;
    let response = &mut dap.response;
    match InfoId::try_from(id) {
        Ok(InfoId::Vendor) => put_string(response, &config.vendor)?,
        Ok(InfoId::Product) => put_string(response, &config.product)?,
        Ok(InfoId::SerialNumber) => put_string(response, &config.serial_number)?,
        Ok(InfoId::ProtocolVersion) => put_string(response, PROTOCOL_VERSION)?,
        Ok(InfoId::FirmwareVersion) => put_string(response, &config.firmware_version)?,
        Ok(InfoId::Capabilities) => response.put_all(&[1, CAPABILITIES])?,
        Ok(InfoId::TestDomainTimer) => response.put_all(&[0x08, 0x00, 0x00, 0x00, 0x00])?,
        Ok(InfoId::SwoBufferSize) => {
            response.put_u8(4)?;
            response.put_le32(dap.swo.capacity() as u32)?;
        }
        Ok(InfoId::MaxPacketCount) => {
            let count = config.buffer_size / config.max_packet_size.max(1);
            response.put_all(&[1, count.min(u8::MAX as usize) as u8])?;
        }
        Ok(InfoId::MaxPacketSize) => {
            response.put_u8(2)?;
            response.put_le16(config.max_packet_size.min(u16::MAX as usize) as u16)?;
        }
        // target strings of on-board probes, UART bridge buffers and unknown ids
        Ok(_) | Err(_) => response.put_u8(0)?,
    }
    Ok(())
}

pub(super) fn host_status<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let kind = dap.request.take_u8()?;
    let status = dap.request.take_u8()?;
    let valid = kind <= 1 && status <= 1;
    if valid {
        let on = status == 1;
        let combined = dap.config.leds_combined;
        let leds = &mut dap.state.leds;
        if kind == 0 {
            leds.connected = on;
            let led = if combined {
                Pin::LedRunning
            } else {
                Pin::LedConnect
            };
            dap.bits.set(led, on);
        } else {
            leds.running = on;
            dap.bits
                .set(Pin::LedRunning, on || (combined && leds.connected));
        }
    }
    dap.response.put_u8(Status::from_ok(valid).into())?;
    Ok(())
}

fn configure_port<P: Pins>(dap: &mut Dap<P>, port: Port) -> Result<(), CommandError> {
    dap.swo.set_capture(false);
    let bits = &mut dap.bits;
    match port {
        Port::Swd => {
            bits.set_mode(Pin::TckSwclk, PinMode::output(true))?;
            bits.set_mode(Pin::TmsSwdio, PinMode::output(true))?;
            bits.set_mode(Pin::NReset, PinMode::output(true))?;
            bits.set_mode(Pin::Tdi, PinMode::INPUT)?;
        }
        Port::Jtag => {
            bits.set_mode(
                Pin::TckSwclk,
                PinMode::Output {
                    level: true,
                    bias: Bias::PullDown,
                },
            )?;
            for pin in [Pin::TmsSwdio, Pin::Tdi] {
                bits.set_mode(
                    pin,
                    PinMode::Output {
                        level: true,
                        bias: Bias::PullUp,
                    },
                )?;
            }
            bits.set_mode(Pin::NReset, PinMode::output(true))?;
            bits.set_mode(
                Pin::Tdo,
                PinMode::Input {
                    bias: Bias::PullUp,
                },
            )?;
        }
        Port::Disabled => release_pins(dap)?,
    }
    dap.state.port = port;
    log::info!("Configured port {}", port);
    Ok(())
}

fn release_pins<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    for pin in Pin::DEBUG {
        dap.bits.set_mode(pin, PinMode::INPUT)?;
    }
    Ok(())
}

pub(super) fn connect<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let requested = dap.request.take_u8()?;
    let mut connected = Port::Disabled;
    if !dap.bits.get(Pin::Vtref) {
        log::error!("Cannot configure the port without target voltage");
    } else {
        match Port::from_connect_request(requested) {
            Ok(port) => {
                let port = port.unwrap_or(dap.config.default_port);
                configure_port(dap, port)?;
                connected = port;
            }
            Err(other) => log::warn!("Unsupported port {}", other),
        }
    }
    dap.response.put_u8(connected as u8)?;
    Ok(())
}

pub(super) fn disconnect<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    dap.swo.set_capture(false);
    release_pins(dap)?;
    dap.state.port = Port::Disabled;
    log::info!("Released all debug pins");
    dap.response.put_u8(Status::Ok.into())?;
    Ok(())
}

pub(super) fn delay<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    let delay_us = dap.request.take_le16()?;
    timing::busy_wait(Duration::from_micros(delay_us.into()));
    dap.response.put_u8(Status::Ok.into())?;
    Ok(())
}

/// The probe knows no device specific reset sequence and reports it as not executed.
pub(super) fn reset_target<P: Pins>(dap: &mut Dap<P>) -> Result<(), CommandError> {
    dap.response.put_all(&[Status::Ok.into(), 0x00])?;
    Ok(())
}
