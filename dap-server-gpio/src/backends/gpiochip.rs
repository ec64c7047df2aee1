//! # GPIO Character Device Backend
//!
//! Drives the probe signals through the Linux GPIO character device (`/dev/gpiochipN`).
//! Every signal gets its own line handle, so direction and bias can be changed per pin with
//! `GPIOHANDLE_SET_CONFIG_IOCTL` (Linux 5.5 or newer).
//!
//! ## Example Usage
//!
//! ```ignore
//! use dap_server::{Pin, server::Builder};
//!
//! let mut lines = PinLines::default();
//! lines.assign(Pin::TckSwclk, 11);
//! lines.assign(Pin::TmsSwdio, 25);
//! let pins = GpioChipBackend::new("/dev/gpiochip0", &lines)?;
//! let server = Builder::new().build(pins)?;
//! ```
use std::{
    ffi::{c_char, c_int},
    fs::OpenOptions,
    io,
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
    path::Path,
};

use dap_server::{Bias, Pin, PinMode, Pins};
use nix::ioctl_readwrite;

const GPIOHANDLES_MAX: usize = 64;
const CONSUMER: &[u8] = b"dap-gpio";

const GPIOHANDLE_REQUEST_INPUT: u32 = 1 << 0;
const GPIOHANDLE_REQUEST_OUTPUT: u32 = 1 << 1;
const GPIOHANDLE_REQUEST_BIAS_PULL_UP: u32 = 1 << 5;
const GPIOHANDLE_REQUEST_BIAS_PULL_DOWN: u32 = 1 << 6;

#[repr(C)]
struct GpioHandleRequest {
    lineoffsets: [u32; GPIOHANDLES_MAX],
    flags: u32,
    default_values: [u8; GPIOHANDLES_MAX],
    consumer_label: [c_char; 32],
    lines: u32,
    fd: c_int,
}

#[repr(C)]
struct GpioHandleConfig {
    flags: u32,
    default_values: [u8; GPIOHANDLES_MAX],
    padding: [u32; 4],
}

#[repr(C)]
struct GpioHandleData {
    values: [u8; GPIOHANDLES_MAX],
}

// Defined in include/uapi/linux/gpio.h
ioctl_readwrite!(gpio_get_linehandle, 0xB4, 0x03, GpioHandleRequest);
ioctl_readwrite!(gpiohandle_get_line_values, 0xB4, 0x08, GpioHandleData);
ioctl_readwrite!(gpiohandle_set_line_values, 0xB4, 0x09, GpioHandleData);
ioctl_readwrite!(gpiohandle_set_config, 0xB4, 0x0a, GpioHandleConfig);

fn mode_flags(mode: PinMode) -> (u32, u8) {
    let (direction, bias, level) = match mode {
        PinMode::Input { bias } => (GPIOHANDLE_REQUEST_INPUT, bias, false),
        PinMode::Output { level, bias } => (GPIOHANDLE_REQUEST_OUTPUT, bias, level),
    };
    let bias = match bias {
        Bias::None => 0,
        Bias::PullUp => GPIOHANDLE_REQUEST_BIAS_PULL_UP,
        Bias::PullDown => GPIOHANDLE_REQUEST_BIAS_PULL_DOWN,
    };
    (direction | bias, u8::from(level))
}

/// Line offsets of the probe signals on one GPIO chip.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PinLines {
    offsets: [Option<u32>; Pin::ALL.len()],
}

impl PinLines {
    pub fn assign(&mut self, pin: Pin, offset: u32) {
        self.offsets[pin.index()] = Some(offset);
    }

    pub fn offset(&self, pin: Pin) -> Option<u32> {
        self.offsets[pin.index()]
    }
}

struct Line {
    fd: OwnedFd,
    offset: u32,
    output: bool,
    /// Last written level, applied when the line turns into an output
    latch: bool,
}

impl Line {
    fn request(chip: &impl AsRawFd, offset: u32) -> io::Result<Line> {
        let mut request = GpioHandleRequest {
            lineoffsets: [0; GPIOHANDLES_MAX],
            flags: GPIOHANDLE_REQUEST_INPUT,
            default_values: [0; GPIOHANDLES_MAX],
            consumer_label: [0; 32],
            lines: 1,
            fd: -1,
        };
        request.lineoffsets[0] = offset;
        for (dst, src) in request.consumer_label.iter_mut().zip(CONSUMER) {
            *dst = *src as c_char;
        }
        // SAFETY: The ioctl call is safe because:
        // - The chip file descriptor is valid for the duration of the call
        // - The request is laid out as the kernel expects it
        unsafe {
            gpio_get_linehandle(chip.as_raw_fd(), &mut request)?;
        }
        // SAFETY: On success the kernel returns a new file descriptor that nobody else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(request.fd) };
        Ok(Line {
            fd,
            offset,
            output: false,
            latch: false,
        })
    }

    fn write(&mut self, level: bool) -> io::Result<()> {
        self.latch = level;
        if !self.output {
            return Ok(());
        }
        let mut data = GpioHandleData {
            values: [0; GPIOHANDLES_MAX],
        };
        data.values[0] = u8::from(level);
        // SAFETY: The handle is valid and `data` outlives the call.
        unsafe {
            gpiohandle_set_line_values(self.fd.as_raw_fd(), &mut data)?;
        }
        Ok(())
    }

    fn read(&self) -> io::Result<bool> {
        let mut data = GpioHandleData {
            values: [0; GPIOHANDLES_MAX],
        };
        // SAFETY: The handle is valid and `data` outlives the call.
        unsafe {
            gpiohandle_get_line_values(self.fd.as_raw_fd(), &mut data)?;
        }
        Ok(data.values[0] != 0)
    }

    fn configure(&mut self, mode: PinMode) -> io::Result<()> {
        let (flags, level) = mode_flags(mode);
        let mut config = GpioHandleConfig {
            flags,
            default_values: [0; GPIOHANDLES_MAX],
            padding: [0; 4],
        };
        config.default_values[0] = level;
        // SAFETY: The handle is valid and `config` outlives the call.
        unsafe {
            gpiohandle_set_config(self.fd.as_raw_fd(), &mut config)?;
        }
        self.output = mode.is_output();
        if self.output {
            self.latch = level != 0;
        }
        Ok(())
    }
}

/// Probe pins on a GPIO character device. Signals without a line read as low, except for the
/// target voltage sense, which reads as present.
pub struct GpioChipBackend {
    lines: [Option<Line>; Pin::ALL.len()],
}

impl GpioChipBackend {
    pub fn new(chip: impl AsRef<Path>, offsets: &PinLines) -> io::Result<GpioChipBackend> {
        let path = chip.as_ref();
        log::debug!("Opening GPIO chip: {}", path.display());
        let chip = OpenOptions::new().read(true).write(true).open(path)?;

        let mut lines: [Option<Line>; Pin::ALL.len()] = Default::default();
        for pin in Pin::ALL {
            if let Some(offset) = offsets.offset(pin) {
                let line = Line::request(&chip, offset).map_err(|err| {
                    io::Error::new(
                        err.kind(),
                        format!("Cannot request line {} for {}: {}", offset, pin, err),
                    )
                })?;
                log::info!("Using line {} of {} as {}", offset, path.display(), pin);
                lines[pin.index()] = Some(line);
            }
        }
        for pin in [Pin::TckSwclk, Pin::TmsSwdio] {
            if lines[pin.index()].is_none() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("No line assigned to {}", pin),
                ));
            }
        }
        Ok(GpioChipBackend { lines })
    }
}

impl Pins for GpioChipBackend {
    fn set(&mut self, pin: Pin, level: bool) {
        if let Some(line) = self.lines[pin.index()].as_mut() {
            if let Err(err) = line.write(level) {
                log::error!("Writing line {} ({}) failed: {}", line.offset, pin, err);
            }
        }
    }

    fn get(&mut self, pin: Pin) -> bool {
        match self.lines[pin.index()].as_ref() {
            Some(line) => line.read().unwrap_or_else(|err| {
                log::error!("Reading line {} ({}) failed: {}", line.offset, pin, err);
                false
            }),
            None => pin == Pin::Vtref,
        }
    }

    fn set_mode(&mut self, pin: Pin, mode: PinMode) -> io::Result<()> {
        match self.lines[pin.index()].as_mut() {
            Some(line) => line.configure(mode),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_of_modes() {
        assert_eq!(mode_flags(PinMode::INPUT), (GPIOHANDLE_REQUEST_INPUT, 0));
        assert_eq!(
            mode_flags(PinMode::Output {
                level: true,
                bias: Bias::PullUp
            }),
            (GPIOHANDLE_REQUEST_OUTPUT | GPIOHANDLE_REQUEST_BIAS_PULL_UP, 1)
        );
        assert_eq!(
            mode_flags(PinMode::Input {
                bias: Bias::PullDown
            }),
            (GPIOHANDLE_REQUEST_INPUT | GPIOHANDLE_REQUEST_BIAS_PULL_DOWN, 0)
        );
    }

    #[test]
    fn unassigned_lines() {
        let mut lines = PinLines::default();
        lines.assign(Pin::Tdo, 7);
        assert_eq!(lines.offset(Pin::Tdo), Some(7));
        assert_eq!(lines.offset(Pin::Vtref), None);
    }
}
