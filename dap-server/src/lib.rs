//! # CMSIS-DAP Probe Engine
//!
//! This crate turns CMSIS-DAP requests into bit-banged JTAG and SWD sequences on a set of pins
//! and relays captured SWO trace data back to the host.
//!
//! ## Overview
//!
//! A debug host (pyOCD, OpenOCD, probe-rs, ...) talks CMSIS-DAP to a probe. The probe owns the
//! debug pins of the target and implements the electrical side of the protocol. This library
//! contains everything between a received request packet and the pins:
//!
//! - **Bit engine** ([`bits`]): clock and data pin toggling with a busy-waited half period
//! - **JTAG scan engine** ([`jtag`]): IR and DR scans over a chain of up to four devices
//! - **SWD packet engine** ([`swd`]): request, acknowledge, data and parity phases
//! - **Transfer engine** ([`transfer`]): DP/AP register accesses with WAIT retries, value
//!   matching and read posting on top of either port
//! - **Command dispatcher** ([`dap::Dap`]): parses requests, runs handlers and builds responses,
//!   including batched and queued commands
//! - **SWO capture** ([`swo`]): bounded trace buffer filled from a UART reader
//! - **Command loop** ([`server::Server`]): moves packets between a [`transport::Transport`]
//!   and the dispatcher
//!
//! ## Architecture
//!
//! The crate is built around the [`Pins`] trait. A backend (GPIO character device, memory
//! mapped GPIO, an emulator) implements [`Pins`]; the engine never touches hardware otherwise.
//!
//! 1. A backend implements the [`Pins`] trait
//! 2. The backend is wrapped in a [`server::Server`] together with one or more transports
//! 3. The server waits for a transport to report a connected peer
//! 4. Each received request is processed by [`dap::Dap`] and the response is sent back
//! 5. When the peer disconnects the probe state is reset and another transport may be selected
//!
//! ## Basic Usage
//!
//! ### Implementing a Backend
//!
//! ```ignore
//! use dap_server::{Pin, PinMode, Pins};
//!
//! struct MyPins {
//!     // device-specific fields
//! }
//!
//! impl Pins for MyPins {
//!     fn set(&mut self, pin: Pin, level: bool) {
//!         // Drive the output latch of `pin`
//!     }
//!
//!     fn get(&mut self, pin: Pin) -> bool {
//!         // Sample `pin`
//!         false
//!     }
//!
//!     fn set_mode(&mut self, pin: Pin, mode: PinMode) -> std::io::Result<()> {
//!         // Switch direction and bias of `pin`
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ### Starting the Server
//!
//! ```ignore
//! use dap_server::server::Builder;
//! use dap_server::transport::tcp::TcpTransport;
//!
//! let mut server = Builder::new()
//!     .default_clock(4_000_000)
//!     .build(MyPins::new()?)?;
//! server.add_transport(TcpTransport::bind("127.0.0.1:9000")?);
//! server.run()?;
//! ```
//!
//! ## Error Handling
//!
//! Protocol level failures (FAULT acknowledges, parity errors, a disabled port) are reported to
//! the host inside the response, as the protocol demands. A malformed request is answered with
//! the single error byte `0xff`. Only a failure to switch pin direction is fatal, see
//! [`error::PinError`].
//!
//! ## Configuration
//!
//! The probe is configured via [`server::Config`]:
//!
//! - **max_packet_size**: Largest request and response packet (default: 512 bytes)
//! - **buffer_size**: Size of the request and response buffers (default: 2048 bytes)
//! - **swo_buffer_size**: Size of the trace buffer (default: 2048 bytes)
//! - **default_clock**: SWD/JTAG clock after reset (default: 1 MHz)
//!
//! ## Logging
//!
//! This crate uses the `log` crate for diagnostics. Enable logging to see:
//! - Transport selection, connections and disconnections
//! - Port configuration changes
//! - Every processed command and, at trace level, the raw request and response bytes
//!
//! ## Thread Model
//!
//! The command loop owns the probe state and runs on a single thread. Bit clocking busy-waits
//! on that thread. SWO bytes arrive from a separate reader thread through [`swo::SwoSink`].
use std::{fmt::Display, io};

pub mod bits;
pub mod buffer;
mod commands;
pub mod dap;
pub mod emulator;
pub mod error;
pub mod jtag;
pub mod server;
pub mod state;
pub mod swd;
pub mod swo;
pub mod timing;
pub mod transfer;
pub mod transport;

/// The signals of a probe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Pin {
    /// JTAG TCK / SWD SWCLK
    TckSwclk,
    /// JTAG TMS / SWD SWDIO
    TmsSwdio,
    Tdi,
    /// JTAG TDO, shared with SWO
    Tdo,
    NReset,
    /// Target reference voltage sense, high when a powered target is attached.
    Vtref,
    LedConnect,
    LedRunning,
}

impl Pin {
    pub const ALL: [Pin; 8] = [
        Pin::TckSwclk,
        Pin::TmsSwdio,
        Pin::Tdi,
        Pin::Tdo,
        Pin::NReset,
        Pin::Vtref,
        Pin::LedConnect,
        Pin::LedRunning,
    ];

    /// Signals that connect to the target debug header.
    pub const DEBUG: [Pin; 5] = [Pin::TckSwclk, Pin::TmsSwdio, Pin::Tdi, Pin::Tdo, Pin::NReset];

    /// Position of the pin in [`Pin::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Pin::TckSwclk => "tck-swclk",
            Pin::TmsSwdio => "tms-swdio",
            Pin::Tdi => "tdi",
            Pin::Tdo => "tdo",
            Pin::NReset => "nreset",
            Pin::Vtref => "vtref",
            Pin::LedConnect => "led-connect",
            Pin::LedRunning => "led-running",
        }
    }
}

impl Display for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Bias {
    #[default]
    None,
    PullUp,
    PullDown,
}

/// Direction and bias of a pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinMode {
    /// High impedance input
    Input { bias: Bias },
    /// Push-pull output that starts at `level`. The level of an output can still be read back.
    Output { level: bool, bias: Bias },
}

impl PinMode {
    pub const INPUT: PinMode = PinMode::Input { bias: Bias::None };

    pub fn output(level: bool) -> PinMode {
        PinMode::Output {
            level,
            bias: Bias::None,
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, PinMode::Output { .. })
    }
}

/// Trait that pin backends must implement to drive a target.
///
/// This trait is the only interface between the probe engine and the hardware. Implementors
/// translate pin level and direction changes into whatever the platform offers (GPIO
/// character devices, memory mapped registers, an emulation).
///
/// See the [`dap-server-gpio`](https://docs.rs/dap-server-gpio/) crate for a Linux implementation.
pub trait Pins {
    /// Drive the output latch of `pin`.
    ///
    /// Writing a pin that is currently an input only updates the latch. The level becomes
    /// visible once the pin is switched to an output. Writes cannot fail; backends that
    /// encounter an error should log it.
    fn set(&mut self, pin: Pin, level: bool);

    /// Sample the level of `pin`.
    ///
    /// For outputs this returns the level seen on the pin, which normally equals the driven
    /// level. Backends without a given signal (for example no target voltage sense) should
    /// return a sensible constant.
    fn get(&mut self, pin: Pin) -> bool;

    /// Change direction and bias of `pin`.
    ///
    /// # Error Handling
    ///
    /// A failing direction change leaves the probe in an unknown electrical state. The engine
    /// treats every error returned here as fatal and stops processing commands.
    fn set_mode(&mut self, pin: Pin, mode: PinMode) -> io::Result<()>;
}

impl<P: Pins + ?Sized> Pins for Box<P> {
    fn set(&mut self, pin: Pin, level: bool) {
        (**self).set(pin, level)
    }

    fn get(&mut self, pin: Pin) -> bool {
        (**self).get(pin)
    }

    fn set_mode(&mut self, pin: Pin, mode: PinMode) -> io::Result<()> {
        (**self).set_mode(pin, mode)
    }
}

#[test]
fn pin_indices_follow_declaration_order() {
    for (index, pin) in Pin::ALL.iter().enumerate() {
        assert_eq!(pin.index(), index);
    }
}
