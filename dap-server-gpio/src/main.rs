//! # CMSIS-DAP Probe on Linux GPIOs
//!
//! Runs a bit-banged CMSIS-DAP probe on the GPIO lines of a Linux board (Raspberry Pi and
//! similar) and serves it to debug hosts over TCP.
//!
//! ## Overview
//!
//! This crate provides the hardware side for [`dap_server`](https://docs.rs/dap-server/):
//! a backend for the GPIO character device and an SWO reader for a serial port. An
//! `emulated` mode runs the same server on emulated pins, which lets hosts and tooling be
//! tested without a target.
pub mod backends;

use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use clap::{Parser, Subcommand};
use clap_num::si_number;
use dap_protocol::Port;
use dap_server::{
    Pin, Pins,
    emulator::EmulatedPins,
    server::{Builder, Server, ServerError},
    transport::tcp::TcpTransport,
};
use env_logger::Env;
use tokio::task::JoinHandle;

use crate::backends::{
    gpiochip::{GpioChipBackend, PinLines},
    swo_uart::SwoTty,
};

#[derive(Subcommand, Eq, PartialEq, Clone)]
enum DeviceImpl {
    /// Pins on a GPIO character device
    Gpiochip {
        #[arg(long, default_value = "/dev/gpiochip0")]
        chip: PathBuf,
        #[arg(long, help = "Line offset of TCK/SWCLK")]
        tck: u32,
        #[arg(long, help = "Line offset of TMS/SWDIO")]
        tms: u32,
        #[arg(long)]
        tdi: Option<u32>,
        #[arg(long)]
        tdo: Option<u32>,
        #[arg(long)]
        nreset: Option<u32>,
        #[arg(long, help = "Line offset of the target voltage sense input")]
        vtref: Option<u32>,
        #[arg(long)]
        led_connect: Option<u32>,
        #[arg(long)]
        led_running: Option<u32>,
        #[arg(long, help = "Serial port that receives SWO")]
        swo_tty: Option<PathBuf>,
        #[arg(long, default_value = "1000000")]
        swo_baudrate: u32,
    },
    /// Emulated pins, for testing hosts without hardware
    Emulated,
}

#[derive(Parser)]
#[command(about = "CMSIS-DAP debug probe on Linux GPIO lines", long_about=None)]
struct Args {
    #[arg(short, long, default_value = "9000")]
    port: u16,

    #[arg(short, long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[arg(short, long, default_value = "1M", value_parser = si_number::<u32>, help = "SWD/JTAG clock after reset")]
    clock: u32,

    #[arg(long, help = "Use JTAG when the host asks for the default port")]
    jtag_default: bool,

    #[arg(long, default_value = "0001")]
    serial: String,

    #[arg(long, help = "Show connect and running state on one LED")]
    leds_combined: bool,

    #[clap(subcommand)]
    device: DeviceImpl,
}

fn spawn<P: Pins + Send + 'static>(
    mut server: Server<P>,
    transport: TcpTransport,
    stop: Arc<AtomicBool>,
) -> JoinHandle<Result<(), ServerError>> {
    server.add_transport(transport);
    tokio::task::spawn_blocking(move || server.run_until(&stop))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting CMSIS-DAP server");

    let args = Args::parse();
    log::debug!(
        "Parsed arguments: ip={}, port={}, clock={}",
        args.ip,
        args.port,
        args.clock
    );

    let builder = Builder::new()
        .default_clock(args.clock)
        .default_port(if args.jtag_default {
            Port::Jtag
        } else {
            Port::Swd
        })
        .serial_number(args.serial)
        .leds_combined(args.leds_combined);

    let addr = SocketAddr::new(args.ip, args.port);
    log::info!("Binding to address: {}", addr);
    let transport = TcpTransport::bind(addr)?;
    let stop = Arc::new(AtomicBool::new(false));

    let mut handle = match args.device {
        DeviceImpl::Gpiochip {
            chip,
            tck,
            tms,
            tdi,
            tdo,
            nreset,
            vtref,
            led_connect,
            led_running,
            swo_tty,
            swo_baudrate,
        } => {
            let mut lines = PinLines::default();
            lines.assign(Pin::TckSwclk, tck);
            lines.assign(Pin::TmsSwdio, tms);
            let optional = [
                (Pin::Tdi, tdi),
                (Pin::Tdo, tdo),
                (Pin::NReset, nreset),
                (Pin::Vtref, vtref),
                (Pin::LedConnect, led_connect),
                (Pin::LedRunning, led_running),
            ];
            for (pin, offset) in optional {
                if let Some(offset) = offset {
                    lines.assign(pin, offset);
                }
            }

            log::info!("Initializing GPIO server from {}", chip.display());
            let mut server = builder.build(GpioChipBackend::new(&chip, &lines)?)?;
            if let Some(path) = swo_tty {
                let uart = SwoTty::open(&path, swo_baudrate, server.swo_sink())?;
                server.set_swo_uart(uart);
            }
            spawn(server, transport, Arc::clone(&stop))
        }
        DeviceImpl::Emulated => {
            log::info!("Initializing server on emulated pins");
            spawn(
                builder.build(EmulatedPins::new())?,
                transport,
                Arc::clone(&stop),
            )
        }
    };

    let result = tokio::select! {
        result = &mut handle => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("Received Ctrl-C, shutting down");
            stop.store(true, Ordering::Release);
            handle.await?
        }
    };
    result?;
    Ok(())
}
