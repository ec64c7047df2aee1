//! Shared fixtures for the probe scenario tests.
//!
//! The scenario tests drive a [`Dap`] on [`EmulatedPins`] packet by packet. The TCP tests start
//! a complete [`Server`] on an ephemeral port with [`RunningServer`].
use std::{
    error::Error,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use dap_server::{
    dap::Dap,
    emulator::{EmulatedPins, EmulatorTrace},
    server::{Builder, Config, Server, ServerError},
    transport::tcp::TcpTransport,
};

pub type Probe = Dap<EmulatedPins>;

/// A probe with the default configuration and a powered target.
pub fn probe() -> Probe {
    probe_with(&Config::default())
}

pub fn probe_with(config: &Config) -> Probe {
    Dap::new(EmulatedPins::new(), config).expect("emulated pins never fail")
}

/// Sends one request packet and returns the response. Panics if the packet was queued.
pub fn command(dap: &mut Probe, request: &[u8]) -> Vec<u8> {
    dap.transact(request)
        .expect("emulated pins never fail")
        .expect("request was queued")
}

/// Sends one request packet and compares the complete response.
#[track_caller]
pub fn assert_command(dap: &mut Probe, request: &[u8], expected: &[u8]) {
    assert_eq!(
        command(dap, request),
        expected,
        "response to {:02x?}",
        request
    );
}

/// Clears the recorded trace and the input streams so that cycle counting starts over.
pub fn restart_trace(dap: &mut Probe) {
    dap.pins_mut().reset_trace();
}

pub fn trace(dap: &Probe) -> &EmulatorTrace {
    dap.pins().trace()
}

/// Compares the first bytes of a recorded bit stream.
#[track_caller]
pub fn assert_stream(actual: &[u8], expected: &[u8]) {
    assert!(
        actual.len() >= expected.len(),
        "stream has {} bytes, expected at least {}",
        actual.len(),
        expected.len()
    );
    assert_eq!(&actual[..expected.len()], expected);
}

/// SWDIO input for one SWD read that starts at cycle 0: OK acknowledge after the request and
/// one turnaround cycle, then `value` and its parity.
pub fn swd_read_stream(value: u32) -> Vec<u8> {
    let parity = value.count_ones() % 2 == 1;
    let stream = 1u64 << 9 | u64::from(value) << 12 | u64::from(parity) << 44;
    stream.to_le_bytes().to_vec()
}

/// A server on `127.0.0.1` with an ephemeral port, running on its own thread until dropped.
pub struct RunningServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), ServerError>>>,
}

impl RunningServer {
    pub fn start(pins: EmulatedPins, builder: Builder) -> Result<RunningServer, Box<dyn Error>> {
        let transport =
            TcpTransport::bind("127.0.0.1:0")?.poll_interval(Duration::from_millis(10));
        let addr = transport.local_addr()?;
        let mut server: Server<EmulatedPins> = builder
            .poll_interval(Duration::from_millis(10))
            .build(pins)?;
        server.add_transport(transport);

        let stop = Arc::new(AtomicBool::new(false));
        let server_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || server.run_until(&server_stop));
        Ok(RunningServer {
            addr,
            stop,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops the command loop and returns its result.
    pub fn shutdown(mut self) -> Result<(), ServerError> {
        self.stop.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join().expect("server thread panicked"),
            None => Ok(()),
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[test]
fn read_stream_layout() {
    let stream = swd_read_stream(0x0403_0201);
    assert_eq!(stream[1], 0x12);
    assert_eq!(&stream[2..5], &[0x20, 0x30, 0x40]);
    assert_eq!(stream[5], 0x10);
}
