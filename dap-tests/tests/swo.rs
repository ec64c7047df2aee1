use std::{
    io,
    sync::{Arc, Mutex},
};

use dap_server::{server::Config, swo::SwoUart};
use dap_tests::{Probe, assert_command, probe, probe_with};

/// SWD probe with SWO in UART mode at 115200 baud.
fn uart_probe(mut dap: Probe) -> Probe {
    assert_command(&mut dap, b"\x02\x01", b"\x02\x01");
    assert_command(&mut dap, b"\x17\x01", b"\x17\x00");
    assert_command(&mut dap, b"\x18\x01", b"\x18\x00");
    assert_command(&mut dap, b"\x19\x00\xc2\x01\x00", b"\x19\x00\xc2\x01\x00");
    dap
}

#[derive(Clone, Default)]
struct RecordingUart {
    rates: Arc<Mutex<Vec<u32>>>,
}

impl SwoUart for RecordingUart {
    fn set_baudrate(&mut self, baudrate: u32) -> io::Result<()> {
        self.rates.lock().unwrap().push(baudrate);
        Ok(())
    }
}

struct FixedRateUart;

impl SwoUart for FixedRateUart {
    fn set_baudrate(&mut self, baudrate: u32) -> io::Result<()> {
        if baudrate == 115_200 {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "unsupported rate"))
        }
    }
}

#[test]
fn capture_needs_swd() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x02\x02", b"\x02\x02");
    assert_command(&mut dap, b"\x18\x01", b"\x18\xff");
    assert_command(&mut dap, b"\x1a\x01", b"\x1a\xff");
    assert_command(&mut dap, b"\x1b", b"\x1b\x00\x00\x00\x00\x00");
}

#[test]
fn configure_transport_and_mode() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x02\x01", b"\x02\x01");
    assert_command(&mut dap, b"\x17\x02", b"\x17\xff");
    assert_command(&mut dap, b"\x17\x03", b"\x17\xff");
    assert_command(&mut dap, b"\x17\x01", b"\x17\x00");
    assert_command(&mut dap, b"\x17\x00", b"\x17\x00");
    assert_command(&mut dap, b"\x18\x02", b"\x18\xff");
    assert_command(&mut dap, b"\x18\x03", b"\x18\xff");
    assert_command(&mut dap, b"\x18\x01", b"\x18\x00");
    assert_command(&mut dap, b"\x18\x00", b"\x18\x00");
    // capture only runs in UART mode
    assert_command(&mut dap, b"\x1a\x01", b"\x1a\xff");
    assert_command(&mut dap, b"\x1b", b"\x1b\x00\x00\x00\x00\x00");
}

#[test]
fn capture_and_read_data() {
    let mut dap = uart_probe(probe());
    let sink = dap.swo_sink();

    // nothing is stored before the capture starts
    assert_eq!(sink.push(b"\x01\x02"), 0);
    assert_command(&mut dap, b"\x1a\x01", b"\x1a\x00");
    assert_command(&mut dap, b"\x1b", b"\x1b\x01\x00\x00\x00\x00");

    assert_eq!(sink.push(b"\x01\x02\x03\x04\x05\x06\x07\x08"), 8);
    assert_command(&mut dap, b"\x1b", b"\x1b\x01\x08\x00\x00\x00");
    assert_command(&mut dap, b"\x1e\x03", b"\x1e\x01\x08\x00\x00\x00");
    assert_command(&mut dap, b"\x1e\x01", b"\x1e\x01");
    assert_command(&mut dap, b"\x1e\x02", b"\x1e\x08\x00\x00\x00");
    assert_command(
        &mut dap,
        b"\x1c\x04\x00",
        b"\x1c\x01\x04\x00\x01\x02\x03\x04",
    );
    // asking for more than is buffered returns the rest
    assert_command(
        &mut dap,
        b"\x1c\x08\x00",
        b"\x1c\x01\x04\x00\x05\x06\x07\x08",
    );
    assert_command(&mut dap, b"\x1c\x08\x00", b"\x1c\x01\x00\x00");

    // selecting the mode again stops the capture
    assert_command(&mut dap, b"\x18\x01", b"\x18\x00");
    assert_command(&mut dap, b"\x1b", b"\x1b\x00\x00\x00\x00\x00");
    assert_eq!(sink.push(b"\x01"), 0);
}

#[test]
fn overrun_until_restart() {
    let mut dap = uart_probe(probe());
    let sink = dap.swo_sink();
    assert_command(&mut dap, b"\x1a\x01", b"\x1a\x00");

    assert_eq!(sink.push(&[0x55; 2048]), 2048);
    assert_command(&mut dap, b"\x1b", b"\x1b\x01\x00\x08\x00\x00");
    assert_eq!(sink.push(b"\x01\x02\x03\x04"), 0);
    assert_command(&mut dap, b"\x1b", b"\x1b\x81\x00\x08\x00\x00");

    let mut expected = b"\x1c\x81\x10\x00".to_vec();
    expected.extend_from_slice(&[0x55; 16]);
    for _ in 0..128 {
        assert_command(&mut dap, b"\x1c\x10\x00", &expected);
    }
    // draining does not clear the overrun
    assert_command(&mut dap, b"\x1b", b"\x1b\x81\x00\x00\x00\x00");

    assert_command(&mut dap, b"\x1a\x00", b"\x1a\x00");
    assert_command(&mut dap, b"\x1b", b"\x1b\x80\x00\x00\x00\x00");
    assert_command(&mut dap, b"\x1a\x01", b"\x1a\x00");
    assert_command(&mut dap, b"\x1b", b"\x1b\x01\x00\x00\x00\x00");
}

#[test]
fn uart_errors_are_reported_while_capturing() {
    let mut dap = uart_probe(probe());
    let sink = dap.swo_sink();
    sink.report_error();
    assert_command(&mut dap, b"\x1b", b"\x1b\x00\x00\x00\x00\x00");

    assert_command(&mut dap, b"\x1a\x01", b"\x1a\x00");
    sink.report_error();
    assert_command(&mut dap, b"\x1b", b"\x1b\x41\x00\x00\x00\x00");
    assert_command(&mut dap, b"\x1a\x00", b"\x1a\x00");
    assert_command(&mut dap, b"\x1b", b"\x1b\x00\x00\x00\x00\x00");
}

#[test]
fn data_is_limited_by_packet_size() {
    let config = Config {
        max_packet_size: 64,
        ..Config::default()
    };
    let mut dap = uart_probe(probe_with(&config));
    let sink = dap.swo_sink();
    assert_command(&mut dap, b"\x1a\x01", b"\x1a\x00");
    sink.push(&[0xaa; 100]);

    let mut expected = b"\x1c\x01\x3c\x00".to_vec();
    expected.extend_from_slice(&[0xaa; 60]);
    assert_command(&mut dap, b"\x1c\xff\x00", &expected);
    assert_command(&mut dap, b"\x1b", b"\x1b\x01\x28\x00\x00\x00");
}

#[test]
fn disconnect_stops_capture() {
    let mut dap = uart_probe(probe());
    let sink = dap.swo_sink();
    assert_command(&mut dap, b"\x1a\x01", b"\x1a\x00");
    sink.push(b"\x01\x02\x03");
    assert_command(&mut dap, b"\x03", b"\x03\x00");
    assert!(!sink.is_capturing());
    // buffered data stays readable
    assert_command(&mut dap, b"\x1b", b"\x1b\x00\x03\x00\x00\x00");
}

#[test]
fn baudrate_is_forwarded_to_uart() {
    let mut dap = probe();
    let uart = RecordingUart::default();
    dap.set_swo_uart(Box::new(uart.clone()));
    let mut dap = uart_probe(dap);
    assert_command(&mut dap, b"\x19\x40\x42\x0f\x00", b"\x19\x40\x42\x0f\x00");
    assert_eq!(*uart.rates.lock().unwrap(), vec![115_200, 1_000_000]);

    // outside UART mode the rate is not applied
    assert_command(&mut dap, b"\x18\x00", b"\x18\x00");
    assert_command(&mut dap, b"\x19\x00\xc2\x01\x00", b"\x19\x40\x42\x0f\x00");
    assert_eq!(uart.rates.lock().unwrap().len(), 2);
}

#[test]
fn rejected_baudrate_reads_as_zero() {
    let mut dap = probe();
    dap.set_swo_uart(Box::new(FixedRateUart));
    let mut dap = uart_probe(dap);
    assert_command(&mut dap, b"\x19\x00\x84\x03\x00", b"\x19\x00\x00\x00\x00");
    assert_command(&mut dap, b"\x19\x00\xc2\x01\x00", b"\x19\x00\xc2\x01\x00");
}

#[test]
fn truncated_requests() {
    let mut dap = uart_probe(probe());
    assert_command(&mut dap, b"\x17", b"\xff");
    assert_command(&mut dap, b"\x18", b"\xff");
    assert_command(&mut dap, b"\x19\x00\xc2", b"\xff");
    assert_command(&mut dap, b"\x1a", b"\xff");
    assert_command(&mut dap, b"\x1e", b"\xff");
    assert_command(&mut dap, b"\x1c\x00", b"\xff");
}
