use std::time::{Duration, Instant};

use dap_protocol::Port;
use dap_server::{Pin, PinMode, dap::Dap, emulator::EmulatedPins, server::Config};
use dap_tests::{assert_command, assert_stream, command, probe, probe_with, restart_trace, trace};

fn info_string(value: &str) -> Vec<u8> {
    let mut response = vec![0x00, value.len() as u8 + 1];
    response.extend_from_slice(value.as_bytes());
    response.push(0);
    response
}

#[test]
fn info_command() {
    let config = Config {
        vendor: "Example Probes".to_string(),
        serial_number: "EX-0042".to_string(),
        firmware_version: "1.2.3".to_string(),
        ..Config::default()
    };
    let mut dap = probe_with(&config);

    assert_command(&mut dap, b"\x00\x01", &info_string("Example Probes"));
    assert_command(&mut dap, b"\x00\x02", &info_string("CMSIS-DAP"));
    assert_command(&mut dap, b"\x00\x03", &info_string("EX-0042"));
    assert_command(&mut dap, b"\x00\x04", &info_string("2.1.1"));
    // target device and board strings are empty
    for id in 0x05..=0x08 {
        assert_command(&mut dap, &[0x00, id], b"\x00\x00");
    }
    assert_command(&mut dap, b"\x00\x09", &info_string("1.2.3"));
    assert_command(&mut dap, b"\x00\xf0", b"\x00\x01\x57");
    assert_command(&mut dap, b"\x00\xf1", b"\x00\x08\x00\x00\x00\x00");
    // no UART bridge
    assert_command(&mut dap, b"\x00\xfb", b"\x00\x00");
    assert_command(&mut dap, b"\x00\xfc", b"\x00\x00");
    assert_command(&mut dap, b"\x00\xfd", b"\x00\x04\x00\x08\x00\x00");
    assert_command(&mut dap, b"\x00\xfe", b"\x00\x01\x04");
    assert_command(&mut dap, b"\x00\xff", b"\x00\x02\x00\x02");

    assert_command(&mut dap, b"\x00\xbb", b"\x00\x00");
    assert_command(&mut dap, b"\x00", b"\xff");
}

#[test]
fn empty_vendor_is_only_terminator() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x00\x01", b"\x00\x01\x00");
}

#[test]
fn packet_sizes_follow_config() {
    let config = Config {
        max_packet_size: 64,
        buffer_size: 1024,
        swo_buffer_size: 4096,
        ..Config::default()
    };
    let mut dap = probe_with(&config);
    assert_command(&mut dap, b"\x00\xff", b"\x00\x02\x40\x00");
    assert_command(&mut dap, b"\x00\xfe", b"\x00\x01\x10");
    assert_command(&mut dap, b"\x00\xfd", b"\x00\x04\x00\x10\x00\x00");
}

#[test]
fn host_status() {
    let mut dap = probe();
    assert!(!dap.pins().level(Pin::LedConnect));
    assert!(!dap.pins().level(Pin::LedRunning));

    assert_command(&mut dap, b"\x01\x00\x01", b"\x01\x00");
    assert!(dap.pins().level(Pin::LedConnect));
    assert_command(&mut dap, b"\x01\x00\x00", b"\x01\x00");
    assert!(!dap.pins().level(Pin::LedConnect));

    assert_command(&mut dap, b"\x01\x01\x01", b"\x01\x00");
    assert!(dap.pins().level(Pin::LedRunning));
    assert_command(&mut dap, b"\x01\x01\x00", b"\x01\x00");
    assert!(!dap.pins().level(Pin::LedRunning));

    assert_command(&mut dap, b"\x01\x02\x00", b"\x01\xff");
    assert_command(&mut dap, b"\x01\x00\x02", b"\x01\xff");
    assert_command(&mut dap, b"\x01\x01", b"\xff");
}

#[test]
fn combined_leds_stay_on_while_connected() {
    let config = Config {
        leds_combined: true,
        ..Config::default()
    };
    let mut dap = probe_with(&config);
    assert_command(&mut dap, b"\x01\x00\x01", b"\x01\x00");
    assert!(dap.pins().level(Pin::LedRunning));
    assert!(!dap.pins().level(Pin::LedConnect));

    assert_command(&mut dap, b"\x01\x01\x01", b"\x01\x00");
    assert_command(&mut dap, b"\x01\x01\x00", b"\x01\x00");
    assert!(dap.pins().level(Pin::LedRunning));

    assert_command(&mut dap, b"\x01\x00\x00", b"\x01\x00");
    assert!(!dap.pins().level(Pin::LedRunning));
}

#[test]
fn delay() {
    let mut dap = probe();
    let start = Instant::now();
    assert_command(&mut dap, b"\x09\x30\x75", b"\x09\x00");
    assert!(start.elapsed() >= Duration::from_millis(30));

    assert_command(&mut dap, b"\x09\x00", b"\xff");
}

#[test]
fn reset_target_reports_no_sequence() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x0a", b"\x0a\x00\x00");
}

#[test]
fn disconnect_connect() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x03", b"\x03\x00");
    for pin in Pin::DEBUG {
        assert!(!dap.pins().mode(pin).is_output(), "{} is an output", pin);
    }

    // no target voltage, no port
    dap.pins_mut().set_vtref(false);
    assert_command(&mut dap, b"\x02\x01", b"\x02\x00");
    assert_command(&mut dap, b"\x02\x02", b"\x02\x00");
    assert!(!dap.pins().mode(Pin::TckSwclk).is_output());
    dap.pins_mut().set_vtref(true);

    assert_command(&mut dap, b"\x02\x01", b"\x02\x01");
    assert_eq!(dap.state().port, Port::Swd);
    assert!(dap.pins().mode(Pin::TckSwclk).is_output());
    assert!(dap.pins().mode(Pin::TmsSwdio).is_output());
    assert!(!dap.pins().mode(Pin::Tdi).is_output());
    assert!(dap.pins().mode(Pin::NReset).is_output());
    assert_command(&mut dap, b"\x03", b"\x03\x00");
    assert_eq!(dap.state().port, Port::Disabled);

    assert_command(&mut dap, b"\x02\x02", b"\x02\x02");
    assert!(dap.pins().mode(Pin::TckSwclk).is_output());
    assert!(dap.pins().mode(Pin::TmsSwdio).is_output());
    assert!(dap.pins().mode(Pin::Tdi).is_output());
    assert!(!dap.pins().mode(Pin::Tdo).is_output());
    assert!(dap.pins().mode(Pin::NReset).is_output());
    assert_command(&mut dap, b"\x03", b"\x03\x00");

    // hosts rely on the default port being SWD
    assert_command(&mut dap, b"\x02\x00", b"\x02\x01");
    assert_command(&mut dap, b"\x02\x03", b"\x02\x00");
    assert_command(&mut dap, b"\x02", b"\xff");
}

#[test]
fn connect_is_idempotent() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x02\x02", b"\x02\x02");
    let modes: Vec<PinMode> = Pin::DEBUG.iter().map(|&pin| dap.pins().mode(pin)).collect();
    assert_command(&mut dap, b"\x02\x02", b"\x02\x02");
    let again: Vec<PinMode> = Pin::DEBUG.iter().map(|&pin| dap.pins().mode(pin)).collect();
    assert_eq!(modes, again);
    assert_eq!(dap.state().port, Port::Jtag);
}

#[test]
fn default_port_is_configurable() {
    let config = Config {
        default_port: Port::Jtag,
        ..Config::default()
    };
    let mut dap = probe_with(&config);
    assert_command(&mut dap, b"\x02\x00", b"\x02\x02");
}

#[test]
fn swj_pins() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x02\x02", b"\x02\x02");
    dap.pins_mut().set_input(Pin::Tdo, false);
    assert_command(&mut dap, b"\x10\x00\xff\xff\xff\x00\x00", b"\x10\x00");

    // TCK / SWCLK
    assert_command(&mut dap, b"\x10\x01\x01\xff\xff\x00\x00", b"\x10\x01");
    assert!(dap.pins().level(Pin::TckSwclk));
    assert_command(&mut dap, b"\x10\xfe\xfe\xff\xff\x00\x00", b"\x10\x87");
    assert!(dap.pins().level(Pin::TckSwclk));
    assert_command(&mut dap, b"\x10\x00\x01\xff\xff\x00\x00", b"\x10\x86");
    assert!(!dap.pins().level(Pin::TckSwclk));
    assert_command(&mut dap, b"\x10\x00\xff\xff\xff\x00\x00", b"\x10\x00");

    // TMS / SWDIO
    assert_command(&mut dap, b"\x10\x02\x02\xff\xff\x00\x00", b"\x10\x02");
    assert!(dap.pins().level(Pin::TmsSwdio));
    assert_command(&mut dap, b"\x10\xfd\xfd\xff\xff\x00\x00", b"\x10\x87");
    assert_command(&mut dap, b"\x10\x00\x02\xff\xff\x00\x00", b"\x10\x85");
    assert!(!dap.pins().level(Pin::TmsSwdio));
    assert_command(&mut dap, b"\x10\x00\xff\xff\xff\x00\x00", b"\x10\x00");

    // TDI
    assert_command(&mut dap, b"\x10\x04\x04\xff\xff\x00\x00", b"\x10\x04");
    assert!(dap.pins().level(Pin::Tdi));
    assert_command(&mut dap, b"\x10\xfb\xfb\xff\xff\x00\x00", b"\x10\x87");
    assert_command(&mut dap, b"\x10\x00\x04\xff\xff\x00\x00", b"\x10\x83");
    assert!(!dap.pins().level(Pin::Tdi));
    assert_command(&mut dap, b"\x10\x00\xff\xff\xff\x00\x00", b"\x10\x00");

    // nRESET
    assert_command(&mut dap, b"\x10\x80\x80\xff\xff\x00\x00", b"\x10\x80");
    assert!(dap.pins().level(Pin::NReset));
    assert_command(&mut dap, b"\x10\x7f\x7f\xff\xff\x00\x00", b"\x10\x87");
    assert_command(&mut dap, b"\x10\x00\x80\xff\xff\x00\x00", b"\x10\x07");
    assert!(!dap.pins().level(Pin::NReset));
    assert_command(&mut dap, b"\x10\x00\xff\xff\xff\x00\x00", b"\x10\x00");

    // TDO is read back only
    dap.pins_mut().set_input(Pin::Tdo, true);
    assert_command(&mut dap, b"\x10\x00\xff\xff\xff\x00\x00", b"\x10\x08");

    assert_command(&mut dap, b"\x10", b"\xff");
    assert_command(&mut dap, b"\x10\x00", b"\xff");
    assert_command(&mut dap, b"\x10\x00\xff\xff", b"\xff");
}

#[test]
fn swj_pins_waits_for_reset_level() {
    let mut dap = probe();
    // released nRESET reads low, so waiting for high runs into the deadline
    let start = Instant::now();
    assert_command(&mut dap, b"\x10\x80\x80\x20\x4e\x00\x00", b"\x10\x00");
    assert!(start.elapsed() >= Duration::from_millis(20));

    // without nRESET in the selection there is nothing to wait for
    let start = Instant::now();
    assert_command(&mut dap, b"\x10\x00\x01\x40\x4b\x4c\x00", b"\x10\x00");
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn swj_clock_sequence() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x02\x02", b"\x02\x02");
    assert_eq!(dap.clock(), 1_000_000);

    // a rate of 0 is rejected and keeps the clock
    assert_command(&mut dap, b"\x11\x00\x00\x00\x00", b"\x11\xff");
    assert_eq!(dap.clock(), 1_000_000);
    assert_command(&mut dap, b"\x11\xff\xff\xff\xff", b"\x11\x00");
    assert_eq!(dap.clock(), u32::MAX);

    restart_trace(&mut dap);
    assert_command(&mut dap, b"\x11\xa0\x86\x01\x00", b"\x11\x00");
    assert_eq!(dap.clock(), 100_000);
    assert_command(&mut dap, b"\x12\x10\xab\xcd", b"\x12\x00");
    assert_eq!(trace(&dap).clock_cycles(), 16);
    assert_stream(trace(&dap).tms_swdio_out(), b"\xab\xcd");

    restart_trace(&mut dap);
    assert_command(&mut dap, b"\x11\x20\x4e\x00\x00", b"\x11\x00");
    assert_command(&mut dap, b"\x12\x20\x13\x57\x9b\xdf", b"\x12\x00");
    assert_eq!(trace(&dap).clock_cycles(), 32);
    assert_stream(trace(&dap).tms_swdio_out(), b"\x13\x57\x9b\xdf");

    // a count of 0 means 256
    restart_trace(&mut dap);
    assert_command(&mut dap, b"\x11\x40\x42\x0f\x00", b"\x11\x00");
    let mut request = vec![0x12, 0x00];
    request.extend_from_slice(&[0x00; 32]);
    assert_command(&mut dap, &request, b"\x12\x00");
    assert_eq!(trace(&dap).clock_cycles(), 256);

    // odd lengths only clock the requested bits
    restart_trace(&mut dap);
    assert_command(&mut dap, b"\x12\x0b\xff\x07", b"\x12\x00");
    assert_eq!(trace(&dap).clock_cycles(), 11);
    assert_stream(trace(&dap).tms_swdio_out(), b"\xff\x07");

    assert_command(&mut dap, b"\x11\x00\x00", b"\xff");
    assert_command(&mut dap, b"\x12", b"\xff");
    assert_command(&mut dap, b"\x12\x10", b"\xff");
    restart_trace(&mut dap);
    assert_command(&mut dap, b"\x12\x10\xab", b"\xff");
    assert_eq!(trace(&dap).clock_cycles(), 0);
}

#[test]
fn execute_commands() {
    let config = Config {
        vendor: "Example Probes".to_string(),
        ..Config::default()
    };
    let mut dap = probe_with(&config);
    let vendor = info_string("Example Probes");

    let mut expected = vec![0x7f, 0x02];
    expected.extend_from_slice(&vendor);
    expected.extend_from_slice(&vendor);
    assert_command(&mut dap, b"\x7f\x02\x00\x01\x00\x01", &expected);

    let start = Instant::now();
    let mut expected = vec![0x7f, 0x03];
    expected.extend_from_slice(&vendor);
    expected.extend_from_slice(b"\x09\x00");
    expected.extend_from_slice(&vendor);
    assert_command(&mut dap, b"\x7f\x03\x00\x01\x09\x60\xea\x00\x01", &expected);
    assert!(start.elapsed() >= Duration::from_millis(60));

    assert_command(&mut dap, b"\x7f", b"\xff");
    // batches do not nest
    assert_command(&mut dap, b"\x7f\x01\x7f\x01\x0a", b"\xff");
}

#[test]
fn queued_commands_answer_with_next_request() {
    let config = Config {
        vendor: "Example Probes".to_string(),
        ..Config::default()
    };
    let mut dap = probe_with(&config);

    assert_eq!(dap.transact(b"\x7e\x01\x09\xff\x00").unwrap(), None);
    assert_eq!(dap.transact(b"\x7e\x02\x00\x01\x09\xff\x00").unwrap(), None);

    let mut expected = vec![0x7f, 0x01, 0x09, 0x00, 0x7f, 0x02];
    expected.extend_from_slice(&info_string("Example Probes"));
    expected.extend_from_slice(b"\x09\x00");
    expected.extend_from_slice(&info_string("CMSIS-DAP"));
    assert_eq!(command(&mut dap, b"\x00\x02"), expected);

    // the queue is empty again
    assert_command(&mut dap, b"\x0a", b"\x0a\x00\x00");
}

/// 512-byte queued packet of 170 HostStatus commands that turn the connect LED on.
fn full_queue_packet() -> Vec<u8> {
    let mut packet = vec![0x7e, 0xaa];
    for _ in 0..170 {
        packet.extend_from_slice(b"\x01\x00\x01");
    }
    packet
}

#[test]
fn request_behind_full_queue_drops_queued_commands() {
    let mut dap = Dap::new(EmulatedPins::new(), &Config::default()).unwrap();
    for _ in 0..4 {
        assert_eq!(dap.transact(&full_queue_packet()).unwrap(), None);
    }
    assert_command(&mut dap, b"\x7f\x01\x00\x01", b"\xff");
    assert!(!dap.pins().level(Pin::LedConnect));
    assert_command(&mut dap, b"\x0a", b"\x0a\x00\x00");

    // a queued packet that does not fit is reported with the next request
    for _ in 0..5 {
        assert_eq!(dap.transact(&full_queue_packet()).unwrap(), None);
    }
    assert_command(&mut dap, b"\x0a", b"\xff");
    assert!(!dap.pins().level(Pin::LedConnect));
    assert_command(&mut dap, b"\x0a", b"\x0a\x00\x00");
}

#[test]
fn unknown_command_does_not_poison_next_request() {
    let mut dap = probe();
    assert_command(&mut dap, b"\x42\x01\x02", b"\xff");
    assert_command(&mut dap, b"\x0a", b"\x0a\x00\x00");
}
