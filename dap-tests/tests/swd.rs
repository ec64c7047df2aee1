use dap_server::{Pin, PinMode};
use dap_tests::{Probe, assert_command, probe, restart_trace, trace};

fn swd_probe() -> Probe {
    let mut dap = probe();
    assert_command(&mut dap, b"\x02\x01", b"\x02\x01");
    assert_command(&mut dap, b"\x11\x20\x4e\x00\x00", b"\x11\x00");
    dap
}

#[test]
fn output_then_input_sequence() {
    let mut dap = swd_probe();
    restart_trace(&mut dap);
    dap.pins_mut()
        .set_swdio_input(b"\x02\x13\x24\x35\x46\x57\x68\x79\x8a\x9b\xac\xbd");
    assert_command(
        &mut dap,
        b"\x1d\x02\x20\x12\x34\x56\x78\x80",
        b"\x1d\x00\x46\x57\x68\x79\x8a\x9b\xac\xbd",
    );
    let trace = trace(&dap);
    assert_eq!(trace.clock_cycles(), 96);
    assert_eq!(
        trace.tms_swdio_dir(),
        b"\x00\x00\x00\x00\xff\xff\xff\xff\xff\xff\xff\xff"
    );
    assert_eq!(
        trace.tms_swdio_out(),
        b"\x12\x34\x56\x78\x46\x57\x68\x79\x8a\x9b\xac\xbd"
    );
    // SWDIO is driven again after an input sequence, at the last level written
    assert_eq!(dap.pins().mode(Pin::TmsSwdio), PinMode::output(false));
}

#[test]
fn partial_bytes_are_packed_lsb_first() {
    let mut dap = swd_probe();
    restart_trace(&mut dap);
    dap.pins_mut().set_swdio_input(b"\x00\x19\x08");
    assert_command(&mut dap, b"\x1d\x02\x07\xff\x8d", b"\x1d\x00\x32\x10");
    let trace = trace(&dap);
    assert_eq!(trace.clock_cycles(), 20);
    assert_eq!(trace.tms_swdio_dir(), b"\x80\xff\x0f");
    assert_eq!(trace.tms_swdio_out(), b"\x7f\x19\x08");
}

#[test]
fn sequence_on_other_port_keeps_response_shape() {
    let mut dap = swd_probe();
    assert_command(&mut dap, b"\x02\x02", b"\x02\x02");
    restart_trace(&mut dap);
    // 13 input cycles still answer with two (zero) bytes
    assert_command(&mut dap, b"\x1d\x02\x07\xff\x8d", b"\x1d\xff\x00\x00");
    assert_eq!(trace(&dap).clock_cycles(), 0);
    assert_command(&mut dap, b"\x02\x01", b"\x02\x01");
}

#[test]
fn truncated_sequences() {
    let mut dap = swd_probe();
    assert_command(&mut dap, b"\x1d", b"\xff");
    assert_command(&mut dap, b"\x1d\x01", b"\xff");
    assert_command(&mut dap, b"\x1d\x01\x08", b"\xff");
    assert_command(&mut dap, b"\x1d\x03\x08\xff\x80", b"\xff");
}

#[test]
fn configure_turnaround_and_data_phase() {
    let mut dap = swd_probe();
    assert_command(&mut dap, b"\x13\x07", b"\x13\x00");
    assert_eq!(dap.state().swd.turnaround_cycles, 4);
    assert!(dap.state().swd.data_phase);
    assert_command(&mut dap, b"\x13\x00", b"\x13\x00");
    assert_eq!(dap.state().swd.turnaround_cycles, 1);
    assert!(!dap.state().swd.data_phase);
    assert_command(&mut dap, b"\x13", b"\xff");
}
