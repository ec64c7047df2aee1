//! SWO capture from a serial port.
//!
//! The tty is switched to raw mode and read on a separate thread. Received bytes go into the
//! trace buffer of the probe through its [`SwoSink`].
use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind, Read},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use dap_server::swo::{SwoSink, SwoUart};
use nix::sys::termios::{self, BaudRate, SetArg, SpecialCharacterIndices};

fn baud_rate(rate: u32) -> io::Result<BaudRate> {
    Ok(match rate {
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        460_800 => BaudRate::B460800,
        500_000 => BaudRate::B500000,
        576_000 => BaudRate::B576000,
        921_600 => BaudRate::B921600,
        1_000_000 => BaudRate::B1000000,
        1_152_000 => BaudRate::B1152000,
        1_500_000 => BaudRate::B1500000,
        2_000_000 => BaudRate::B2000000,
        2_500_000 => BaudRate::B2500000,
        3_000_000 => BaudRate::B3000000,
        3_500_000 => BaudRate::B3500000,
        4_000_000 => BaudRate::B4000000,
        other => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("Unsupported baudrate {}", other),
            ));
        }
    })
}

/// A tty receiving SWO in UART (NRZ) mode.
pub struct SwoTty {
    file: File,
    stop: Arc<AtomicBool>,
}

impl SwoTty {
    /// Opens `path` in raw mode at `baudrate` and starts forwarding received bytes to `sink`.
    pub fn open(path: impl AsRef<Path>, baudrate: u32, sink: SwoSink) -> io::Result<SwoTty> {
        let path = path.as_ref();
        log::debug!("Opening SWO tty: {}", path.display());
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut attrs = termios::tcgetattr(&file)?;
        termios::cfmakeraw(&mut attrs);
        // return after 100 ms without data so that the reader notices a stop request
        attrs.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        attrs.control_chars[SpecialCharacterIndices::VTIME as usize] = 1;
        termios::cfsetspeed(&mut attrs, baud_rate(baudrate)?)?;
        termios::tcsetattr(&file, SetArg::TCSANOW, &attrs)?;

        let stop = Arc::new(AtomicBool::new(false));
        let reader = file.try_clone()?;
        let reader_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("swo-reader".to_string())
            .spawn(move || read_loop(reader, sink, &reader_stop))?;
        log::info!("Capturing SWO from {} at {} baud", path.display(), baudrate);
        Ok(SwoTty { file, stop })
    }
}

fn read_loop(mut tty: File, sink: SwoSink, stop: &AtomicBool) {
    let mut buf = [0u8; 256];
    while !stop.load(Ordering::Acquire) {
        match tty.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                let stored = sink.push(&buf[..n]);
                log::trace!("SWO received {} bytes, stored {}", n, stored);
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                log::error!("SWO read failed: {}", err);
                sink.report_error();
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
    log::debug!("SWO reader stopped");
}

impl SwoUart for SwoTty {
    fn set_baudrate(&mut self, baudrate: u32) -> io::Result<()> {
        let mut attrs = termios::tcgetattr(&self.file)?;
        termios::cfsetspeed(&mut attrs, baud_rate(baudrate)?)?;
        termios::tcsetattr(&self.file, SetArg::TCSANOW, &attrs)?;
        log::info!("SWO baudrate set to {}", baudrate);
        Ok(())
    }
}

impl Drop for SwoTty {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[test]
fn standard_rates_are_supported() {
    assert!(baud_rate(115_200).is_ok());
    assert!(baud_rate(2_000_000).is_ok());
    assert_eq!(
        baud_rate(123_456).map_err(|e| e.kind()).unwrap_err(),
        ErrorKind::InvalidInput
    );
}
