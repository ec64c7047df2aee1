//! SWO trace capture.
//!
//! Trace bytes arrive on a UART reader thread and are handed over through a [`SwoSink`].
//! The command loop drains them with the SWO data command. Both sides share one bounded
//! buffer behind a mutex; the capture, error and overrun flags are atomics so that the status
//! commands never wait for the reader.
use std::{
    io,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use dap_protocol::trace_status;

use crate::{buffer::RingBuffer, error::BufferError};

/// Baudrate control of the UART that receives SWO.
pub trait SwoUart: Send {
    fn set_baudrate(&mut self, baudrate: u32) -> io::Result<()>;
}

#[derive(Debug)]
struct Shared {
    buffer: Mutex<RingBuffer>,
    capture: AtomicBool,
    error: AtomicBool,
    overrun: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RingBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer side of the trace buffer, handed to the UART reader.
#[derive(Debug, Clone)]
pub struct SwoSink {
    shared: Arc<Shared>,
}

impl SwoSink {
    /// Appends received trace bytes while capture is enabled.
    ///
    /// Bytes that do not fit are dropped and flag an overrun. Returns the number of bytes stored.
    pub fn push(&self, data: &[u8]) -> usize {
        if !self.shared.capture.load(Ordering::Acquire) {
            return 0;
        }
        let written = self.shared.lock().put(data);
        if written < data.len() {
            self.shared.overrun.store(true, Ordering::Release);
        }
        written
    }

    /// Flags a framing or line error of the UART.
    pub fn report_error(&self) {
        if self.shared.capture.load(Ordering::Acquire) {
            self.shared.error.store(true, Ordering::Release);
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.capture.load(Ordering::Acquire)
    }
}

pub struct SwoCapture {
    shared: Arc<Shared>,
    uart: Option<Box<dyn SwoUart>>,
}

impl SwoCapture {
    pub fn new(capacity: usize) -> SwoCapture {
        SwoCapture {
            shared: Arc::new(Shared {
                buffer: Mutex::new(RingBuffer::new(capacity)),
                capture: AtomicBool::new(false),
                error: AtomicBool::new(false),
                overrun: AtomicBool::new(false),
            }),
            uart: None,
        }
    }

    pub fn sink(&self) -> SwoSink {
        SwoSink {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn set_uart(&mut self, uart: Box<dyn SwoUart>) {
        self.uart = Some(uart);
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().capacity()
    }

    /// Number of buffered trace bytes
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starting a capture drops old data and clears the overrun flag.
    /// Stopping clears the error flag.
    pub fn set_capture(&mut self, enable: bool) {
        if enable {
            let mut buffer = self.shared.lock();
            buffer.reset();
            self.shared.overrun.store(false, Ordering::Release);
            self.shared.capture.store(true, Ordering::Release);
        } else {
            self.shared.capture.store(false, Ordering::Release);
            self.shared.error.store(false, Ordering::Release);
        }
    }

    /// Stops the capture and drops all buffered data and flags.
    pub fn reset(&mut self) {
        self.set_capture(false);
        self.shared.overrun.store(false, Ordering::Release);
        self.shared.lock().reset();
    }

    /// Trace status byte of the SWO status commands.
    pub fn status(&self) -> u8 {
        let mut status = 0;
        if self.shared.capture.load(Ordering::Acquire) {
            status |= trace_status::CAPTURE;
        }
        if self.shared.error.load(Ordering::Acquire) {
            status |= trace_status::ERROR;
        }
        if self.shared.overrun.load(Ordering::Acquire) {
            status |= trace_status::OVERRUN;
        }
        status
    }

    /// Reconfigures the UART. Without a UART the rate is accepted as is.
    pub fn configure_baudrate(&mut self, baudrate: u32) -> io::Result<()> {
        match self.uart.as_mut() {
            Some(uart) => uart.set_baudrate(baudrate),
            None => Ok(()),
        }
    }

    /// Moves up to `max` trace bytes into `response` and returns how many were moved.
    pub fn drain_into(&self, max: usize, response: &mut RingBuffer) -> Result<usize, BufferError> {
        let mut buffer = self.shared.lock();
        let mut count = 0;
        while count < max {
            // a claim stops at the wrap point of either ring
            let n = {
                let source = buffer.get_claim(max - count);
                let target = response.put_claim(source.len());
                let n = target.len();
                target.copy_from_slice(&source[..n]);
                n
            };
            if n == 0 {
                break;
            }
            buffer.get_finish(n)?;
            response.put_finish(n)?;
            count += n;
        }
        Ok(count)
    }
}
