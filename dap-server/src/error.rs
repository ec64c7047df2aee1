use std::{error::Error, fmt::Display, io};

use crate::Pin;

/// A pin could not be switched to the requested mode.
///
/// Continuing with an unknown pin direction risks driving against the target,
/// so this error ends the command loop.
#[derive(Debug)]
pub struct PinError {
    pin: Pin,
    source: io::Error,
}

impl PinError {
    pub fn new(pin: Pin, source: io::Error) -> PinError {
        PinError { pin, source }
    }

    pub fn pin(&self) -> Pin {
        self.pin
    }
}

impl Display for PinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to configure pin {}: {}", self.pin, self.source)
    }
}

impl Error for PinError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Errors of the bounded byte buffers. Failed operations leave the buffer untouched.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BufferError {
    Underflow { needed: usize, available: usize },
    Overflow { needed: usize, available: usize },
}

impl Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Underflow { needed, available } => {
                write!(f, "Buffer underflow: needed {}, {} available", needed, available)
            }
            BufferError::Overflow { needed, available } => {
                write!(f, "Buffer overflow: needed {}, {} free", needed, available)
            }
        }
    }
}

impl Error for BufferError {}

/// Errors that abort the processing of one request.
#[derive(Debug)]
pub enum CommandError {
    /// The request ended before a field the command expects.
    Truncated,
    /// The response did not fit into the response buffer.
    Overflow,
    /// A request packet did not fit behind the queued ones and the queue was dropped.
    RequestOverflow,
    /// Command id without a handler.
    Unsupported(u8),
    Pin(PinError),
}

impl From<BufferError> for CommandError {
    fn from(value: BufferError) -> Self {
        match value {
            BufferError::Underflow { .. } => CommandError::Truncated,
            BufferError::Overflow { .. } => CommandError::Overflow,
        }
    }
}

impl From<PinError> for CommandError {
    fn from(value: PinError) -> Self {
        CommandError::Pin(value)
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Truncated => write!(f, "Request is missing bytes"),
            CommandError::Overflow => write!(f, "Response exceeds the response buffer"),
            CommandError::RequestOverflow => {
                write!(f, "Queued requests were dropped after a request overflow")
            }
            CommandError::Unsupported(id) => write!(f, "Unsupported command 0x{:02x}", id),
            CommandError::Pin(error) => write!(f, "{}", error),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CommandError::Pin(error) => Some(error),
            _ => None,
        }
    }
}
