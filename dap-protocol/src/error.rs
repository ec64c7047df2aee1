use std::{error::Error, fmt::Display, io};

/// Failure to read a length-prefixed DAP frame from a stream.
#[derive(Debug)]
pub enum ReadError {
    IoError(io::Error),
    /// The length prefix announces more bytes than the receiver accepts.
    TooManyBytes { max: usize, got: usize },
}

impl From<io::Error> for ReadError {
    fn from(value: io::Error) -> Self {
        ReadError::IoError(value)
    }
}

impl Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::IoError(error) => write!(f, "Frame I/O failed: {}", error),
            ReadError::TooManyBytes { max, got } => {
                write!(f, "DAP packet of {} bytes exceeds the limit of {}", got, max)
            }
        }
    }
}

impl Error for ReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReadError::IoError(error) => Some(error),
            ReadError::TooManyBytes { .. } => None,
        }
    }
}

