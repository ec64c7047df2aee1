use std::{error::Error, fmt::Display, io};

use dap_protocol::{Command, error::ReadError};

#[derive(Debug)]
pub enum ClientError {
    Read(ReadError),
    /// The probe answered a command with the error status.
    Rejected(Command),
    /// The response did not start with the command id or was too short.
    UnexpectedResponse { command: Command, response: Box<[u8]> },
}

impl From<ReadError> for ClientError {
    fn from(value: ReadError) -> Self {
        ClientError::Read(value)
    }
}

impl From<io::Error> for ClientError {
    fn from(value: io::Error) -> Self {
        ClientError::Read(ReadError::IoError(value))
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Read(error) => write!(f, "{}", error),
            ClientError::Rejected(command) => write!(f, "Probe rejected {:?}", command),
            ClientError::UnexpectedResponse { command, response } => {
                write!(f, "Unexpected response to {:?}: {:02x?}", command, response)
            }
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::Read(error) => Some(error),
            _ => None,
        }
    }
}
