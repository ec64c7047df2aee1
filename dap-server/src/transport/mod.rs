//! Packet transports between the debug host and the command loop.
//!
//! A transport delivers whole request packets and sends whole response packets. How packets
//! are delimited on the link is up to the transport: USB uses endpoint packets,
//! [`tcp::TcpTransport`] uses the length prefix from [`dap_protocol::codec`].
use std::{error::Error, fmt::Display, io};

pub mod tcp;

#[derive(Debug)]
pub enum TransportError {
    /// Nothing happened before the poll interval ran out. Try again later.
    Retry,
    /// The peer closed the connection.
    Shutdown,
    /// A request larger than the receive buffer. The connection has been closed.
    TooLarge { max: usize, got: usize },
    Io(io::Error),
}

impl TransportError {
    /// Errors after which the transport has dropped its peer.
    pub fn is_disconnect(&self) -> bool {
        !matches!(self, TransportError::Retry)
    }
}

impl From<io::Error> for TransportError {
    fn from(value: io::Error) -> Self {
        TransportError::Io(value)
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Retry => write!(f, "No data available"),
            TransportError::Shutdown => write!(f, "Peer closed the connection"),
            TransportError::TooLarge { max, got } => {
                write!(f, "Request too large! Maximum is {}, but got {}", max, got)
            }
            TransportError::Io(error) => write!(f, "{}", error),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Io(error) => Some(error),
            _ => None,
        }
    }
}

/// A link to the debug host.
///
/// The command loop calls [`Transport::init`] once, then polls [`Transport::configure`] until
/// a peer is available. From then on it alternates [`Transport::recv`] and
/// [`Transport::send`] until either of them reports a disconnect.
pub trait Transport: Send {
    fn name(&self) -> &str;

    /// Acquires the resources of the transport, for example a listening socket.
    fn init(&mut self) -> Result<(), TransportError>;

    /// Accepts a peer if one is waiting. Returns [`TransportError::Retry`] otherwise.
    fn configure(&mut self) -> Result<(), TransportError>;

    /// Receives one request packet into `buf` and returns its length.
    ///
    /// May return [`TransportError::Retry`] when no request arrived within the poll interval,
    /// so that the command loop can check for a stop request.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Sends one response packet and returns the number of payload bytes sent.
    fn send(&mut self, packet: &[u8]) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn init(&mut self) -> Result<(), TransportError> {
        (**self).init()
    }

    fn configure(&mut self) -> Result<(), TransportError> {
        (**self).configure()
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).recv(buf)
    }

    fn send(&mut self, packet: &[u8]) -> Result<usize, TransportError> {
        (**self).send(packet)
    }
}
