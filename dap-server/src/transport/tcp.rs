use std::{
    io::{self, ErrorKind, Read},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    time::Duration,
};

use dap_protocol::{
    codec::{self, LENGTH_PREFIX_LEN},
    error::ReadError,
};

use super::{Transport, TransportError};

/// Serves one host at a time over TCP. Requests and responses carry a 16-bit little-endian
/// length prefix.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    stream: Option<TcpStream>,
    poll_interval: Duration,
    timeout: Duration,
}

impl TcpTransport {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<TcpTransport> {
        Ok(TcpTransport {
            listener: TcpListener::bind(addr)?,
            stream: None,
            poll_interval: Duration::from_millis(50),
            timeout: Duration::from_secs(30),
        })
    }

    /// How long `recv` waits for the start of a request before returning
    /// [`TransportError::Retry`].
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Read and write timeout once a request has started
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Ok(addr) = stream.peer_addr() {
                log::info!("Closing connection to {}", addr);
            }
        }
    }

    fn accept(&mut self, stream: TcpStream) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.poll_interval))?;
        stream.set_write_timeout(Some(self.timeout))?;
        self.stream = Some(stream);
        Ok(())
    }
}

fn from_io(error: io::Error) -> TransportError {
    match error.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            TransportError::Shutdown
        }
        _ => TransportError::Io(error),
    }
}

fn from_read(error: ReadError) -> TransportError {
    match error {
        ReadError::IoError(error) => from_io(error),
        ReadError::TooManyBytes { max, got } => TransportError::TooLarge { max, got },
    }
}

/// Waits up to the read timeout of `stream` for the first byte of a request, then reads the
/// whole request with `timeout`.
fn receive(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<usize, TransportError> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    match stream.read(&mut prefix[..1]) {
        Ok(0) => return Err(TransportError::Shutdown),
        Ok(_) => {}
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
            ) =>
        {
            return Err(TransportError::Retry);
        }
        Err(err) => return Err(from_io(err)),
    }

    stream.set_read_timeout(Some(timeout))?;
    let result = stream
        .read_exact(&mut prefix[1..])
        .map_err(from_io)
        .and_then(|()| {
            codec::read_payload(stream, codec::decode_length(prefix), buf).map_err(from_read)
        });
    stream.set_read_timeout(Some(poll_interval))?;
    result
}

impl Transport for TcpTransport {
    fn name(&self) -> &str {
        "tcp"
    }

    fn init(&mut self) -> Result<(), TransportError> {
        self.listener.set_nonblocking(true)?;
        log::info!("Listening for connections on {}", self.listener.local_addr()?);
        Ok(())
    }

    fn configure(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        match self.listener.accept() {
            Ok((stream, addr)) => {
                log::info!("New client connection from {}", addr);
                self.accept(stream)?;
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(TransportError::Retry),
            Err(err) => Err(err.into()),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::Shutdown);
        };
        let result = receive(stream, buf, self.timeout, self.poll_interval);
        if let Err(err) = &result {
            if err.is_disconnect() {
                self.close();
            }
        }
        result
    }

    fn send(&mut self, packet: &[u8]) -> Result<usize, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::Shutdown);
        };
        match codec::write_frame(stream, packet) {
            Ok(()) => Ok(packet.len()),
            Err(err) => {
                self.close();
                Err(from_io(err))
            }
        }
    }
}
