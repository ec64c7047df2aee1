use bytes::BytesMut;
use dap_protocol::{
    codec::{DapCodec, MAX_FRAME_LEN},
    error::ReadError,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, ToSocketAddrs},
};
use tokio_util::codec::{Decoder, Encoder};

/// Request exchange with a probe on top of tokio.
pub struct AsyncDapClient {
    tcp: TcpStream,
    codec: DapCodec,
    read_buf: BytesMut,
}

impl AsyncDapClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> std::io::Result<AsyncDapClient> {
        let tcp = TcpStream::connect(addr).await?;
        tcp.set_nodelay(true)?;
        Ok(AsyncDapClient {
            tcp,
            codec: DapCodec::new(MAX_FRAME_LEN),
            read_buf: BytesMut::with_capacity(1024),
        })
    }

    /// Sends a packet without waiting for a response, as needed for queued commands.
    pub async fn send(&mut self, packet: &[u8]) -> Result<(), ReadError> {
        let mut frame = BytesMut::new();
        self.codec.encode(packet, &mut frame)?;
        self.tcp.write_all(&frame).await?;
        Ok(())
    }

    /// Waits for the next response packet.
    pub async fn receive(&mut self) -> Result<BytesMut, ReadError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buf)? {
                return Ok(frame);
            }
            if self.tcp.read_buf(&mut self.read_buf).await? == 0 {
                return Err(ReadError::IoError(std::io::ErrorKind::UnexpectedEof.into()));
            }
        }
    }

    pub async fn request(&mut self, packet: &[u8]) -> Result<BytesMut, ReadError> {
        self.send(packet).await?;
        self.receive().await
    }
}
