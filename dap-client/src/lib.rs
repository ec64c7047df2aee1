//! # CMSIS-DAP Client
//!
//! A client library for talking to CMSIS-DAP probes that are reachable over TCP, such as the
//! `dap-gpio` server.
//!
//! ## Overview
//!
//! Requests and responses travel as length-prefixed frames (see
//! [`dap_protocol::codec`]). [`DapClient`] sends raw request packets and offers typed helpers
//! for the commands a host needs to bring up a debug connection:
//!
//! - **Info**: vendor strings, capabilities and packet sizes
//! - **Connect / Disconnect**: select SWD or JTAG
//! - **SWJ clock and sequences**: line resets and protocol switch sequences
//! - **Transfers**: single DP/AP register accesses and block transfers
//!
//! [`AsyncDapClient`] provides the raw request exchange on top of tokio.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use dap_client::DapClient;
//! use dap_protocol::{Port, TransferRequest};
//!
//! let mut client = DapClient::new("127.0.0.1:9000")?;
//! client.swj_clock(4_000_000)?;
//! assert_eq!(client.connect(Some(Port::Swd))?, Port::Swd);
//!
//! // line reset, then read DP IDCODE
//! client.swj_sequence(51, &[0xff; 7])?;
//! let response = client.transfer(0, &[(TransferRequest::new(0x02), 0)])?;
//! println!("IDCODE: {:08x}", response.data[0]);
//! ```
//!
//! ## Related Crates
//!
//! - [`dap_server`](https://docs.rs/dap-server/) - Probe engine and server
//! - [`dap_protocol`](https://docs.rs/dap-protocol/) - Protocol definitions and framing
use std::net::{TcpStream, ToSocketAddrs};

use dap_protocol::{
    Command, InfoId, Port, Status, TransferRequest,
    codec::{self, MAX_FRAME_LEN},
};

pub mod error;
mod tokio_client;

pub use error::ClientError;
pub use tokio_client::AsyncDapClient;

/// Result of a transfer command.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferResponse {
    /// Number of requests that completed
    pub count: u16,
    /// Acknowledge of the last executed request
    pub ack: u8,
    /// Read data, in request order
    pub data: Vec<u32>,
}

/// Blocking client for a single probe connection.
pub struct DapClient {
    tcp: TcpStream,
}

fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl DapClient {
    pub fn new(addr: impl ToSocketAddrs) -> std::io::Result<DapClient> {
        let tcp = TcpStream::connect(addr)?;
        tcp.set_nodelay(true)?;
        Ok(DapClient { tcp })
    }

    /// Sends a raw request packet and returns the raw response.
    pub fn request(&mut self, packet: &[u8]) -> Result<Box<[u8]>, ClientError> {
        codec::write_frame(&mut self.tcp, packet)?;
        Ok(codec::read_frame(&mut self.tcp, MAX_FRAME_LEN)?)
    }

    /// Sends a packet of queued commands. The probe answers it together with the next
    /// request that is not queued.
    pub fn queue(&mut self, commands: &[&[u8]]) -> Result<(), ClientError> {
        let mut packet = vec![Command::QueueCommands.into(), commands.len() as u8];
        for command in commands {
            packet.extend_from_slice(command);
        }
        codec::write_frame(&mut self.tcp, &packet)?;
        Ok(())
    }

    /// Sends `command` with `params` and checks that the response echoes the command id and
    /// carries at least `min_len` bytes after it.
    fn command(
        &mut self,
        command: Command,
        params: &[u8],
        min_len: usize,
    ) -> Result<Box<[u8]>, ClientError> {
        let mut packet = Vec::with_capacity(params.len() + 1);
        packet.push(command.into());
        packet.extend_from_slice(params);
        let response = self.request(&packet)?;
        if response.first() != Some(&u8::from(command)) || response.len() < min_len + 1 {
            return Err(ClientError::UnexpectedResponse { command, response });
        }
        Ok(response)
    }

    /// Commands that only answer with a status byte
    fn status_command(&mut self, command: Command, params: &[u8]) -> Result<(), ClientError> {
        let response = self.command(command, params, 1)?;
        if response[1] == u8::from(Status::Ok) {
            Ok(())
        } else {
            Err(ClientError::Rejected(command))
        }
    }

    /// Raw info bytes, `None` if the probe has no value for `id`.
    pub fn info(&mut self, id: InfoId) -> Result<Option<Box<[u8]>>, ClientError> {
        let response = self.command(Command::Info, &[id as u8], 1)?;
        let len = usize::from(response[1]);
        if len == 0 {
            return Ok(None);
        }
        match response.get(2..2 + len) {
            Some(value) => Ok(Some(value.into())),
            None => Err(ClientError::UnexpectedResponse {
                command: Command::Info,
                response,
            }),
        }
    }

    /// One of the string info values, without the terminating NUL.
    pub fn info_string(&mut self, id: InfoId) -> Result<Option<String>, ClientError> {
        Ok(self.info(id)?.map(|bytes| {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }))
    }

    pub fn capabilities(&mut self) -> Result<u8, ClientError> {
        Ok(self
            .info(InfoId::Capabilities)?
            .and_then(|bytes| bytes.first().copied())
            .unwrap_or(0))
    }

    pub fn packet_size(&mut self) -> Result<u16, ClientError> {
        let size = self.info(InfoId::MaxPacketSize)?;
        match size.as_deref() {
            Some([low, high, ..]) => Ok(u16::from_le_bytes([*low, *high])),
            _ => Err(ClientError::Rejected(Command::Info)),
        }
    }

    /// Selects a port, `None` for the probe's default. Returns the configured port.
    pub fn connect(&mut self, port: Option<Port>) -> Result<Port, ClientError> {
        let requested = port.map(|port| port as u8).unwrap_or(0);
        let response = self.command(Command::Connect, &[requested], 1)?;
        match Port::from_connect_request(response[1]) {
            Ok(Some(port)) => Ok(port),
            _ => Err(ClientError::Rejected(Command::Connect)),
        }
    }

    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        self.status_command(Command::Disconnect, &[])
    }

    pub fn swj_clock(&mut self, rate_hz: u32) -> Result<(), ClientError> {
        self.status_command(Command::SwjClock, &rate_hz.to_le_bytes())
    }

    /// Clocks out `bits` (1 to 256) TMS/SWDIO bits of `data`, LSB first.
    pub fn swj_sequence(&mut self, bits: usize, data: &[u8]) -> Result<(), ClientError> {
        let mut params = vec![(bits % 256) as u8];
        params.extend_from_slice(&data[..bits.div_ceil(8).min(data.len())]);
        self.status_command(Command::SwjSequence, &params)
    }

    pub fn transfer_configure(
        &mut self,
        idle_cycles: u8,
        wait_retries: u16,
        match_retries: u16,
    ) -> Result<(), ClientError> {
        let mut params = vec![idle_cycles];
        params.extend_from_slice(&wait_retries.to_le_bytes());
        params.extend_from_slice(&match_retries.to_le_bytes());
        self.status_command(Command::TransferConfigure, &params)
    }

    /// Runs register accesses. The value of each request is sent for writes and value matches
    /// and ignored otherwise.
    pub fn transfer(
        &mut self,
        index: u8,
        requests: &[(TransferRequest, u32)],
    ) -> Result<TransferResponse, ClientError> {
        let mut params = vec![index, requests.len() as u8];
        for (request, value) in requests {
            params.push(request.bits());
            if request.carries_data() {
                params.extend_from_slice(&value.to_le_bytes());
            }
        }
        let response = self.command(Command::Transfer, &params, 2)?;
        Ok(TransferResponse {
            count: response[1].into(),
            ack: response[2],
            data: words(&response[3..]),
        })
    }

    /// Reads one register `count` times.
    pub fn read_block(
        &mut self,
        index: u8,
        request: TransferRequest,
        count: u16,
    ) -> Result<TransferResponse, ClientError> {
        let mut params = vec![index];
        params.extend_from_slice(&count.to_le_bytes());
        params.push(request.bits() | TransferRequest::R_N_W);
        self.transfer_block(&params)
    }

    /// Writes every word of `data` to one register.
    pub fn write_block(
        &mut self,
        index: u8,
        request: TransferRequest,
        data: &[u32],
    ) -> Result<TransferResponse, ClientError> {
        let mut params = vec![index];
        params.extend_from_slice(&(data.len() as u16).to_le_bytes());
        params.push(request.bits() & !TransferRequest::R_N_W);
        for word in data {
            params.extend_from_slice(&word.to_le_bytes());
        }
        self.transfer_block(&params)
    }

    fn transfer_block(&mut self, params: &[u8]) -> Result<TransferResponse, ClientError> {
        let response = self.command(Command::TransferBlock, params, 3)?;
        Ok(TransferResponse {
            count: u16::from_le_bytes([response[1], response[2]]),
            ack: response[3],
            data: words(&response[4..]),
        })
    }

    pub fn write_abort(&mut self, index: u8, value: u32) -> Result<(), ClientError> {
        let mut params = vec![index];
        params.extend_from_slice(&value.to_le_bytes());
        self.status_command(Command::WriteAbort, &params)
    }

    pub fn jtag_configure(&mut self, ir_lengths: &[u8]) -> Result<(), ClientError> {
        let mut params = vec![ir_lengths.len() as u8];
        params.extend_from_slice(ir_lengths);
        self.status_command(Command::JtagConfigure, &params)
    }

    pub fn jtag_idcode(&mut self, index: u8) -> Result<u32, ClientError> {
        let response = self.command(Command::JtagIdcode, &[index], 5)?;
        if response[1] != u8::from(Status::Ok) {
            return Err(ClientError::Rejected(Command::JtagIdcode));
        }
        Ok(u32::from_le_bytes([
            response[2],
            response[3],
            response[4],
            response[5],
        ]))
    }

    /// Trace status and number of buffered SWO bytes.
    pub fn swo_status(&mut self) -> Result<(u8, u32), ClientError> {
        let response = self.command(Command::SwoStatus, &[], 5)?;
        Ok((
            response[1],
            u32::from_le_bytes([response[2], response[3], response[4], response[5]]),
        ))
    }

    /// Fetches up to `max` captured trace bytes.
    pub fn swo_data(&mut self, max: u16) -> Result<(u8, Box<[u8]>), ClientError> {
        let response = self.command(Command::SwoData, &max.to_le_bytes(), 3)?;
        let len = usize::from(u16::from_le_bytes([response[2], response[3]]));
        match response.get(4..4 + len) {
            Some(data) => Ok((response[1], data.into())),
            None => Err(ClientError::UnexpectedResponse {
                command: Command::SwoData,
                response,
            }),
        }
    }
}

#[test]
fn words_ignore_trailing_bytes() {
    assert_eq!(words(&[1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 7]), vec![1, u32::MAX]);
}
