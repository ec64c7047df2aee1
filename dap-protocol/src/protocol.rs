use std::fmt::Display;

/// Version of the CMSIS-DAP protocol implemented by the probe, as reported by [`InfoId::ProtocolVersion`].
pub const PROTOCOL_VERSION: &str = "2.1.1";

/// Maximum number of devices in a JTAG scan chain.
pub const MAX_JTAG_DEVICES: usize = 4;

/// A command id is the first byte of every request and is echoed as the first byte of its response.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Query vendor strings, capabilities and buffer sizes.
    Info = 0x00,
    /// Drive the connect and running status indicators.
    HostStatus = 0x01,
    /// Configure the pins for SWD or JTAG.
    Connect = 0x02,
    /// Release all pins.
    Disconnect = 0x03,
    /// Configure idle cycles and retry limits used by register transfers.
    TransferConfigure = 0x04,
    /// Up to 255 DP/AP register reads and writes.
    Transfer = 0x05,
    /// One DP/AP register access repeated up to 65535 times.
    TransferBlock = 0x06,
    /// Abort a running transfer. Produces no response bytes.
    TransferAbort = 0x07,
    /// Write the DP ABORT register.
    WriteAbort = 0x08,
    /// Sleep for a number of microseconds.
    Delay = 0x09,
    /// Execute the device specific reset sequence.
    ResetTarget = 0x0a,
    /// Drive and read back the SWD/JTAG pins directly.
    SwjPins = 0x10,
    /// Set the SWD/JTAG clock rate.
    SwjClock = 0x11,
    /// Clock out a TMS/SWDIO bit sequence.
    SwjSequence = 0x12,
    /// Configure SWD turnaround and data phase.
    SwdConfigure = 0x13,
    /// Clock out JTAG TMS/TDI sequences and capture TDO.
    JtagSequence = 0x14,
    /// Configure the instruction register lengths of the scan chain.
    JtagConfigure = 0x15,
    /// Read the IDCODE of one device in the scan chain.
    JtagIdcode = 0x16,
    /// Select how captured trace data is delivered.
    SwoTransport = 0x17,
    /// Select the SWO capture mode.
    SwoMode = 0x18,
    /// Configure the SWO UART baudrate.
    SwoBaudrate = 0x19,
    /// Start or stop trace capture.
    SwoControl = 0x1a,
    /// Query trace status and buffered byte count.
    SwoStatus = 0x1b,
    /// Read captured trace bytes.
    SwoData = 0x1c,
    /// Clock out or capture SWDIO sequences.
    SwdSequence = 0x1d,
    /// Query selected trace status fields.
    SwoExtendedStatus = 0x1e,
    /// Batch of commands whose processing is deferred until a non-queued request arrives.
    QueueCommands = 0x7e,
    /// Batch of commands executed back-to-back within one request.
    ExecuteCommands = 0x7f,
}

impl TryFrom<u8> for Command {
    /// The unknown command id
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Command::Info,
            0x01 => Command::HostStatus,
            0x02 => Command::Connect,
            0x03 => Command::Disconnect,
            0x04 => Command::TransferConfigure,
            0x05 => Command::Transfer,
            0x06 => Command::TransferBlock,
            0x07 => Command::TransferAbort,
            0x08 => Command::WriteAbort,
            0x09 => Command::Delay,
            0x0a => Command::ResetTarget,
            0x10 => Command::SwjPins,
            0x11 => Command::SwjClock,
            0x12 => Command::SwjSequence,
            0x13 => Command::SwdConfigure,
            0x14 => Command::JtagSequence,
            0x15 => Command::JtagConfigure,
            0x16 => Command::JtagIdcode,
            0x17 => Command::SwoTransport,
            0x18 => Command::SwoMode,
            0x19 => Command::SwoBaudrate,
            0x1a => Command::SwoControl,
            0x1b => Command::SwoStatus,
            0x1c => Command::SwoData,
            0x1d => Command::SwdSequence,
            0x1e => Command::SwoExtendedStatus,
            0x7e => Command::QueueCommands,
            0x7f => Command::ExecuteCommands,
            other => return Err(other),
        })
    }
}

impl From<Command> for u8 {
    fn from(value: Command) -> Self {
        value as u8
    }
}

#[test]
fn command_ids_round_trip() {
    for id in 0..=u8::MAX {
        if let Ok(command) = Command::try_from(id) {
            assert_eq!(u8::from(command), id);
        }
    }
    assert_eq!(Command::try_from(0x0b), Err(0x0b));
}

/// Generic status byte found in most responses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    Error = 0xff,
}

impl Status {
    pub fn from_ok(ok: bool) -> Status {
        if ok { Status::Ok } else { Status::Error }
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        value as u8
    }
}

/// Electrical configuration of the debug pins.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum Port {
    #[default]
    Disabled = 0,
    Swd = 1,
    Jtag = 2,
}

impl Port {
    /// Decodes the port requested by a connect command. `0` selects the default port
    /// and is reported as `Ok(None)`.
    pub fn from_connect_request(value: u8) -> Result<Option<Port>, u8> {
        match value {
            0 => Ok(None),
            1 => Ok(Some(Port::Swd)),
            2 => Ok(Some(Port::Jtag)),
            other => Err(other),
        }
    }
}

impl Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Port::Disabled => write!(f, "disabled"),
            Port::Swd => write!(f, "SWD"),
            Port::Jtag => write!(f, "JTAG"),
        }
    }
}

/// Information ids understood by [`Command::Info`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum InfoId {
    Vendor = 0x01,
    Product = 0x02,
    SerialNumber = 0x03,
    ProtocolVersion = 0x04,
    TargetDeviceVendor = 0x05,
    TargetDeviceName = 0x06,
    TargetBoardVendor = 0x07,
    TargetBoardName = 0x08,
    FirmwareVersion = 0x09,
    Capabilities = 0xf0,
    TestDomainTimer = 0xf1,
    UartReceiveBufferSize = 0xfb,
    UartTransmitBufferSize = 0xfc,
    SwoBufferSize = 0xfd,
    MaxPacketCount = 0xfe,
    MaxPacketSize = 0xff,
}

impl TryFrom<u8> for InfoId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => InfoId::Vendor,
            0x02 => InfoId::Product,
            0x03 => InfoId::SerialNumber,
            0x04 => InfoId::ProtocolVersion,
            0x05 => InfoId::TargetDeviceVendor,
            0x06 => InfoId::TargetDeviceName,
            0x07 => InfoId::TargetBoardVendor,
            0x08 => InfoId::TargetBoardName,
            0x09 => InfoId::FirmwareVersion,
            0xf0 => InfoId::Capabilities,
            0xf1 => InfoId::TestDomainTimer,
            0xfb => InfoId::UartReceiveBufferSize,
            0xfc => InfoId::UartTransmitBufferSize,
            0xfd => InfoId::SwoBufferSize,
            0xfe => InfoId::MaxPacketCount,
            0xff => InfoId::MaxPacketSize,
            other => return Err(other),
        })
    }
}

/// Bits of the capabilities byte returned for [`InfoId::Capabilities`].
pub struct Capabilities;

impl Capabilities {
    pub const SWD: u8 = 0x01;
    pub const JTAG: u8 = 0x02;
    pub const SWO_UART: u8 = 0x04;
    pub const SWO_MANCHESTER: u8 = 0x08;
    pub const ATOMIC_COMMANDS: u8 = 0x10;
    pub const TEST_DOMAIN_TIMER: u8 = 0x20;
    pub const SWO_STREAMING_TRACE: u8 = 0x40;
}

/// Acknowledge bits reported in the `ack` field of transfer responses.
pub mod ack {
    pub const OK: u8 = 0x01;
    pub const WAIT: u8 = 0x02;
    pub const FAULT: u8 = 0x04;
    /// Protocol error, including a data parity mismatch.
    pub const ERROR: u8 = 0x08;
    /// Set in addition to the wire acknowledge when a match read never matched.
    pub const MISMATCH: u8 = 0x10;
}

/// One request byte of a transfer command.
///
/// The low nibble addresses the register, the upper bits select value matching.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransferRequest(u8);

impl TransferRequest {
    pub const AP_N_DP: u8 = 0x01;
    pub const R_N_W: u8 = 0x02;
    pub const A2: u8 = 0x04;
    pub const A3: u8 = 0x08;
    pub const MATCH_VALUE: u8 = 0x10;
    pub const MATCH_MASK: u8 = 0x20;

    /// Read of the DP RDBUFF register, used to collect posted results.
    pub const RDBUFF_READ: TransferRequest =
        TransferRequest(Self::R_N_W | Self::A2 | Self::A3);
    /// Write of the DP ABORT register.
    pub const ABORT_WRITE: TransferRequest = TransferRequest(0x00);

    pub fn new(value: u8) -> TransferRequest {
        TransferRequest(value)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Targets an access port register instead of a debug port register
    pub fn is_ap(&self) -> bool {
        self.0 & Self::AP_N_DP != 0
    }

    pub fn is_read(&self) -> bool {
        self.0 & Self::R_N_W != 0
    }

    pub fn a2(&self) -> bool {
        self.0 & Self::A2 != 0
    }

    pub fn a3(&self) -> bool {
        self.0 & Self::A3 != 0
    }

    pub fn has_match_value(&self) -> bool {
        self.0 & Self::MATCH_VALUE != 0
    }

    pub fn has_match_mask(&self) -> bool {
        self.0 & Self::MATCH_MASK != 0
    }

    /// Whether a 32-bit data word follows this request byte on the wire.
    pub fn carries_data(&self) -> bool {
        !self.is_read() || self.has_match_value()
    }
}

impl From<u8> for TransferRequest {
    fn from(value: u8) -> Self {
        TransferRequest(value)
    }
}

#[test]
fn transfer_request_data_words() {
    assert!(TransferRequest::new(0x04).carries_data());
    assert!(!TransferRequest::new(0x06).carries_data());
    assert!(TransferRequest::new(0x1f).carries_data());
    assert!(TransferRequest::new(0x20).carries_data());
    assert_eq!(TransferRequest::RDBUFF_READ.bits(), 0x0e);
}

/// Trace status bits reported by the SWO status commands.
pub mod trace_status {
    pub const CAPTURE: u8 = 0x01;
    pub const ERROR: u8 = 0x40;
    pub const OVERRUN: u8 = 0x80;
}

/// SWO capture modes.
pub mod swo_mode {
    pub const OFF: u8 = 0x00;
    pub const UART: u8 = 0x01;
    pub const MANCHESTER: u8 = 0x02;
}

/// SWO trace delivery transports.
pub mod swo_transport {
    pub const NONE: u8 = 0x00;
    /// Trace data is read with the SWO data command.
    pub const COMMAND: u8 = 0x01;
    pub const ENDPOINT: u8 = 0x02;
}
