//! Probe state that survives between requests and is reset on every disconnect.
use dap_protocol::{MAX_JTAG_DEVICES, Port};

/// Instruction register layout of the JTAG scan chain.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct JtagChain {
    pub count: u8,
    /// Target device of DR scans, always smaller than `count` once a chain is configured.
    pub index: u8,
    pub ir_length: [u8; MAX_JTAG_DEVICES],
    /// IR bits of the devices in front of each device.
    pub ir_before: [u16; MAX_JTAG_DEVICES],
    /// IR bits of the devices behind each device.
    pub ir_after: [u16; MAX_JTAG_DEVICES],
}

impl JtagChain {
    /// Stores the IR lengths of a chain and derives the bypass bits around each device.
    ///
    /// Returns `false` and leaves the chain untouched if there are more devices than supported.
    pub fn configure(&mut self, ir_lengths: &[u8]) -> bool {
        if ir_lengths.len() > MAX_JTAG_DEVICES {
            return false;
        }
        let total: u16 = ir_lengths.iter().map(|&len| u16::from(len)).sum();
        let mut before = 0u16;
        *self = JtagChain {
            count: ir_lengths.len() as u8,
            index: 0,
            ..JtagChain::default()
        };
        for (i, &len) in ir_lengths.iter().enumerate() {
            self.ir_length[i] = len;
            self.ir_before[i] = before;
            before += u16::from(len);
            self.ir_after[i] = total - before;
        }
        true
    }

    /// Selects the target device. Returns `false` for an index outside the chain.
    pub fn select(&mut self, index: u8) -> bool {
        if index >= self.count {
            return false;
        }
        self.index = index;
        true
    }

    /// Devices behind the selected target, each adding one bypass bit to a DR scan.
    pub fn devices_after(&self) -> u8 {
        self.count.saturating_sub(self.index + 1)
    }
}

/// SWD line turnaround and the data phase after WAIT and FAULT acknowledges.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwdConfig {
    pub turnaround_cycles: u8,
    pub data_phase: bool,
}

impl Default for SwdConfig {
    fn default() -> Self {
        SwdConfig {
            turnaround_cycles: 1,
            data_phase: false,
        }
    }
}

impl SwdConfig {
    /// Decodes the configuration byte of [`dap_protocol::Command::SwdConfigure`].
    pub fn from_request(value: u8) -> SwdConfig {
        SwdConfig {
            turnaround_cycles: (value & 0x03) + 1,
            data_phase: value & 0x04 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransferConfig {
    /// Extra idle cycles after each transfer
    pub idle_cycles: u8,
    pub wait_retries: u16,
    pub match_retries: u16,
    pub match_mask: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            idle_cycles: 0,
            wait_retries: 100,
            match_retries: 0,
            match_mask: 0,
        }
    }
}

/// Host-selected SWO settings. Capture flags live in [`crate::swo::SwoCapture`]
/// because the UART reader updates them.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoState {
    pub transport: u8,
    pub mode: u8,
    pub baudrate: u32,
}

impl Default for SwoState {
    fn default() -> Self {
        SwoState {
            transport: 0,
            mode: 0,
            baudrate: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct LedState {
    pub connected: bool,
    pub running: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DriverState {
    pub port: Port,
    pub jtag: JtagChain,
    pub swd: SwdConfig,
    pub transfer: TransferConfig,
    pub swo: SwoState,
    pub leds: LedState,
}
