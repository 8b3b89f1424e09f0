//! Per-connection session state

use core::fmt;

use avrprog_core::device::{DeviceDescriptor, FuseBytes, LockFuseAccess, Signature};

/// Part identified during discovery
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// Signature not in the device table, or not an Atmel part
    #[default]
    Unknown,
    /// Part name from the device table
    Known(String),
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Unknown => write!(f, "unknown device"),
            DeviceType::Known(name) => write!(f, "{}", name),
        }
    }
}

/// What the host learned while establishing the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Baud rate the programmer answered at
    pub baud_rate: u32,
    /// Programmer identifier and version, e.g. `AVRSPRG version 00`
    pub identifier: String,
    /// Identified part
    pub device_type: DeviceType,
    /// Raw signature read from the part
    pub signature: Signature,
    /// Descriptor of the identified part
    pub capabilities: Option<DeviceDescriptor>,
    /// Lock/fuse bytes the descriptor allowed reading
    pub fuses: FuseBytes,
    /// Whether the cursor auto-increments
    pub autoincrement: bool,
    /// Whether `B`/`g` are available
    pub block_transfer_supported: bool,
    /// Page size used by the transfer algorithm, in bytes (1 = no paging)
    pub page_size_bytes: u32,
}

impl Session {
    pub(crate) fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            identifier: String::new(),
            device_type: DeviceType::Unknown,
            signature: Signature([0; 3]),
            capabilities: None,
            fuses: FuseBytes::default(),
            autoincrement: false,
            block_transfer_supported: false,
            page_size_bytes: 1,
        }
    }

    /// Lock/fuse access of the identified part (empty when unknown)
    pub fn lock_fuse(&self) -> LockFuseAccess {
        self.capabilities
            .map(|d| d.lock_fuse)
            .unwrap_or_default()
    }

    /// Whether a supported part was identified
    pub fn is_supported(&self) -> bool {
        self.capabilities.is_some()
    }
}
