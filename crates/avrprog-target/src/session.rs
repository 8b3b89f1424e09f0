//! Per-connection interpreter state

use avrprog_core::device::{DeviceDescriptor, Part};

/// State the interpreter carries between commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetSession {
    /// Address cursor: word address for flash, byte address for EEPROM
    pub cursor: u16,
    /// Part selected by the last successful `P`
    pub part: Option<&'static Part>,
}

impl TargetSession {
    /// Descriptor of the selected part
    pub fn descriptor(&self) -> Option<DeviceDescriptor> {
        self.part.map(|p| p.descriptor)
    }

    /// Return the cursor and advance it by one unit
    pub fn advance(&mut self) -> u16 {
        let current = self.cursor;
        self.cursor = self.cursor.wrapping_add(1);
        current
    }
}
