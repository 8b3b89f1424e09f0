//! Lock and fuse byte access flags

use bitflags::bitflags;

bitflags! {
    /// Which lock/fuse bytes a part allows to be read and written over ISP
    ///
    /// The bit layout matches the capability byte stored in the descriptor
    /// table, so a raw mask can be converted with `from_bits_retain`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "std", serde(transparent))]
    pub struct LockFuseAccess: u8 {
        /// Lock bits can be read
        const LOCK_READ      = 1 << 0;
        /// Fuse low byte can be read
        const FUSE_READ      = 1 << 1;
        /// Fuse high byte can be read
        const HI_FUSE_READ   = 1 << 2;
        /// Extended fuse byte can be read
        const EXT_FUSE_READ  = 1 << 3;
        /// Lock bits can be written
        const LOCK_WRITE     = 1 << 4;
        /// Fuse low byte can be written
        const FUSE_WRITE     = 1 << 5;
        /// Fuse high byte can be written
        const HI_FUSE_WRITE  = 1 << 6;
        /// Extended fuse byte can be written
        const EXT_FUSE_WRITE = 1 << 7;
    }
}

impl Default for LockFuseAccess {
    fn default() -> Self {
        LockFuseAccess::empty()
    }
}

impl LockFuseAccess {
    /// Read permission bit for a lock/fuse byte
    pub const fn read_flag(kind: super::FuseKind) -> Self {
        match kind {
            super::FuseKind::Lock => Self::LOCK_READ,
            super::FuseKind::Low => Self::FUSE_READ,
            super::FuseKind::High => Self::HI_FUSE_READ,
            super::FuseKind::Extended => Self::EXT_FUSE_READ,
        }
    }

    /// Write permission bit for a lock/fuse byte
    pub const fn write_flag(kind: super::FuseKind) -> Self {
        match kind {
            super::FuseKind::Lock => Self::LOCK_WRITE,
            super::FuseKind::Low => Self::FUSE_WRITE,
            super::FuseKind::High => Self::HI_FUSE_WRITE,
            super::FuseKind::Extended => Self::EXT_FUSE_WRITE,
        }
    }

    /// Whether the byte can be read
    pub fn can_read(self, kind: super::FuseKind) -> bool {
        self.contains(Self::read_flag(kind))
    }

    /// Whether the byte can be written
    pub fn can_write(self, kind: super::FuseKind) -> bool {
        self.contains(Self::write_flag(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FuseKind;

    #[test]
    fn test_mask_layout() {
        let mask = LockFuseAccess::from_bits_retain(0x77);
        assert!(mask.can_read(FuseKind::Lock));
        assert!(mask.can_read(FuseKind::High));
        assert!(!mask.can_read(FuseKind::Extended));
        assert!(mask.can_write(FuseKind::Low));
        assert!(!mask.can_write(FuseKind::Extended));
    }
}
