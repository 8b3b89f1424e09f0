//! Device database for runtime loading and lookup
//!
//! This module provides the `DeviceDatabase` type, which starts from the
//! built-in table and can be extended with part definitions from RON files.

use alloc::format;
use alloc::{string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use super::{DeviceDescriptor, LockFuseAccess, Signature, PARTS};

/// Largest flash page the host transfer window accepts, in words
pub const MAX_FLASH_PAGE_WORDS: u16 = 128;

/// Error type for device database operations
#[derive(Debug, thiserror::Error)]
pub enum DeviceDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Single part definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct PartDef {
    name: String,
    sig2: u8,
    sig3: u8,
    flash_page_words: u16,
    #[serde(default)]
    eeprom_page_bytes: u8,
    #[serde(default)]
    busy_flag: bool,
    #[serde(default)]
    lock_fuse: u8,
}

/// Top-level RON file
#[derive(Debug, Clone, serde::Deserialize)]
struct PartsFile {
    parts: Vec<PartDef>,
}

impl PartDef {
    fn validate(&self) -> Result<(), DeviceDbError> {
        let words = self.flash_page_words;
        if words > MAX_FLASH_PAGE_WORDS || (words != 0 && !words.is_power_of_two()) {
            return Err(DeviceDbError::Validation(format!(
                "{}: flash page of {} words is not a power of two up to {}",
                self.name, words, MAX_FLASH_PAGE_WORDS
            )));
        }
        let eeprom = self.eeprom_page_bytes;
        if eeprom != 0 && !eeprom.is_power_of_two() {
            return Err(DeviceDbError::Validation(format!(
                "{}: EEPROM page of {} bytes is not a power of two",
                self.name, eeprom
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Device database
// ============================================================================

/// A named descriptor owned by the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Part name
    pub name: String,
    /// Programming parameters
    pub descriptor: DeviceDescriptor,
}

/// Runtime device database
///
/// Lookups walk the entries in insertion order; the first match wins, so
/// built-in parts shadow file entries with the same signature.
#[derive(Debug, Clone, Default)]
pub struct DeviceDatabase {
    entries: Vec<DeviceEntry>,
}

impl DeviceDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create a database holding the built-in table
    pub fn with_builtin() -> Self {
        Self {
            entries: PARTS
                .iter()
                .map(|p| DeviceEntry {
                    name: p.name.into(),
                    descriptor: p.descriptor,
                })
                .collect(),
        }
    }

    /// Load part definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, DeviceDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load part definitions from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<usize, DeviceDbError> {
        let file: PartsFile = ron::from_str(content)?;
        let count = file.parts.len();

        for def in &file.parts {
            def.validate()?;
        }
        for def in file.parts {
            log::debug!("device db: adding {} (1E {:02X} {:02X})", def.name, def.sig2, def.sig3);
            self.entries.push(DeviceEntry {
                descriptor: DeviceDescriptor {
                    sig2: def.sig2,
                    sig3: def.sig3,
                    flash_page_words: def.flash_page_words,
                    eeprom_page_bytes: def.eeprom_page_bytes,
                    has_busy_flag: def.busy_flag,
                    lock_fuse: LockFuseAccess::from_bits_retain(def.lock_fuse),
                },
                name: def.name,
            });
        }

        Ok(count)
    }

    /// Get all entries
    pub fn entries(&self) -> &[DeviceEntry] {
        &self.entries
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for a signature, checking the family byte first
    pub fn find_by_signature(&self, sig: Signature) -> Option<&DeviceEntry> {
        if !sig.is_atmel() {
            return None;
        }
        self.entries.iter().find(|e| e.descriptor.matches(sig))
    }

    /// Find entries by name (case-insensitive partial match)
    pub fn find_by_name(&self, name: &str) -> Vec<&DeviceEntry> {
        let name_lower = name.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&name_lower))
            .collect()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.entries.iter()
    }
}
