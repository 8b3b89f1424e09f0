//! Built-in descriptor table

use super::{DeviceDescriptor, Part, Signature};

macro_rules! part {
    ($name:literal, $sig2:literal, $sig3:literal, $fpage:literal, $epage:literal, $busy:literal, $mask:literal) => {
        Part {
            name: $name,
            descriptor: DeviceDescriptor::new($sig2, $sig3, $fpage, $epage, $busy, $mask),
        }
    };
}

/// Parts known to the programmer, searched in order
pub static PARTS: &[Part] = &[
    part!("ATtiny24", 0x91, 0x0B, 16, 4, true, 0xFF),
    part!("ATtiny26", 0x91, 0x09, 16, 0, false, 0x77),
    part!("ATtiny2313", 0x91, 0x0A, 16, 4, true, 0xFF),
    part!("ATtiny261", 0x91, 0x0C, 16, 4, true, 0xFF),
    part!("ATtiny44", 0x92, 0x07, 32, 4, true, 0xFF),
    part!("ATtiny4313", 0x92, 0x0D, 32, 4, true, 0xFF),
    part!("ATmega48", 0x92, 0x05, 32, 4, true, 0xFF),
    part!("ATtiny461", 0x92, 0x08, 32, 4, true, 0xFF),
    part!("ATtiny441", 0x92, 0x15, 8, 4, true, 0xFF),
    part!("ATtiny84", 0x93, 0x0C, 32, 4, true, 0xFF),
    part!("ATmega8535", 0x93, 0x08, 32, 0, false, 0x77),
    part!("ATmega88", 0x93, 0x0A, 32, 4, true, 0xFF),
    part!("ATtiny861", 0x93, 0x0D, 32, 4, true, 0xFF),
    part!("ATtiny841", 0x93, 0x15, 8, 4, true, 0xFF),
    part!("ATmega16", 0x94, 0x03, 64, 4, true, 0x77),
    part!("ATmega168", 0x94, 0x06, 64, 4, true, 0xFF),
    part!("ATmega328", 0x95, 0x0F, 64, 4, true, 0xFF),
    part!("ATmega32", 0x95, 0x02, 64, 0, false, 0x77),
];

/// Find the part for a signature
///
/// The family byte is checked first: a non-Atmel signature never matches,
/// whatever its other two bytes are. Otherwise the first table entry with
/// matching signature bytes 2 and 3 wins.
pub fn lookup(sig: Signature) -> Option<&'static Part> {
    if !sig.is_atmel() {
        return None;
    }
    PARTS.iter().find(|part| part.descriptor.matches(sig))
}

/// Find a part by name (case-insensitive)
pub fn find_by_name(name: &str) -> Option<&'static Part> {
    PARTS.iter().find(|part| part.name.eq_ignore_ascii_case(name))
}
