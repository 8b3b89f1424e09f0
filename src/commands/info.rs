//! Info command implementation

use avrprog_core::device::FuseKind;
use avrprog_host::{Programmer, Transport};

/// Print what discovery found, plus the programmer's own report
pub fn run_info<T: Transport>(
    programmer: &mut Programmer<T>,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind = programmer.programmer_type()?;
    let codes = programmer.device_codes()?;
    let session = programmer.session();

    println!("Programmer Information");
    println!("======================");
    println!();
    println!("Identifier:      {}", session.identifier);
    println!("Type:            {}", kind as char);
    println!("Baud rate:       {}", session.baud_rate);
    println!("Autoincrement:   {}", yes_no(session.autoincrement));
    if codes.is_empty() {
        println!("Device codes:    none reported");
    } else {
        let codes: Vec<String> = codes.iter().map(|c| format!("{:02X}", c)).collect();
        println!("Device codes:    {}", codes.join(" "));
    }
    println!();

    println!("Part Information");
    println!("================");
    println!();
    println!("Part:            {}", session.device_type);
    println!("Signature:       {}", session.signature);

    let Some(desc) = session.capabilities else {
        println!();
        println!("Note: part not in the device table, memory access is byte by byte.");
        return Ok(());
    };

    println!(
        "Flash page:      {} words ({} bytes)",
        desc.flash_page_words,
        desc.flash_page_bytes()
    );
    if desc.eeprom_paged() {
        println!("EEPROM page:     {} bytes", desc.eeprom_page_bytes);
    } else {
        println!("EEPROM page:     byte writes only");
    }
    println!("Busy flag:       {}", yes_no(desc.has_busy_flag));
    println!(
        "Block transfer:  {}",
        if session.block_transfer_supported {
            format!("yes, {} byte pages", session.page_size_bytes)
        } else {
            "no".to_string()
        }
    );

    println!();
    for kind in FuseKind::ALL {
        match session.fuses.get(kind) {
            Some(value) => println!("{:<16} 0x{:02X}", format!("{}:", kind.name()), value),
            None => println!("{:<16} not readable", format!("{}:", kind.name())),
        }
    }

    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
