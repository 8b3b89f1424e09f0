//! List command implementation

use avrprog_core::device::DeviceDatabase;

/// List known parts, optionally filtered by name
pub fn list_devices(db: &DeviceDatabase, name_filter: Option<&str>) {
    println!("Supported parts:");
    println!();
    println!(
        "{:<12} {:<10} {:>12} {:>12} {:>6} {:>6}",
        "Name", "Signature", "Flash page", "EEPROM page", "Busy", "Fuses"
    );
    println!("{}", "-".repeat(64));

    let entries = match name_filter {
        Some(filter) => db.find_by_name(filter),
        None => db.iter().collect(),
    };

    for entry in entries {
        let d = entry.descriptor;
        let eeprom = if d.eeprom_paged() {
            format!("{} B", d.eeprom_page_bytes)
        } else {
            "-".to_string()
        };
        println!(
            "{:<12} {:<10} {:>12} {:>12} {:>6} {:>6}",
            entry.name,
            d.signature().to_string(),
            format!("{} B", d.flash_page_bytes()),
            eeprom,
            if d.has_busy_flag { "yes" } else { "no" },
            format!("{:02X}", d.lock_fuse.bits())
        );
    }
}
