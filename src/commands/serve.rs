//! Serve command implementation

use avrprog_dummy::{DummyAvr, DummyConfig};
use avrprog_target::{Interpreter, StdLink, TargetError};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::time::Duration;

/// Run the programmer firmware's interpreter on a serial port
///
/// The attached part is simulated, so host tools can be exercised over a
/// real (or virtual) serial line without hardware.
pub fn run_serve(
    port: &str,
    baud: u32,
    config: DummyConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let serial = serialport::new(port, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(100))
        .open()?;

    println!(
        "Serving on {} at {} baud, simulated part signature {}",
        port, baud, config.signature
    );

    let mut interpreter = Interpreter::new(StdLink::new(serial), DummyAvr::new(config));
    match interpreter.run() {
        Ok(()) => {
            println!("Host sent exit; serial line handed over to the part");
            Ok(())
        }
        Err(TargetError::LinkClosed) => {
            println!("Serial line closed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
