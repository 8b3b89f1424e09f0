//! Host driver against the target interpreter and an emulated part

use avrprog_core::device::{DeviceDatabase, FuseKind, MemoryType, Signature};
use avrprog_core::protocol::{ESCAPE, IDLE_PROBE};
use avrprog_core::transfer::{ImageRecords, NoProgress, TransferProgress};
use avrprog_core::Error as CoreError;
use avrprog_dummy::{DummyAvr, DummyConfig, Loopback, TargetExit};
use avrprog_host::{DeviceType, DiscoveryStep, Error, Options, ProgramOptions, Programmer};

fn options() -> Options {
    Options {
        probe_timeout_ms: 20,
        ..Options::default()
    }
}

fn connect(avr: DummyAvr, options: Options) -> Programmer<Loopback> {
    Programmer::connect(Loopback::new(avr, 19200), options).unwrap()
}

fn close(programmer: Programmer<Loopback>) -> DummyAvr {
    let (exit, avr) = programmer.finish(false).unwrap().finish();
    assert_eq!(exit, TargetExit::Closed);
    avr
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[derive(Default)]
struct Recorder {
    pages: Vec<(u32, usize)>,
    retries: Vec<(u32, u8)>,
}

impl TransferProgress for Recorder {
    fn page_done(&mut self, address: u32, len: usize) {
        self.pages.push((address, len));
    }

    fn retrying(&mut self, address: u32, attempt: u8) {
        self.retries.push((address, attempt));
    }
}

#[test]
fn test_discovery_atmega328() {
    let programmer = connect(DummyAvr::new_default(), options());
    let session = programmer.session().clone();

    assert_eq!(session.baud_rate, 19200);
    assert_eq!(session.identifier, "AVRSPRG version 00");
    assert_eq!(session.device_type, DeviceType::Known("ATmega328".into()));
    assert_eq!(session.signature, Signature::new(0x1E, 0x95, 0x0F));
    assert!(session.autoincrement);
    assert!(session.block_transfer_supported);
    assert_eq!(session.page_size_bytes, 128);
    assert_eq!(session.fuses.lock, Some(0xFF));
    assert_eq!(session.fuses.low, Some(0x62));
    assert_eq!(session.fuses.high, Some(0xD9));
    assert_eq!(session.fuses.extended, Some(0xFF));

    let avr = close(programmer);
    assert!(!avr.is_enabled());
}

#[test]
fn test_sync_starts_with_probe_and_confirm() {
    let mut programmer = connect(DummyAvr::new_default(), options());
    assert_eq!(programmer.programmer_type().unwrap(), b'S');
    let transport = programmer.finish(false).unwrap();
    assert_eq!(transport.sent()[..2], [(19200, IDLE_PROBE), (19200, b'a')]);
    assert!(!transport.sent().iter().any(|&(_, b)| b == ESCAPE));
    transport.finish();
}

#[test]
fn test_sync_finds_other_baud() {
    let transport = Loopback::new(DummyAvr::new_default(), 115200);
    let programmer = Programmer::connect(transport, options()).unwrap();
    assert_eq!(programmer.session().baud_rate, 115200);

    let transport = programmer.finish(false).unwrap();
    let missed: Vec<_> = transport
        .sent()
        .iter()
        .filter(|&&(baud, _)| baud != 115200)
        .collect();
    assert_eq!(
        missed,
        [&(19200, IDLE_PROBE), &(38400, IDLE_PROBE), &(57600, IDLE_PROBE)]
    );
    transport.finish();
}

#[test]
fn test_flash_round_trip_block_mode() {
    let image = pattern(1000);
    let mut programmer = connect(DummyAvr::new_default(), options());
    let mut progress = Recorder::default();
    let stats = programmer
        .program(
            MemoryType::Flash,
            ImageRecords::new(0x100, &image),
            &ProgramOptions::default(),
            &mut progress,
        )
        .unwrap();

    assert_eq!(stats.pages, 8);
    assert_eq!(stats.retries, 0);
    assert_eq!(progress.pages[0], (0x100, 128));
    assert_eq!(progress.pages[7], (0x100 + 7 * 128, 1000 - 7 * 128));

    let avr = close(programmer);
    assert_eq!(avr.flash()[0x100..0x100 + 1000], image[..]);
    assert_eq!(avr.flash()[0xFF], 0xFF);
    assert_eq!(avr.flash()[0x100 + 1000], 0xFF);
    assert_eq!(avr.stats().erases, 1);
    assert_eq!(avr.stats().flash_pages, 8);
}

#[test]
fn test_flash_round_trip_single_commands() {
    let image = pattern(301);
    let mut programmer = connect(
        DummyAvr::new_default(),
        Options {
            block_mode: false,
            ..options()
        },
    );
    let stats = programmer
        .program(
            MemoryType::Flash,
            ImageRecords::new(0x101, &image),
            &ProgramOptions {
                erase: false,
                verify: true,
            },
            &mut NoProgress,
        )
        .unwrap();
    assert_eq!(stats.pages, 3);

    let avr = close(programmer);
    assert_eq!(avr.flash()[0x100], 0xFF);
    assert_eq!(avr.flash()[0x101..0x101 + 301], image[..]);
    assert_eq!(avr.flash()[0x101 + 301], 0xFF);
    assert_eq!(avr.stats().flash_pages, 3);
}

#[test]
fn test_eeprom_round_trip() {
    for block_mode in [true, false] {
        let image = pattern(70);
        let mut programmer = connect(
            DummyAvr::new_default(),
            Options {
                block_mode,
                ..options()
            },
        );
        programmer
            .program(
                MemoryType::Eeprom,
                ImageRecords::new(0x21, &image),
                &ProgramOptions::default(),
                &mut NoProgress,
            )
            .unwrap();

        let avr = close(programmer);
        assert_eq!(avr.eeprom()[0x21..0x21 + 70], image[..]);
        assert_eq!(avr.eeprom()[0x20], 0xFF);
        assert_eq!(avr.stats().erases, 0);
    }
}

#[test]
fn test_eeprom_without_page_buffer() {
    let image = pattern(40);
    let mut programmer = connect(DummyAvr::new(DummyConfig::atmega32()), options());
    assert_eq!(
        programmer.session().device_type,
        DeviceType::Known("ATmega32".into())
    );
    programmer
        .program(
            MemoryType::Eeprom,
            ImageRecords::new(0, &image),
            &ProgramOptions::default(),
            &mut NoProgress,
        )
        .unwrap();

    let avr = close(programmer);
    assert_eq!(avr.eeprom()[..40], image[..]);
    assert_eq!(avr.stats().eeprom_writes, 40);
}

#[test]
fn test_verify_only_writes_nothing() {
    let image = pattern(500);
    let mut programmer = connect(DummyAvr::new_default(), options());
    programmer
        .program(
            MemoryType::Flash,
            ImageRecords::new(0, &image),
            &ProgramOptions::default(),
            &mut NoProgress,
        )
        .unwrap();
    let avr = close(programmer);
    let writes = avr.stats().writes();

    let mut programmer = connect(avr, options());
    for _ in 0..2 {
        let stats = programmer
            .verify(MemoryType::Flash, ImageRecords::new(0, &image), &mut NoProgress)
            .unwrap();
        assert_eq!(stats.pages, 4);
        assert_eq!(stats.retries, 0);
    }
    let avr = close(programmer);
    assert_eq!(avr.stats().writes(), writes);
    assert_eq!(avr.flash()[..500], image[..]);
}

#[test]
fn test_verify_reports_first_difference() {
    let image = pattern(300);
    let mut avr = DummyAvr::new_default();
    avr.flash_mut()[..300].copy_from_slice(&image);
    avr.flash_mut()[0x85] ^= 0x10;

    let mut programmer = connect(avr, options());
    let err = programmer
        .verify(MemoryType::Flash, ImageRecords::new(0, &image), &mut NoProgress)
        .unwrap_err();
    assert_eq!(
        err.protocol(),
        Some(CoreError::VerifyMismatch { address: 0x85 })
    );
    close(programmer);
}

#[test]
fn test_corrupted_readback_is_rewritten() {
    let image = pattern(256);
    let mut avr = DummyAvr::new_default();
    avr.corrupt_next_reads(1);

    let mut programmer = connect(avr, options());
    let mut progress = Recorder::default();
    let stats = programmer
        .program(
            MemoryType::Flash,
            ImageRecords::new(0, &image),
            &ProgramOptions::default(),
            &mut progress,
        )
        .unwrap();
    assert_eq!(stats.retries, 1);
    assert_eq!(progress.retries, [(0, 2)]);

    let avr = close(programmer);
    assert_eq!(avr.flash()[..256], image[..]);
    assert_eq!(avr.stats().flash_pages, 3);
}

#[test]
fn test_unknown_part_keeps_talking() {
    let transport = Loopback::new(DummyAvr::new_default(), 19200);
    let mut programmer =
        Programmer::connect_with_database(transport, options(), &DeviceDatabase::new()).unwrap();

    let session = programmer.session().clone();
    assert_eq!(session.device_type, DeviceType::Unknown);
    assert_eq!(session.capabilities, None);
    assert_eq!(session.page_size_bytes, 1);
    assert!(!session.block_transfer_supported);
    assert_eq!(session.fuses, Default::default());

    assert_eq!(programmer.read_identifier().unwrap(), "AVRSPRG version 00");
    assert!(!programmer.write_fuse(FuseKind::Low, 0x00).unwrap());
    let avr = close(programmer);
    assert_eq!(avr.stats().fuse_writes, 0);
}

#[test]
fn test_foreign_signature_fails_enter() {
    let avr = DummyAvr::new(DummyConfig {
        signature: Signature::new(0x1F, 0x95, 0x0F),
        ..DummyConfig::default()
    });
    let err = Programmer::connect(Loopback::new(avr, 19200), options())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Discovery {
            step: DiscoveryStep::EnterProgramming,
            ..
        }
    ));
    assert_eq!(
        err.protocol(),
        Some(CoreError::ProtocolRejected { command: b'P' })
    );
}

#[test]
fn test_silent_part_fails_enter() {
    let avr = DummyAvr::new(DummyConfig {
        responsive: false,
        ..DummyConfig::default()
    });
    let err = Programmer::connect(Loopback::new(avr, 19200), options())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Discovery {
            step: DiscoveryStep::EnterProgramming,
            ..
        }
    ));
}

#[test]
fn test_fuse_writes_follow_mask() {
    let mut programmer = connect(DummyAvr::new(DummyConfig::atmega32()), options());
    assert_eq!(programmer.session().fuses.extended, None);

    assert!(programmer.write_fuse(FuseKind::High, 0x89).unwrap());
    assert_eq!(programmer.session().fuses.high, Some(0x89));
    assert_eq!(programmer.read_fuse(FuseKind::High).unwrap(), 0x89);
    assert!(!programmer.write_fuse(FuseKind::Extended, 0x00).unwrap());

    let avr = close(programmer);
    assert_eq!(avr.fuse(FuseKind::High), 0x89);
    assert_eq!(avr.fuse(FuseKind::Extended), 0xFF);
    assert_eq!(avr.stats().fuse_writes, 1);
}

#[test]
fn test_read_memory_range() {
    let image = pattern(600);
    let avr = DummyAvr::with_flash(DummyConfig::default(), &image);

    for block_mode in [true, false] {
        let mut programmer = connect(
            avr.clone(),
            Options {
                block_mode,
                ..options()
            },
        );
        let data = programmer
            .read_memory(MemoryType::Flash, 0x33, 301, &mut NoProgress)
            .unwrap();
        assert_eq!(data, image[0x33..0x33 + 301]);
        close(programmer);
    }
}

#[test]
fn test_read_memory_rejects_range_past_cursor() {
    let mut programmer = connect(DummyAvr::new_default(), options());
    let err = programmer
        .read_memory(MemoryType::Eeprom, 0xFFFF, 2, &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    close(programmer);
}

#[test]
fn test_led_and_exit() {
    let mut programmer = connect(DummyAvr::new_default(), options());
    programmer.set_led(true).unwrap();
    let (exit, avr) = programmer.finish(true).unwrap().finish();
    assert_eq!(exit, TargetExit::Passthrough);
    assert!(avr.led());
    assert!(avr.in_passthrough());
}
