//! Shared fixtures for the transaction and pool test suites

#![allow(dead_code, unreachable_pub)]

use calypso::prelude::*;
use calypso_apdu_core::transport::MockTransport;
use calypso_apdu_transport_pcsc::PcscDirectory;
use tracing_subscriber::EnvFilter;

/// Card serial number used by every fixture
pub const SERIAL: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 0x78];

/// Terminal challenge returned by the SAM
pub const SAM_CHALLENGE: &str = "C1C2C3C4 9000";

/// Rev 3.1 Open Secure Session response: counter 0x7E, ratified, KIF 0x12, KVC 0x34
pub const OPEN_REV3_1: &str = "00007E C1 00 12 34 00 9000";

/// Close Secure Session response carrying the card half signature
pub const CLOSE_SIGNED: &str = "4DBDC960 9000";

/// Terminal half signature computed by the SAM
pub const SAM_SIGNATURE: &str = "11223344 9000";

/// Log to the test output when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A card of the given revision with a 215 byte session buffer
pub fn card(revision: PoRevision) -> CalypsoPo {
    CalypsoPo::new(revision, SERIAL.to_vec(), SessionModifications::Bytes(215))
        .expect("valid card")
}

/// A transaction over scripted card and SAM transports
pub fn transaction(
    card: CalypsoPo,
    po: MockTransport,
    sam: MockTransport,
    settings: SecuritySettings,
) -> PoTransaction<MockTransport, MockTransport> {
    init_tracing();
    PoTransaction::new(po, card, sam, SamRevision::C1, settings)
}

/// Hex encoding of a recorded command, for assertions
pub fn hex_command(transport: &MockTransport, index: usize) -> String {
    hex::encode_upper(&transport.commands()[index])
}

/// Connect to the PC/SC service, or `None` when it is not available
pub fn pcsc_directory() -> Option<PcscDirectory> {
    match PcscDirectory::new() {
        Ok(directory) => Some(directory),
        Err(e) => {
            println!("Skipping test, PC/SC not available: {e}");
            None
        }
    }
}
