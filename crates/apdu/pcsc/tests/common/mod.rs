//! Helpers for tests needing a PC/SC service

use calypso_apdu_core::{ReaderHandle, ResourceDirectory};
use calypso_apdu_transport_pcsc::{PcscDirectory, PcscReader};

/// Connect to the PC/SC service, or `None` when it is not available
pub fn get_test_directory() -> Option<PcscDirectory> {
    match PcscDirectory::new() {
        Ok(directory) => Some(directory),
        Err(e) => {
            println!("Skipping test, PC/SC not available: {e}");
            None
        }
    }
}

/// First reader with a card inserted, or `None`
pub fn get_test_reader(directory: &PcscDirectory) -> Option<PcscReader> {
    directory
        .list_readers()
        .ok()?
        .into_iter()
        .find(|reader| reader.is_card_present())
}
