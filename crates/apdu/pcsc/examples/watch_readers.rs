//! Example listing connected readers, then printing reader events until the
//! process is stopped

use calypso_apdu_core::{ReaderEvent, ReaderHandle, ResourceDirectory};
use calypso_apdu_transport_pcsc::PcscDirectory;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let directory = PcscDirectory::new()?;

    // Subscribe first so no reader plugged in meanwhile is missed
    let events = directory.subscribe();

    let readers = directory.list_readers()?;
    println!("Found {} readers:", readers.len());
    for (i, reader) in readers.iter().enumerate() {
        println!("{}. Reader: {}", i + 1, reader.name());
        match reader.atr() {
            Some(atr) => println!("   Card present, ATR: {}", hex::encode_upper(atr)),
            None => println!("   No card present"),
        }
    }

    let Some(events) = events else {
        return Ok(());
    };
    println!("\nWaiting for readers to come and go (Ctrl-C to stop)");
    for event in events {
        match event {
            ReaderEvent::Connected(reader) => println!("+ {}", reader.name()),
            ReaderEvent::Disconnected(reader) => println!("- {}", reader.name()),
        }
    }

    Ok(())
}
