//! Example running a debit session on a revision 3.1 card
//!
//! Usage: `debit_session <card reader> <card serial number (hex)>`
//!
//! The SAM is taken from whichever PC/SC reader holds one.

use calypso::prelude::*;
use calypso::{ReaderHandle, ResourceDirectory, SamIdentifier};
use calypso_apdu_transport_pcsc::{PcscDirectory, PcscReader};
use tracing_subscriber::EnvFilter;

/// Environment file of a revision 3 card
const SFI_ENVIRONMENT: u8 = 0x07;
/// Event log of a revision 3 card
const SFI_EVENT_LOG: u8 = 0x08;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(card_reader), Some(serial)) = (args.next(), args.next()) else {
        println!("Usage: debit_session <card reader> <card serial number (hex)>");
        return Ok(());
    };

    let directory = PcscDirectory::new()?;
    let pool = SamResourcePool::from_directory(&directory, |reader: &PcscReader| {
        reader.atr().and_then(|atr| SamIdentifier::from_atr(&atr))
    })?;
    let Some(sam) = pool.allocate(AllocationMode::NonBlocking, None) else {
        println!("No SAM found among {} readers", directory.list_readers()?.len());
        return Ok(());
    };
    println!("Using {} in {}", sam.identifier(), sam.reader().name());

    let card = CalypsoPo::new(
        PoRevision::Rev3_1,
        hex::decode(serial)?,
        SessionModifications::Bytes(215),
    )?;
    let mut transaction = PoTransaction::new(
        directory.reader(&card_reader)?,
        card,
        sam.transport(),
        sam.identifier().revision,
        SecuritySettings::default(),
    );

    let result = debit(&mut transaction);
    pool.free(sam)?;
    match result? {
        SessionOutcome::Authenticated => println!("Session closed, card authenticated"),
        SessionOutcome::Unauthenticated => println!("Card signature rejected by the SAM"),
    }
    Ok(())
}

fn debit<P: CardTransport, S: CardTransport>(
    transaction: &mut PoTransaction<P, S>,
) -> calypso::Result<SessionOutcome> {
    transaction.identify()?;
    let session = transaction.open_session(AccessLevel::Debit, SFI_ENVIRONMENT, 1)?;
    println!(
        "Session opened, transaction counter {}, environment {}",
        session.transaction_counter(),
        hex::encode_upper(session.record_data())
    );

    let responses =
        transaction.process_po_commands(vec![PoCommand::read_record(SFI_EVENT_LOG, 1)])?;
    if let Some(records) = responses[0].records() {
        for (number, data) in records {
            println!("Event {number}: {}", hex::encode_upper(data));
        }
    }

    transaction.process_po_commands(vec![PoCommand::append_record(SFI_EVENT_LOG, vec![0u8; 29])])?;
    transaction.close_session()
}
