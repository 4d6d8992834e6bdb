//! SAM resource pool shared between threads

mod common;

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use calypso::{
    AllocationMode, ReaderHandle, ResourceDirectory, SamFilter, SamIdentifier, SamResourcePool,
    SamRevision,
};
use calypso_apdu_core::reader::{ReaderEventReceiver, reader_event_channel};
use calypso_apdu_core::{Bytes, CardTransport, ReaderEvent, TransportError};
use calypso_apdu_transport_pcsc::PcscReader;

/// A reader slot holding a SAM, identified by name
#[derive(Debug, Clone)]
struct SamSlot {
    name: String,
    identifier: SamIdentifier,
}

impl SamSlot {
    fn new(name: &str, revision: SamRevision, serial: [u8; 4]) -> Self {
        Self {
            name: name.to_owned(),
            identifier: SamIdentifier::new(revision, Some(serial)),
        }
    }
}

impl PartialEq for SamSlot {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for SamSlot {}

impl Hash for SamSlot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl CardTransport for SamSlot {
    fn do_transmit_raw(&mut self, _command: &[u8]) -> Result<Bytes, TransportError> {
        Ok(Bytes::from_static(&[0x90, 0x00]))
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl ReaderHandle for SamSlot {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_card_present(&self) -> bool {
        true
    }
}

/// Directory with a fixed initial reader set and a scripted event stream
#[derive(Debug)]
struct ScriptedDirectory {
    readers: Vec<SamSlot>,
    events: Option<ReaderEventReceiver<SamSlot>>,
}

impl ResourceDirectory for ScriptedDirectory {
    type Handle = SamSlot;
    type Error = TransportError;

    fn list_readers(&self) -> Result<Vec<SamSlot>, TransportError> {
        Ok(self.readers.clone())
    }

    fn subscribe(&self) -> Option<ReaderEventReceiver<SamSlot>> {
        self.events.clone()
    }
}

fn identify(slot: &SamSlot) -> Option<SamIdentifier> {
    Some(slot.identifier)
}

fn pool_of(slots: usize) -> SamResourcePool<SamSlot> {
    common::init_tracing();
    let directory = ScriptedDirectory {
        readers: (0..slots)
            .map(|i| SamSlot::new(&format!("SAM {i}"), SamRevision::C1, [0, 0, 0, i as u8]))
            .collect(),
        events: None,
    };
    SamResourcePool::from_directory(&directory, identify).unwrap()
}

#[test]
fn test_non_blocking_on_empty_pool() {
    let pool = pool_of(0);
    assert!(pool.is_empty());
    assert!(pool.allocate(AllocationMode::NonBlocking, None).is_none());
}

#[test]
fn test_concurrent_allocations_are_exclusive() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 50;

    let pool = pool_of(3);
    let in_use = parking_lot::Mutex::new(HashSet::new());
    let peak = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..ROUNDS {
                    let resource = pool.allocate(AllocationMode::Blocking, None).unwrap();
                    let name = resource.reader().name().to_owned();
                    {
                        let mut in_use = in_use.lock();
                        assert!(in_use.insert(name.clone()), "{name} allocated twice");
                        peak.fetch_max(in_use.len(), Ordering::Relaxed);
                    }
                    thread::yield_now();
                    in_use.lock().remove(&name);
                    pool.free(resource).unwrap();
                }
            });
        }
    });

    assert!(peak.load(Ordering::Relaxed) <= 3);
    assert_eq!(pool.available(), 3);
}

#[test]
fn test_blocking_allocation_wakes_on_free() {
    let pool = Arc::new(pool_of(1));
    let held = pool.allocate(AllocationMode::NonBlocking, None).unwrap();
    assert!(pool.allocate(AllocationMode::NonBlocking, None).is_none());

    let started = Arc::new(Barrier::new(2));
    let waiter = {
        let pool = Arc::clone(&pool);
        let started = Arc::clone(&started);
        thread::spawn(move || {
            started.wait();
            let resource = pool.allocate(AllocationMode::Blocking, None).unwrap();
            let name = resource.reader().name().to_owned();
            pool.free(resource).unwrap();
            name
        })
    };

    started.wait();
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    pool.free(held).unwrap();
    assert_eq!(waiter.join().unwrap(), "SAM 0");
}

#[test]
fn test_filtered_blocking_allocation_ignores_other_sams() {
    let pool = Arc::new(pool_of(0));
    pool.insert(SamSlot::new("C1", SamRevision::C1, [0x12, 0x34, 0x56, 0x78]));

    let filter = SamFilter::revision(SamRevision::S1D)
        .with_serial_pattern("8765....")
        .unwrap();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let resource = pool.allocate(AllocationMode::Blocking, Some(&filter)).unwrap();
            let identifier = *resource.identifier();
            pool.free(resource).unwrap();
            identifier
        })
    };

    // A non-matching SAM coming and going does not satisfy the waiter
    let c1 = pool.allocate(AllocationMode::NonBlocking, None).unwrap();
    pool.free(c1).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    pool.insert(SamSlot::new("S1D", SamRevision::S1D, [0x87, 0x65, 0x43, 0x21]));
    let identifier = waiter.join().unwrap();
    assert_eq!(identifier.revision, SamRevision::S1D);
    assert_eq!(identifier.serial_number, Some([0x87, 0x65, 0x43, 0x21]));
}

#[test]
fn test_pool_tracks_directory_events() {
    let (sender, events) = reader_event_channel();
    let directory = ScriptedDirectory {
        readers: vec![SamSlot::new("SAM A", SamRevision::S1E, [1, 2, 3, 4])],
        events: Some(events),
    };
    let pool = SamResourcePool::from_directory(&directory, identify).unwrap();
    assert_eq!(pool.len(), 1);

    // Already listed: ignored
    sender
        .send(ReaderEvent::Connected(directory.readers[0].clone()))
        .unwrap();
    let slot_b = SamSlot::new("SAM B", SamRevision::C1, [5, 6, 7, 8]);
    sender.send(ReaderEvent::Connected(slot_b.clone())).unwrap();

    let filter = SamFilter::revision(SamRevision::C1);
    let resource = pool
        .allocate(AllocationMode::Blocking, Some(&filter))
        .unwrap();
    assert_eq!(resource.reader(), &slot_b);
    assert_eq!(pool.len(), 2);

    sender.send(ReaderEvent::Disconnected(slot_b)).unwrap();
    while pool.len() != 1 {
        thread::yield_now();
    }
    // Freeing a SAM whose reader left is accepted once
    pool.free(resource).unwrap();
    assert!(
        pool.allocate(AllocationMode::NonBlocking, Some(&filter))
            .is_none()
    );
}

#[test]
fn test_pool_over_pcsc_directory() {
    let Some(directory) = common::pcsc_directory() else {
        return;
    };

    let pool = SamResourcePool::from_directory(&directory, |reader: &PcscReader| {
        reader.atr().and_then(|atr| SamIdentifier::from_atr(&atr))
    })
    .unwrap();

    match pool.allocate(AllocationMode::NonBlocking, None) {
        Some(resource) => {
            println!("Allocated {} in {}", resource.identifier(), resource.reader().name());
            pool.free(resource).unwrap();
        }
        None => println!("No SAM inserted, {} reader(s) in pool", pool.len()),
    }
}
