//! Pool of SAM resources shared by the transaction threads
//!
//! Every SAM reader known to the pool is either free or allocated to exactly
//! one holder. Allocation hands out a [`SamResource`], which must be given
//! back with [`SamResourcePool::free`]. All bookkeeping happens under one
//! lock; blocked allocations wait on a condition variable notified whenever
//! a resource is freed or inserted.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use calypso_apdu_core::reader::ReaderEventReceiver;
use calypso_apdu_core::{ReaderEvent, ReaderHandle, ResourceDirectory};
use crossbeam_channel::{Receiver, Sender, select};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use super::{PoolError, SamFilter, SamIdentifier};

/// How [`SamResourcePool::allocate`] behaves when nothing matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationMode {
    /// Wait until a matching resource is freed or inserted
    Blocking,
    /// Scan once and return `None` if nothing matches
    #[default]
    NonBlocking,
}

type Identify<R> = dyn Fn(&R) -> Option<SamIdentifier> + Send + Sync;

/// A SAM allocated from a pool
///
/// Give it back with [`SamResourcePool::free`] once the transaction is over.
#[derive(Debug)]
#[must_use = "an allocated SAM stays unavailable until freed"]
pub struct SamResource<R> {
    id: u64,
    pool: usize,
    reader: R,
    identifier: SamIdentifier,
}

impl<R: ReaderHandle> SamResource<R> {
    /// Reader holding the SAM
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// A transport to the SAM, for a transaction
    pub fn transport(&self) -> R {
        self.reader.clone()
    }

    /// What the SAM announced about itself
    pub const fn identifier(&self) -> &SamIdentifier {
        &self.identifier
    }
}

#[derive(Debug)]
struct Entry<R> {
    id: u64,
    reader: R,
    identifier: SamIdentifier,
    allocated: bool,
}

#[derive(Debug)]
struct PoolState<R> {
    entries: Vec<Entry<R>>,
    /// Allocated resources whose reader went away
    retired: Vec<u64>,
    next_id: u64,
}

struct Shared<R> {
    state: Mutex<PoolState<R>>,
    freed: Condvar,
    identify: Box<Identify<R>>,
}

impl<R: ReaderHandle> Shared<R> {
    fn contains(&self, reader: &R) -> bool {
        let state = self.state.lock();
        state.entries.iter().any(|entry| &entry.reader == reader)
    }

    fn insert(&self, reader: R) -> bool {
        if self.contains(&reader) {
            trace!(reader = reader.name(), "Reader already in pool");
            return false;
        }

        // Talks to the reader: not under the pool lock
        let Some(identifier) = (self.identify)(&reader) else {
            debug!(reader = reader.name(), "No SAM in reader");
            return false;
        };

        let mut state = self.state.lock();
        if state.entries.iter().any(|entry| entry.reader == reader) {
            return false;
        }
        let id = state.next_id;
        state.next_id += 1;
        info!(reader = reader.name(), %identifier, "SAM added to pool");
        state.entries.push(Entry {
            id,
            reader,
            identifier,
            allocated: false,
        });
        drop(state);
        self.freed.notify_all();
        true
    }

    fn remove(&self, reader: &R) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state.entries.iter().position(|entry| &entry.reader == reader) else {
            return false;
        };

        let entry = state.entries.swap_remove(index);
        if entry.allocated {
            warn!(reader = reader.name(), "Allocated SAM removed from pool");
            state.retired.push(entry.id);
        } else {
            info!(reader = reader.name(), "SAM removed from pool");
        }
        true
    }

    fn handle_event(&self, event: ReaderEvent<R>) {
        debug!(%event, "Reader event");
        match event {
            ReaderEvent::Connected(reader) => {
                self.insert(reader);
            }
            ReaderEvent::Disconnected(reader) => {
                self.remove(&reader);
            }
        }
    }
}

/// Pool of SAM resources
pub struct SamResourcePool<R: ReaderHandle> {
    shared: Arc<Shared<R>>,
    /// Dropping the sender stops the listener thread
    shutdown: Option<Sender<()>>,
    listener: Option<JoinHandle<()>>,
}

impl<R: ReaderHandle> fmt::Debug for SamResourcePool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SamResourcePool")
            .field("resources", &state.entries.len())
            .field("listening", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl<R: ReaderHandle> SamResourcePool<R> {
    /// Create an empty pool
    ///
    /// `identify` tells whether a reader holds a SAM, and which one.
    pub fn new<F>(identify: F) -> Self
    where
        F: Fn(&R) -> Option<SamIdentifier> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    entries: Vec::new(),
                    retired: Vec::new(),
                    next_id: 0,
                }),
                freed: Condvar::new(),
                identify: Box::new(identify),
            }),
            shutdown: None,
            listener: None,
        }
    }

    /// Create a pool tracking the readers of a directory
    ///
    /// The pool subscribes before listing, so no reader connected in between
    /// is missed. Connection events are then consumed by a listener thread
    /// for the lifetime of the pool.
    pub fn from_directory<D, F>(directory: &D, identify: F) -> Result<Self, D::Error>
    where
        D: ResourceDirectory<Handle = R>,
        F: Fn(&R) -> Option<SamIdentifier> + Send + Sync + 'static,
    {
        let mut pool = Self::new(identify);
        let events = directory.subscribe();

        for reader in directory.list_readers()? {
            pool.shared.insert(reader);
        }

        if let Some(events) = events {
            pool.listen(events);
        }
        Ok(pool)
    }

    fn listen(&mut self, events: ReaderEventReceiver<R>) {
        let (shutdown, stop): (Sender<()>, Receiver<()>) = crossbeam_channel::bounded(0);
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("sam-pool-listener".into())
            .spawn(move || {
                loop {
                    select! {
                        recv(events) -> event => match event {
                            Ok(event) => shared.handle_event(event),
                            Err(_) => break,
                        },
                        recv(stop) -> _ => break,
                    }
                }
                debug!("SAM pool listener stopped");
            });

        match spawned {
            Ok(handle) => {
                self.shutdown = Some(shutdown);
                self.listener = Some(handle);
            }
            Err(error) => warn!(%error, "Could not start the SAM pool listener"),
        }
    }

    /// Add a reader; returns whether it holds a SAM and was not known yet
    pub fn insert(&self, reader: R) -> bool {
        self.shared.insert(reader)
    }

    /// Remove a reader; returns whether it was known
    ///
    /// A resource allocated from that reader may still be freed afterwards.
    pub fn remove(&self, reader: &R) -> bool {
        self.shared.remove(reader)
    }

    /// Number of SAMs in the pool, allocated or not
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Whether the pool holds no SAM
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of SAMs currently free
    pub fn available(&self) -> usize {
        let state = self.shared.state.lock();
        state.entries.iter().filter(|entry| !entry.allocated).count()
    }

    /// Allocate a free SAM matching `filter` (any SAM when `None`)
    ///
    /// In blocking mode this waits, without timeout, until a matching SAM is
    /// freed or inserted.
    pub fn allocate(
        &self,
        mode: AllocationMode,
        filter: Option<&SamFilter>,
    ) -> Option<SamResource<R>> {
        let mut state = self.shared.state.lock();
        loop {
            let found = state.entries.iter_mut().find(|entry| {
                !entry.allocated && filter.is_none_or(|filter| filter.matches(&entry.identifier))
            });

            if let Some(entry) = found {
                entry.allocated = true;
                debug!(reader = entry.reader.name(), identifier = %entry.identifier, "SAM allocated");
                return Some(SamResource {
                    id: entry.id,
                    pool: self.id(),
                    reader: entry.reader.clone(),
                    identifier: entry.identifier,
                });
            }

            match mode {
                AllocationMode::NonBlocking => {
                    debug!("No SAM available");
                    return None;
                }
                AllocationMode::Blocking => {
                    trace!("Waiting for a SAM to be freed");
                    self.shared.freed.wait(&mut state);
                }
            }
        }
    }

    /// Give an allocated SAM back to the pool
    pub fn free(&self, resource: SamResource<R>) -> Result<(), PoolError> {
        let unknown = || PoolError::UnknownResource(resource.reader.name().to_owned());
        if resource.pool != self.id() {
            return Err(unknown());
        }

        let mut state = self.shared.state.lock();
        if let Some(entry) = state
            .entries
            .iter_mut()
            .find(|entry| entry.id == resource.id && entry.allocated)
        {
            entry.allocated = false;
            debug!(reader = entry.reader.name(), "SAM freed");
            drop(state);
            self.shared.freed.notify_all();
            return Ok(());
        }

        if let Some(index) = state.retired.iter().position(|id| *id == resource.id) {
            state.retired.swap_remove(index);
            debug!(reader = resource.reader.name(), "Freed SAM of a removed reader");
            return Ok(());
        }
        Err(unknown())
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }
}

impl<R: ReaderHandle> Drop for SamResourcePool<R> {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(listener) = self.listener.take()
            && listener.join().is_err()
        {
            warn!("SAM pool listener panicked");
        }
    }
}
