//! Resource directory backed by the PC/SC service

use std::collections::{HashMap, HashSet};
use std::ffi::CString;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use calypso_apdu_core::reader::{ReaderEventReceiver, ReaderEventSender, reader_event_channel};
use calypso_apdu_core::{ReaderEvent, ReaderHandle, ResourceDirectory};
use parking_lot::Mutex;
use pcsc::{Context, ReaderState, Scope, State};
use tracing::{debug, trace, warn};

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::reader::PcscReader;

/// Directory of the readers known to the PC/SC service
///
/// Handles returned for the same reader name are equal and share their card
/// connection, whether they come from [`ResourceDirectory::list_readers`] or
/// from an event.
pub struct PcscDirectory {
    cache: Arc<ReaderCache>,
    shutdown: Arc<AtomicBool>,
    /// Contexts of the monitor threads, cancelled on drop to wake them up
    monitors: Mutex<Vec<Context>>,
}

struct ReaderCache {
    context: Context,
    config: PcscConfig,
    readers: Mutex<HashMap<CString, PcscReader>>,
}

impl fmt::Debug for PcscDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscDirectory")
            .field("cache", &self.cache)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ReaderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderCache")
            .field("config", &self.config)
            .field("readers", &self.readers)
            .finish_non_exhaustive()
    }
}

impl ReaderCache {
    /// Enumerate readers, reusing the handles of readers already known
    fn scan(&self) -> Result<Vec<PcscReader>, PcscError> {
        let names = match self.context.list_readers_owned() {
            Ok(names) => names,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut readers = self.readers.lock();
        readers.retain(|name, _| names.contains(name));
        Ok(names
            .into_iter()
            .map(|name| {
                readers
                    .entry(name.clone())
                    .or_insert_with(|| {
                        PcscReader::new(self.context.clone(), name, self.config.clone())
                    })
                    .clone()
            })
            .collect())
    }
}

impl PcscDirectory {
    /// Connect to the PC/SC service with the default configuration
    pub fn new() -> Result<Self, PcscError> {
        Self::with_config(PcscConfig::default())
    }

    /// Connect to the PC/SC service with a custom configuration
    pub fn with_config(config: PcscConfig) -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self {
            cache: Arc::new(ReaderCache {
                context,
                config,
                readers: Mutex::new(HashMap::new()),
            }),
            shutdown: Arc::new(AtomicBool::new(false)),
            monitors: Mutex::new(Vec::new()),
        })
    }

    /// Find a reader by name
    pub fn reader(&self, name: &str) -> Result<PcscReader, PcscError> {
        self.cache
            .scan()?
            .into_iter()
            .find(|reader| reader.name() == name)
            .ok_or_else(|| PcscError::ReaderNotFound(name.to_string()))
    }

    fn spawn_monitor(&self, sender: ReaderEventSender<PcscReader>) -> Result<(), PcscError> {
        let known: HashSet<PcscReader> = self.cache.scan()?.into_iter().collect();
        let context = Context::establish(Scope::User)?;
        self.monitors.lock().push(context.clone());

        let monitor = Monitor {
            cache: self.cache.clone(),
            shutdown: self.shutdown.clone(),
            context,
            sender,
            known,
        };
        thread::Builder::new()
            .name("pcsc-directory-monitor".into())
            .spawn(move || monitor.run())?;
        Ok(())
    }
}

impl ResourceDirectory for PcscDirectory {
    type Handle = PcscReader;
    type Error = PcscError;

    fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        self.cache.scan()
    }

    fn subscribe(&self) -> Option<ReaderEventReceiver<PcscReader>> {
        let (sender, receiver) = reader_event_channel();
        match self.spawn_monitor(sender) {
            Ok(()) => Some(receiver),
            Err(e) => {
                warn!(error = %e, "Reader events unavailable");
                None
            }
        }
    }
}

impl Drop for PcscDirectory {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for context in self.monitors.lock().drain(..) {
            let _ = context.cancel();
        }
    }
}

/// Background task publishing reader set changes
struct Monitor {
    cache: Arc<ReaderCache>,
    shutdown: Arc<AtomicBool>,
    /// Dedicated context so cancelling it only wakes this thread
    context: Context,
    sender: ReaderEventSender<PcscReader>,
    known: HashSet<PcscReader>,
}

impl Monitor {
    fn run(mut self) {
        let interval = self.cache.config.poll_interval;
        let mut pnp = [ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE)];
        debug!("Reader monitor started");

        while !self.shutdown.load(Ordering::Acquire) {
            match self.context.get_status_change(interval, &mut pnp) {
                Ok(()) => pnp[0].sync_current_state(),
                Err(pcsc::Error::Timeout) => {}
                Err(pcsc::Error::Cancelled) => break,
                Err(e) => {
                    // Plug and play notification is not supported everywhere.
                    trace!(error = %e, "Falling back to polling");
                    thread::sleep(interval);
                }
            }

            let current: HashSet<PcscReader> = match self.cache.scan() {
                Ok(readers) => readers.into_iter().collect(),
                Err(e) => {
                    warn!(error = %e, "Reader enumeration failed");
                    continue;
                }
            };
            if !self.publish(current) {
                break;
            }
        }
        debug!("Reader monitor stopped");
    }

    /// Send the difference with the last known set; false once nobody listens
    fn publish(&mut self, current: HashSet<PcscReader>) -> bool {
        let removed = self.known.difference(&current).cloned();
        let added = current.difference(&self.known).cloned();
        let events: Vec<_> = removed
            .map(ReaderEvent::Disconnected)
            .chain(added.map(ReaderEvent::Connected))
            .collect();

        for event in events {
            debug!(%event, "Reader set changed");
            if self.sender.send(event).is_err() {
                return false;
            }
        }
        self.known = current;
        true
    }
}
