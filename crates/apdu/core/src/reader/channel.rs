//! Channel-based delivery of reader events

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::ReaderEvent;

/// Sender for reader events
pub type ReaderEventSender<H> = Sender<ReaderEvent<H>>;
/// Receiver for reader events
pub type ReaderEventReceiver<H> = Receiver<ReaderEvent<H>>;

/// Create an unbounded channel for reader events
pub fn reader_event_channel<H>() -> (ReaderEventSender<H>, ReaderEventReceiver<H>) {
    unbounded()
}
