//! The work queue of the device.
//!
//! Everything that needs to touch the sensor, the battery or the attributes is posted onto a
//! single [`WorkQueue`] and handled in order by the [`Scheduler`](crate::context::Scheduler).
//! Producers, including the button edge handler, only ever enqueue, and never wait: an event
//! posted while the queue is full is dropped.

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, TrySendError},
};
use embassy_time::Instant;

/// Maximum number of pending events.
pub const QUEUE_DEPTH: usize = 8;

/// A unit of work.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The read interval elapsed.
    Periodic,
    /// The button pin changed level at the given instant.
    ButtonEdge(Instant),
}

/// Queue of [`Event`]s.
pub type WorkQueue = Channel<CriticalSectionRawMutex, Event, QUEUE_DEPTH>;

/// Posts an event without waiting; returns whether it was enqueued.
pub fn post(queue: &WorkQueue, event: Event) -> bool {
    match queue.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            frostbee_log::warn!("work queue full, dropping {:?}", event);
            false
        }
    }
}
