//! The host notification boundary.
//!
//! The waveform core never calls back into script; it queues
//! [`Notification`]s through the host's [`EventSink`] and the host dispatches
//! them later. Delivery is asynchronous relative to emission, but sinks must
//! preserve emission order — reconciliation relies on that to give callers a
//! deterministic event stream.

use crate::buffer::BufferSlot;
use crate::runtime::WaveformId;

/// A queued waveform event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// Double-buffering handoff: `free` is the buffer the timer task is no
    /// longer touching and may now be safely refilled (output) or drained
    /// (input).
    Buffer {
        waveform: WaveformId,
        free: BufferSlot,
    },
    /// The stream ended and its task was retired. The payload buffer is the
    /// controller's primary buffer.
    Finish { waveform: WaveformId },
}

/// The host's generic callback-queueing mechanism.
pub trait EventSink {
    /// Queue one notification for later dispatch, preserving order.
    fn queue(&mut self, notification: Notification);
}
