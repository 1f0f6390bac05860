//! The timer-subsystem capability boundary.
//!
//! The hardware timer that actually paces sample transfer lives outside this
//! crate; [`SampleClock`] is the exact contract the waveform core relies on.
//! A task is created over a primary buffer (plus an optional wraparound
//! buffer), advances asynchronously in the interrupt domain, and is queried
//! and cancelled by the primary buffer's identity.
//!
//! ## Snapshot discipline
//!
//! The interrupt domain can mutate task state at any instant, so every query
//! returns an immutable [`TaskSnapshot`] value. Callers derive all decisions
//! from one snapshot per task per pass and never assume a snapshot still
//! describes the live task.

use crate::buffer::{BufferId, BufferLease};

/// Timer-subsystem time, in whatever unit the subsystem counts.
pub type Ticks = u64;

/// A validated pin handle. Validation and configuration are the clock's
/// concern; the waveform core only checks validity before scheduling.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin(pub u8);

/// Which way sample bytes move on each timer tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Write one buffer byte to the pin per tick.
    Output,
    /// Read one byte from the pin into the buffer per tick.
    Input,
}

/// Scheduling parameters for a timer task.
#[derive(Clone, Copy, Debug)]
pub struct TaskConfig {
    /// Absolute time of the first sample transfer.
    pub start: Ticks,
    /// Ticks between consecutive sample transfers.
    pub period: Ticks,
    pub pin: Pin,
    pub direction: Direction,
}

/// One observation of a live timer task.
///
/// `current` is the buffer the task is transferring right now; `wraparound`
/// is the buffer it will switch to when `current` is exhausted (`None` for a
/// one-shot task; equal to `current` for a single-buffered repeating task).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskSnapshot {
    pub current: BufferId,
    pub wraparound: Option<BufferId>,
}

impl TaskSnapshot {
    /// `true` when the task genuinely alternates between two buffers.
    pub fn is_double_buffered(&self) -> bool {
        self.wraparound.is_some_and(|wraparound| wraparound != self.current)
    }

    /// Index of the buffer the task is transferring: 0 when `current` is the
    /// controller's primary buffer, 1 otherwise.
    pub fn active_index(&self, primary: BufferId) -> u8 {
        if self.current == primary {
            0
        } else {
            1
        }
    }
}

/// A timer-subsystem refusal. The subsystem reports success or failure only;
/// the waveform core maps failures onto its own error kinds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockError;

/// Capability interface of the timer/sample-clock subsystem.
///
/// Implementations must key tasks by the primary buffer's [`BufferId`] and
/// must not re-bind a retired buffer's address to a different live task while
/// the owning controller runs — identity comparison is how the core tells
/// buffers apart.
pub trait SampleClock {
    /// Current time.
    fn now(&self) -> Ticks;

    /// Convert a microsecond count into ticks.
    fn ticks_from_micros(&self, micros: u64) -> Ticks;

    /// Whether `pin` is a usable pin handle.
    fn pin_valid(&self, pin: Pin) -> bool;

    /// Configure `pin` for analog capture ahead of an input run.
    fn prepare_input_pin(&mut self, pin: Pin) -> Result<(), ClockError>;

    /// Schedule recurring sample transfer over `primary`. A task with
    /// `wraparound = None` retires itself when `primary` is exhausted;
    /// otherwise it switches to the wraparound buffer (which may be
    /// `primary` itself) and keeps going.
    fn create_task(
        &mut self,
        config: TaskConfig,
        primary: BufferLease,
        wraparound: Option<BufferLease>,
    ) -> Result<(), ClockError>;

    /// Snapshot the task bound to `primary`, or `None` once the subsystem
    /// has retired it.
    fn query_task(&mut self, primary: BufferId) -> Option<TaskSnapshot>;

    /// Cancel the task bound to `primary`.
    fn cancel_task(&mut self, primary: BufferId) -> Result<(), ClockError>;
}
