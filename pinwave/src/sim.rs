//! Software model of the timer subsystem, for host-side tests and demos.
//!
//! [`SimClock`] implements [`SampleClock`] over a plain task table and a
//! manually advanced clock: [`advance`](SimClock::advance) moves time forward
//! and performs every sample transfer that falls due, byte-for-byte, through
//! the same [`BufferLease`]s a hardware subsystem would use. One-shot tasks
//! retire themselves at the end of their buffer; repeating tasks wrap onto
//! their wraparound buffer (which is the primary buffer itself for a
//! single-buffered stream).
//!
//! Refusal knobs ([`refuse_create`](SimClock::refuse_create),
//! [`refuse_cancel`](SimClock::refuse_cancel),
//! [`refuse_input_pins`](SimClock::refuse_input_pins)) make the failure paths
//! of the waveform core reachable from tests.
//!
//! [`EventLog`] is the matching [`EventSink`]: it records notifications in
//! emission order.
//!
//! This is a behavioral model, not a hardware driver: it runs in the caller's
//! thread and "interrupt-domain" transfers happen inside `advance`.

use alloc::vec::Vec;

use crate::buffer::{BufferId, BufferLease};
use crate::clock::{ClockError, Direction, Pin, SampleClock, TaskConfig, TaskSnapshot, Ticks};
use crate::event::{EventSink, Notification};

/// Number of pins the simulated hardware exposes; higher pin handles are
/// invalid.
pub const SIM_PIN_COUNT: u8 = 32;

struct SimTask {
    /// Primary buffer identity — the query/cancel key.
    key: BufferId,
    config: TaskConfig,
    /// Buffer currently being transferred.
    current: BufferLease,
    /// Buffer the task switches to at wraparound; `None` retires the task.
    pending: Option<BufferLease>,
    /// Next sample index within `current`.
    position: usize,
    next_fire: Ticks,
}

impl SimTask {
    /// Perform every transfer due up to `now`. Returns `true` when the task
    /// has retired.
    fn run_until(&mut self, now: Ticks, output: &mut Vec<u8>, input_level: &mut u8) -> bool {
        while self.next_fire <= now {
            self.next_fire += self.config.period;
            match self.config.direction {
                Direction::Output => {
                    // SAFETY: the waveform core keeps the buffer alive for as
                    // long as the task exists.
                    let byte = unsafe { self.current.read(self.position) };
                    output.push(byte);
                }
                Direction::Input => {
                    *input_level = input_level.wrapping_add(1);
                    // SAFETY: as above.
                    unsafe { self.current.write(self.position, *input_level) };
                }
            }
            self.position += 1;
            if self.position >= self.current.len() {
                self.position = 0;
                match self.pending {
                    None => return true,
                    Some(next) => {
                        let exhausted = self.current;
                        self.current = next;
                        self.pending = Some(exhausted);
                    }
                }
            }
        }
        false
    }
}

/// A deterministic, manually stepped sample clock. One tick is one
/// microsecond.
pub struct SimClock {
    now: Ticks,
    tasks: Vec<SimTask>,
    refuse_create: bool,
    refuse_cancel: bool,
    refuse_input_pins: bool,
    /// Bytes transferred by output tasks, in transfer order.
    output: Vec<u8>,
    /// Rolling byte fed to input tasks.
    input_level: u8,
}

impl SimClock {
    pub const fn new() -> Self {
        SimClock {
            now: 0,
            tasks: Vec::new(),
            refuse_create: false,
            refuse_cancel: false,
            refuse_input_pins: false,
            output: Vec::new(),
            input_level: 0,
        }
    }

    /// Move time forward by `ticks` and perform all transfers that fall due.
    pub fn advance(&mut self, ticks: Ticks) {
        self.now += ticks;
        let now = self.now;
        let mut index = 0;
        while index < self.tasks.len() {
            let retired =
                self.tasks[index].run_until(now, &mut self.output, &mut self.input_level);
            if retired {
                self.tasks.remove(index);
            } else {
                index += 1;
            }
        }
    }

    /// Refuse subsequent `create_task` calls.
    pub fn refuse_create(&mut self, refuse: bool) {
        self.refuse_create = refuse;
    }

    /// Refuse subsequent `cancel_task` calls.
    pub fn refuse_cancel(&mut self, refuse: bool) {
        self.refuse_cancel = refuse;
    }

    /// Refuse subsequent `prepare_input_pin` calls.
    pub fn refuse_input_pins(&mut self, refuse: bool) {
        self.refuse_input_pins = refuse;
    }

    /// Number of live tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Scheduled first-transfer time of the task keyed by `primary`.
    pub fn task_start(&self, primary: BufferId) -> Option<Ticks> {
        self.find(primary).map(|task| task.config.start)
    }

    /// Bytes transferred by output tasks so far, oldest first.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    fn find(&self, primary: BufferId) -> Option<&SimTask> {
        self.tasks.iter().find(|task| task.key == primary)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleClock for SimClock {
    fn now(&self) -> Ticks {
        self.now
    }

    fn ticks_from_micros(&self, micros: u64) -> Ticks {
        micros
    }

    fn pin_valid(&self, pin: Pin) -> bool {
        pin.0 < SIM_PIN_COUNT
    }

    fn prepare_input_pin(&mut self, pin: Pin) -> Result<(), ClockError> {
        if self.refuse_input_pins || !self.pin_valid(pin) {
            return Err(ClockError);
        }
        Ok(())
    }

    fn create_task(
        &mut self,
        config: TaskConfig,
        primary: BufferLease,
        wraparound: Option<BufferLease>,
    ) -> Result<(), ClockError> {
        if self.refuse_create {
            return Err(ClockError);
        }
        // A zero period would never advance next_fire.
        if config.period == 0 || primary.is_empty() {
            return Err(ClockError);
        }
        // One task per buffer, as on the real subsystem.
        if self.find(primary.id()).is_some() {
            return Err(ClockError);
        }
        self.tasks.push(SimTask {
            key: primary.id(),
            config,
            current: primary,
            pending: wraparound,
            position: 0,
            next_fire: config.start,
        });
        Ok(())
    }

    fn query_task(&mut self, primary: BufferId) -> Option<TaskSnapshot> {
        self.find(primary).map(|task| TaskSnapshot {
            current: task.current.id(),
            wraparound: task.pending.map(|lease| lease.id()),
        })
    }

    fn cancel_task(&mut self, primary: BufferId) -> Result<(), ClockError> {
        if self.refuse_cancel {
            return Err(ClockError);
        }
        let position = self
            .tasks
            .iter()
            .position(|task| task.key == primary)
            .ok_or(ClockError)?;
        self.tasks.remove(position);
        Ok(())
    }
}

/// Order-preserving notification recorder.
#[derive(Default)]
pub struct EventLog {
    events: Vec<Notification>,
}

impl EventLog {
    pub const fn new() -> Self {
        EventLog { events: Vec::new() }
    }

    /// Notifications recorded so far, oldest first.
    pub fn events(&self) -> &[Notification] {
        &self.events
    }

    /// Drain and return everything recorded.
    pub fn take(&mut self) -> Vec<Notification> {
        core::mem::take(&mut self.events)
    }
}

impl EventSink for EventLog {
    fn queue(&mut self, notification: Notification) {
        self.events.push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferPair, BufferSlot};

    fn output_config(start: Ticks, period: Ticks) -> TaskConfig {
        TaskConfig {
            start,
            period,
            pin: Pin(1),
            direction: Direction::Output,
        }
    }

    #[test]
    fn one_shot_output_retires_at_buffer_end() {
        let mut clock = SimClock::new();
        let mut pair = BufferPair::allocate(4, false).unwrap();
        pair.get_mut(BufferSlot::Primary).unwrap().copy_from_slice(&[10, 20, 30, 40]);

        clock
            .create_task(output_config(0, 100), pair.primary_lease(), None)
            .unwrap();
        assert_eq!(clock.task_count(), 1);

        clock.advance(250);
        assert_eq!(clock.output(), [10, 20, 30]);
        assert_eq!(clock.task_count(), 1);

        clock.advance(100);
        assert_eq!(clock.output(), [10, 20, 30, 40]);
        // Exhausted with no wraparound: retired.
        assert_eq!(clock.task_count(), 0);
        assert!(clock.query_task(pair.primary_id()).is_none());
    }

    #[test]
    fn single_buffer_repeat_loops() {
        let mut clock = SimClock::new();
        let mut pair = BufferPair::allocate(2, false).unwrap();
        pair.get_mut(BufferSlot::Primary).unwrap().copy_from_slice(&[7, 9]);

        clock
            .create_task(
                output_config(0, 100),
                pair.primary_lease(),
                Some(pair.wraparound_lease()),
            )
            .unwrap();

        clock.advance(500);
        assert_eq!(clock.output(), [7, 9, 7, 9, 7, 9]);
        // Still looping, and the snapshot never looks double-buffered.
        let snapshot = clock.query_task(pair.primary_id()).unwrap();
        assert!(!snapshot.is_double_buffered());
    }

    #[test]
    fn double_buffer_swaps_current_at_wraparound() {
        let mut clock = SimClock::new();
        let pair = BufferPair::allocate(3, true).unwrap();
        let primary = pair.primary_id();

        clock
            .create_task(
                output_config(0, 100),
                pair.primary_lease(),
                Some(pair.wraparound_lease()),
            )
            .unwrap();

        let snapshot = clock.query_task(primary).unwrap();
        assert_eq!(snapshot.active_index(primary), 0);

        // Three transfers exhaust the primary buffer.
        clock.advance(200);
        let snapshot = clock.query_task(primary).unwrap();
        assert_eq!(snapshot.active_index(primary), 1);
        assert!(snapshot.is_double_buffered());

        // Three more exhaust the secondary and swap back.
        clock.advance(300);
        let snapshot = clock.query_task(primary).unwrap();
        assert_eq!(snapshot.active_index(primary), 0);
    }

    #[test]
    fn input_task_fills_buffer() {
        let mut clock = SimClock::new();
        let pair = BufferPair::allocate(4, false).unwrap();

        clock
            .create_task(
                TaskConfig {
                    start: 0,
                    period: 50,
                    pin: Pin(1),
                    direction: Direction::Input,
                },
                pair.primary_lease(),
                None,
            )
            .unwrap();

        clock.advance(200);
        assert_eq!(clock.task_count(), 0);
        assert_eq!(&pair.get(BufferSlot::Primary).unwrap()[..], [1, 2, 3, 4]);
    }

    #[test]
    fn duplicate_task_per_buffer_rejected() {
        let mut clock = SimClock::new();
        let pair = BufferPair::allocate(4, false).unwrap();

        clock
            .create_task(output_config(0, 100), pair.primary_lease(), None)
            .unwrap();
        let duplicate = clock.create_task(output_config(0, 100), pair.primary_lease(), None);
        assert_eq!(duplicate, Err(ClockError));
    }

    #[test]
    fn start_time_defers_first_transfer() {
        let mut clock = SimClock::new();
        let mut pair = BufferPair::allocate(2, false).unwrap();
        pair.get_mut(BufferSlot::Primary).unwrap().copy_from_slice(&[5, 6]);

        clock
            .create_task(output_config(1_000, 100), pair.primary_lease(), None)
            .unwrap();

        clock.advance(999);
        assert!(clock.output().is_empty());
        clock.advance(1);
        assert_eq!(clock.output(), [5]);
    }
}
