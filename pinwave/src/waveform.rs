//! Per-stream waveform controller.
//!
//! A [`Waveform`] is the lifecycle state machine of one analog stream:
//! `Idle` → `Running` → `Idle`, restartable. It owns its buffer pair for its
//! whole lifetime, validates and performs the `start`/`stop` transitions
//! against the sample clock, and reconciles one task snapshot per idle pass
//! into buffer/finish notifications.
//!
//! Controllers live in a [`WaveformRuntime`](crate::runtime::WaveformRuntime)
//! arena; the runtime drives reconciliation and owns the active-set registry.

use crate::buffer::{BufferPair, BufferSlot, SampleBuffer};
use crate::clock::{Direction, Pin, SampleClock, TaskConfig, Ticks};
use crate::constants::MIN_FREQUENCY_HZ;
use crate::error::Error;
use crate::event::{EventSink, Notification};
use crate::runtime::WaveformId;

/// Construction options.
#[derive(Clone, Copy, Default, Debug)]
pub struct CreateOptions {
    /// Allocate a second buffer of the same size for double-buffered
    /// streaming.
    pub double_buffer: bool,
}

/// Options for `start_output`/`start_input`.
#[derive(Clone, Copy, Default, Debug)]
pub struct StartOptions {
    /// Absolute start time in seconds. A finite positive value schedules the
    /// first sample transfer at that time; anything else means "start now".
    pub time: Option<f64>,
    /// Keep streaming after the buffer is exhausted: a double-buffered
    /// controller alternates between its two buffers, a single-buffered one
    /// loops on its only buffer.
    pub repeat: bool,
}

/// One waveform stream: a buffer pair plus lifecycle state.
pub struct Waveform {
    buffers: BufferPair,
    running: bool,
    frequency: Option<f32>,
    /// Index (0/1) of the buffer the task was last observed transferring.
    /// Meaningful only while a double-buffered task runs.
    active_index: u8,
}

impl Waveform {
    /// Build a controller with `samples` bytes per buffer. Construction is
    /// atomic: on any failure nothing is allocated and no controller exists.
    pub(crate) fn new(samples: usize, options: CreateOptions) -> Result<Self, Error> {
        let buffers = BufferPair::allocate(samples, options.double_buffer)?;
        Ok(Waveform {
            buffers,
            running: false,
            frequency: None,
            active_index: 0,
        })
    }

    /// `true` between a successful start and the observed end of the run.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Sample rate recorded by the most recent start, if any.
    pub fn frequency(&self) -> Option<f32> {
        self.frequency
    }

    /// Bytes per buffer.
    pub fn sample_count(&self) -> usize {
        self.buffers.sample_count()
    }

    pub fn is_double_buffered(&self) -> bool {
        self.buffers.is_double_buffered()
    }

    /// Access a buffer's contents. `None` if the controller has no buffer in
    /// that slot.
    pub fn buffer(&self, slot: BufferSlot) -> Option<&SampleBuffer> {
        self.buffers.get(slot)
    }

    /// Mutable access for refilling/draining between wraparounds. During a
    /// run, only the buffer most recently reported free is safe to touch.
    pub fn buffer_mut(&mut self, slot: BufferSlot) -> Option<&mut SampleBuffer> {
        self.buffers.get_mut(slot)
    }

    pub(crate) fn primary_id(&self) -> crate::buffer::BufferId {
        self.buffers.primary_id()
    }

    /// Validate arguments and request a timer task. On success the controller
    /// is `Running`; on any failure it is untouched and still `Idle`.
    ///
    /// The caller (the runtime) registers the controller afterwards; registry
    /// capacity has already been checked, so registration cannot fail once a
    /// task exists.
    pub(crate) fn begin<C: SampleClock>(
        &mut self,
        clock: &mut C,
        pin: Pin,
        frequency: f32,
        options: StartOptions,
        direction: Direction,
    ) -> Result<(), Error> {
        if self.running {
            return Err(Error::AlreadyRunning);
        }
        if !clock.pin_valid(pin) {
            return Err(Error::InvalidPin);
        }
        if !frequency.is_finite() || frequency < MIN_FREQUENCY_HZ {
            return Err(Error::InvalidFrequency);
        }
        if direction == Direction::Input {
            clock
                .prepare_input_pin(pin)
                .map_err(|_| Error::InvalidPin)?;
        }

        let config = TaskConfig {
            start: start_time(clock, options.time),
            period: clock.ticks_from_micros(period_micros(frequency)),
            pin,
            direction,
        };
        let wraparound = options.repeat.then(|| self.buffers.wraparound_lease());
        clock
            .create_task(config, self.buffers.primary_lease(), wraparound)
            .map_err(|_| Error::SchedulingFailed)?;

        self.running = true;
        self.frequency = Some(frequency);
        self.active_index = 0;
        Ok(())
    }

    /// Ask the clock to cancel the running task. Does not touch local state;
    /// the follow-up reconciliation pass converges the bookkeeping whether or
    /// not the cancellation was accepted.
    pub(crate) fn request_stop<C: SampleClock>(&self, clock: &mut C) -> Result<(), Error> {
        if !self.running {
            return Err(Error::NotRunning);
        }
        clock
            .cancel_task(self.buffers.primary_id())
            .map_err(|_| Error::StopFailed)
    }

    /// One reconciliation step, derived entirely from a single task snapshot.
    /// Returns whether the controller still needs polling.
    ///
    /// - Task retired → queue `finish` (primary buffer payload), go `Idle`.
    /// - Double-buffered task switched buffers since the last pass → record
    ///   the new active index and queue `buffer` carrying the slot the task
    ///   no longer touches.
    /// - Otherwise nothing changes, so a second pass over unchanged task
    ///   state emits nothing.
    pub(crate) fn reconcile<C: SampleClock, S: EventSink>(
        &mut self,
        id: WaveformId,
        clock: &mut C,
        sink: &mut S,
    ) -> bool {
        if !self.running {
            return false;
        }
        let primary = self.buffers.primary_id();
        let Some(snapshot) = clock.query_task(primary) else {
            sink.queue(Notification::Finish { waveform: id });
            self.running = false;
            return false;
        };
        if snapshot.is_double_buffered() {
            let active = snapshot.active_index(primary);
            if active != self.active_index {
                self.active_index = active;
                sink.queue(Notification::Buffer {
                    waveform: id,
                    free: BufferSlot::from_index(1 - active),
                });
            }
        }
        true
    }

    /// Force the controller to `Idle` without waiting for the clock —
    /// teardown only.
    pub(crate) fn force_idle(&mut self) {
        self.running = false;
    }
}

/// Microseconds between samples at `frequency` Hz, rounded to the nearest.
fn period_micros(frequency: f32) -> u64 {
    libm::round(1_000_000.0 / frequency as f64) as u64
}

/// Resolve the requested start time against the clock: a finite positive
/// `time` (absolute seconds) is honored, anything else starts now.
fn start_time<C: SampleClock>(clock: &C, time: Option<f64>) -> Ticks {
    match time {
        Some(seconds) if seconds.is_finite() && seconds > 0.0 => {
            clock.ticks_from_micros(libm::round(seconds * 1_000_000.0) as u64)
        }
        _ => clock.now(),
    }
}


#[cfg(all(test, feature = "sim"))]
mod sim_tests {
    use super::*;
    use crate::sim::{EventLog, SimClock};

    fn running_waveform(clock: &mut SimClock) -> Waveform {
        let mut waveform = Waveform::new(8, CreateOptions::default()).unwrap();
        waveform
            .begin(
                clock,
                Pin(3),
                1000.0,
                StartOptions::default(),
                Direction::Output,
            )
            .unwrap();
        waveform
    }

    #[test]
    fn begin_validates_before_scheduling() {
        let mut clock = SimClock::new();
        let mut waveform = Waveform::new(8, CreateOptions::default()).unwrap();

        let bad_pin = waveform.begin(
            &mut clock,
            Pin(200),
            1000.0,
            StartOptions::default(),
            Direction::Output,
        );
        assert_eq!(bad_pin.err(), Some(Error::InvalidPin));

        let bad_freq = waveform.begin(
            &mut clock,
            Pin(3),
            0.5,
            StartOptions::default(),
            Direction::Output,
        );
        assert_eq!(bad_freq.err(), Some(Error::InvalidFrequency));

        let nan_freq = waveform.begin(
            &mut clock,
            Pin(3),
            f32::NAN,
            StartOptions::default(),
            Direction::Output,
        );
        assert_eq!(nan_freq.err(), Some(Error::InvalidFrequency));

        // None of the rejections reached the timer subsystem.
        assert_eq!(clock.task_count(), 0);
        assert!(!waveform.is_running());
    }

    #[test]
    fn begin_records_state_and_creates_task() {
        let mut clock = SimClock::new();
        let waveform = running_waveform(&mut clock);
        assert!(waveform.is_running());
        assert_eq!(waveform.frequency(), Some(1000.0));
        assert_eq!(clock.task_count(), 1);
    }

    #[test]
    fn begin_twice_is_already_running() {
        let mut clock = SimClock::new();
        let mut waveform = running_waveform(&mut clock);
        let second = waveform.begin(
            &mut clock,
            Pin(3),
            1000.0,
            StartOptions::default(),
            Direction::Output,
        );
        assert_eq!(second.err(), Some(Error::AlreadyRunning));
        assert_eq!(clock.task_count(), 1);
    }

    #[test]
    fn scheduling_refusal_leaves_idle() {
        let mut clock = SimClock::new();
        clock.refuse_create(true);
        let mut waveform = Waveform::new(8, CreateOptions::default()).unwrap();
        let result = waveform.begin(
            &mut clock,
            Pin(3),
            1000.0,
            StartOptions::default(),
            Direction::Output,
        );
        assert_eq!(result.err(), Some(Error::SchedulingFailed));
        assert!(!waveform.is_running());
        assert_eq!(waveform.frequency(), None);
    }

    #[test]
    fn input_pin_preparation_failure_maps_to_invalid_pin() {
        let mut clock = SimClock::new();
        clock.refuse_input_pins(true);
        let mut waveform = Waveform::new(8, CreateOptions::default()).unwrap();
        let result = waveform.begin(
            &mut clock,
            Pin(3),
            1000.0,
            StartOptions::default(),
            Direction::Input,
        );
        assert_eq!(result.err(), Some(Error::InvalidPin));
        assert_eq!(clock.task_count(), 0);
    }

    #[test]
    fn future_start_time_is_honored() {
        let mut clock = SimClock::new();
        clock.advance(500);
        let mut waveform = Waveform::new(8, CreateOptions::default()).unwrap();
        waveform
            .begin(
                &mut clock,
                Pin(3),
                1000.0,
                StartOptions {
                    time: Some(0.002),
                    repeat: false,
                },
                Direction::Output,
            )
            .unwrap();
        assert_eq!(clock.task_start(waveform.primary_id()), Some(2_000));
    }

    #[test]
    fn non_finite_start_time_means_now() {
        let mut clock = SimClock::new();
        clock.advance(500);
        let mut waveform = Waveform::new(8, CreateOptions::default()).unwrap();
        waveform
            .begin(
                &mut clock,
                Pin(3),
                1000.0,
                StartOptions {
                    time: Some(f64::INFINITY),
                    repeat: false,
                },
                Direction::Output,
            )
            .unwrap();
        assert_eq!(clock.task_start(waveform.primary_id()), Some(500));
    }

    #[test]
    fn reconcile_emits_finish_once_task_retires() {
        let mut clock = SimClock::new();
        let mut sink = EventLog::new();
        let mut waveform = running_waveform(&mut clock);
        let id = WaveformId::from_index(0);

        // Task still live: nothing to report.
        assert!(waveform.reconcile(id, &mut clock, &mut sink));
        assert!(sink.events().is_empty());

        // 8 samples at 1kHz retire the one-shot task.
        clock.advance(9_000);
        assert!(!waveform.reconcile(id, &mut clock, &mut sink));
        assert_eq!(sink.take(), [Notification::Finish { waveform: id }]);
        assert!(!waveform.is_running());
    }
}
