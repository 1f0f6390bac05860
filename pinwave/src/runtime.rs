//! Controller arena, active-set registry, and the runtime-lifecycle hooks.
//!
//! [`WaveformRuntime`] owns every controller the host creates and the ordered
//! registry of controllers that currently need polling. The host embeds it by
//! wiring two hooks into its interpreter loop:
//!
//! - [`idle`](WaveformRuntime::idle) — once per idle tick; walks the registry
//!   in order, turns task snapshots into notifications, prunes finished
//!   streams.
//! - [`kill`](WaveformRuntime::kill) — once at shutdown; best-effort bulk
//!   stop that forces the registry empty.
//!
//! The sample clock and the event sink are threaded through the hooks as
//! arguments; the runtime keeps no ambient global state.
//!
//! ## Ordering guarantees
//!
//! Registry order is insertion order. A controller is polled at most once per
//! pass, notifications are emitted in registry order, and pruning preserves
//! the order of the survivors.

use alloc::vec::Vec;

use crate::clock::{Direction, Pin, SampleClock};
use crate::constants::MAX_ACTIVE_WAVEFORMS;
use crate::error::Error;
use crate::event::EventSink;
use crate::waveform::{CreateOptions, StartOptions, Waveform};

/// Handle to a controller owned by a [`WaveformRuntime`].
///
/// Stays valid until the controller is [`release`](WaveformRuntime::release)d;
/// a stale handle is rejected with [`Error::InvalidArgument`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaveformId(u16);

impl WaveformId {
    pub(crate) fn from_index(index: usize) -> Self {
        WaveformId(index as u16)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

type ActiveSet = heapless::Vec<WaveformId, MAX_ACTIVE_WAVEFORMS>;

/// Owns all waveform controllers and drives their reconciliation.
pub struct WaveformRuntime {
    slots: Vec<Option<Waveform>>,
    /// Insertion-ordered, duplicate-free set of controllers needing polling.
    active: ActiveSet,
}

impl WaveformRuntime {
    pub const fn new() -> Self {
        WaveformRuntime {
            slots: Vec::new(),
            active: ActiveSet::new(),
        }
    }

    /// Build a controller with `samples` bytes per buffer (two buffers when
    /// `options.double_buffer`). The new controller is idle and unregistered.
    pub fn create(&mut self, samples: usize, options: CreateOptions) -> Result<WaveformId, Error> {
        let waveform = Waveform::new(samples, options)?;
        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(waveform);
            return Ok(WaveformId::from_index(index));
        }
        let index = self.slots.len();
        if index > u16::MAX as usize {
            return Err(Error::OutOfMemory);
        }
        self.slots.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        self.slots.push(Some(waveform));
        Ok(WaveformId::from_index(index))
    }

    /// Drop an idle controller and its buffers. Running controllers must be
    /// stopped first.
    pub fn release(&mut self, id: WaveformId) -> Result<(), Error> {
        let waveform = Self::lookup(&self.slots, id)?;
        if waveform.is_running() {
            return Err(Error::AlreadyRunning);
        }
        self.slots[id.index()] = None;
        Ok(())
    }

    /// Shared access to a controller (state queries, buffer contents).
    pub fn waveform(&self, id: WaveformId) -> Result<&Waveform, Error> {
        Self::lookup(&self.slots, id)
    }

    /// Mutable access to a controller (refilling/draining buffers).
    pub fn waveform_mut(&mut self, id: WaveformId) -> Result<&mut Waveform, Error> {
        Self::lookup_mut(&mut self.slots, id)
    }

    /// Start streaming buffer bytes out of `pin` at `frequency` Hz.
    pub fn start_output<C: SampleClock>(
        &mut self,
        id: WaveformId,
        clock: &mut C,
        pin: Pin,
        frequency: f32,
        options: StartOptions,
    ) -> Result<(), Error> {
        self.start(id, clock, pin, frequency, options, Direction::Output)
    }

    /// Start sampling `pin` into the buffer at `frequency` Hz.
    pub fn start_input<C: SampleClock>(
        &mut self,
        id: WaveformId,
        clock: &mut C,
        pin: Pin,
        frequency: f32,
        options: StartOptions,
    ) -> Result<(), Error> {
        self.start(id, clock, pin, frequency, options, Direction::Input)
    }

    fn start<C: SampleClock>(
        &mut self,
        id: WaveformId,
        clock: &mut C,
        pin: Pin,
        frequency: f32,
        options: StartOptions,
        direction: Direction,
    ) -> Result<(), Error> {
        let waveform = Self::lookup_mut(&mut self.slots, id)?;
        if waveform.is_running() {
            return Err(Error::AlreadyRunning);
        }
        // Registry room is part of "can this be scheduled": check it before
        // the task exists so a task never outlives its membership.
        if self.active.is_full() {
            return Err(Error::SchedulingFailed);
        }
        waveform.begin(clock, pin, frequency, options, direction)?;
        // Capacity checked above; an idle controller is never registered.
        let _ = self.active.push(id);
        Ok(())
    }

    /// Stop a running stream.
    ///
    /// Cancels the timer task, then runs a reconciliation pass limited to
    /// this controller so the `finish` notification is emitted and the
    /// registry entry removed. A refused cancellation returns
    /// [`Error::StopFailed`] — the limited pass still runs, and on a clock
    /// where the task genuinely survived, the controller legitimately stays
    /// running and registered.
    pub fn stop<C: SampleClock, S: EventSink>(
        &mut self,
        id: WaveformId,
        clock: &mut C,
        sink: &mut S,
    ) -> Result<(), Error> {
        let waveform = Self::lookup_mut(&mut self.slots, id)?;
        let cancelled = match waveform.request_stop(clock) {
            Err(Error::NotRunning) => return Err(Error::NotRunning),
            other => other,
        };
        if !waveform.reconcile(id, clock, sink) {
            Self::deregister(&mut self.active, id);
        }
        cancelled
    }

    /// The idle hook: one reconciliation pass over the active set, in
    /// registry order, one task snapshot per controller.
    pub fn idle<C: SampleClock, S: EventSink>(&mut self, clock: &mut C, sink: &mut S) {
        let polled = self.active.clone();
        self.active.clear();
        for &id in polled.iter() {
            let keep = match Self::lookup_mut(&mut self.slots, id) {
                Ok(waveform) => waveform.reconcile(id, clock, sink),
                // Released slots are never registered.
                Err(_) => false,
            };
            if keep {
                let _ = self.active.push(id);
            }
        }
    }

    /// The kill hook: force-stop every running stream at shutdown.
    ///
    /// Cancellations are best effort — a refusal is logged per controller and
    /// the sweep continues. Afterwards no controller is running and the
    /// registry is empty, regardless of individual outcomes. Unlike
    /// [`stop`](Self::stop), this path does not wait for a clean task-absent
    /// signal and emits no notifications.
    pub fn kill<C: SampleClock>(&mut self, clock: &mut C) {
        for &id in self.active.iter() {
            if let Ok(waveform) = Self::lookup_mut(&mut self.slots, id) {
                if waveform.is_running() {
                    let cancelled = clock.cancel_task(waveform.primary_id());
                    if cancelled.is_err() {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("waveform {=u16} could not be stopped", id.0);
                    }
                    waveform.force_idle();
                }
            }
        }
        self.active.clear();
    }

    /// Number of controllers currently registered for polling.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// How many times `id` appears in the registry (0 or 1).
    pub fn registered_count(&self, id: WaveformId) -> usize {
        self.active.iter().filter(|&&a| a == id).count()
    }

    fn lookup(slots: &[Option<Waveform>], id: WaveformId) -> Result<&Waveform, Error> {
        slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidArgument)
    }

    fn lookup_mut(
        slots: &mut [Option<Waveform>],
        id: WaveformId,
    ) -> Result<&mut Waveform, Error> {
        slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidArgument)
    }

    fn deregister(active: &mut ActiveSet, id: WaveformId) {
        if let Some(position) = active.iter().position(|&a| a == id) {
            active.remove(position);
        }
    }
}

impl Default for WaveformRuntime {
    fn default() -> Self {
        Self::new()
    }
}
