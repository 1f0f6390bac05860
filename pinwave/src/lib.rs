//! # pinwave
//!
//! A `no_std` double-buffered waveform I/O controller for cooperative
//! scripting runtimes: start streaming analog byte samples into or out of a
//! pin at a fixed sample rate, backed by one or two fixed-size buffers, and
//! reconcile the interrupt-driven progress of the hardware timer with an
//! interpreter loop that only checks state when polled — no locks, no
//! steady-state allocation, no lost or double-fired notifications.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Storage | [`buffer`] | Fixed-size sample buffers, resolved identities, timer-domain leases |
//! | Capability | [`clock`] / [`event`] | `SampleClock` and `EventSink` traits at the subsystem boundaries |
//! | Lifecycle | [`waveform`] | Per-stream controller: `Idle` ⇄ `Running`, snapshot reconciliation |
//! | Orchestration | [`runtime`] | Controller arena, active-set registry, `idle`/`kill` hooks |
//! | Simulation | [`sim`] | Software sample clock for host tests and demos (feature `sim`) |
//!
//! ## Quick start
//!
//! ```
//! use pinwave::sim::{EventLog, SimClock};
//! use pinwave::{CreateOptions, Pin, StartOptions, WaveformRuntime};
//!
//! let mut runtime = WaveformRuntime::new();
//! let mut clock = SimClock::new();
//! let mut events = EventLog::new();
//!
//! // Two 64-byte buffers, streamed out of pin 2 at 4kHz, alternating
//! // forever until stopped.
//! let wave = runtime.create(64, CreateOptions { double_buffer: true }).unwrap();
//! runtime
//!     .start_output(wave, &mut clock, Pin(2), 4000.0,
//!         StartOptions { time: None, repeat: true })
//!     .unwrap();
//!
//! // The hardware timer runs on its own; the interpreter polls.
//! clock.advance(16_250);
//! runtime.idle(&mut clock, &mut events);
//!
//! // A `buffer` notification names the half that is safe to refill.
//! assert_eq!(events.take().len(), 1);
//! runtime.stop(wave, &mut clock, &mut events).unwrap();
//! ```
//!
//! ## The two domains
//!
//! The timer subsystem advances sample transfer from interrupts, flipping
//! which buffer is "current" on double-buffer wraparound. The interpreter
//! domain — `start`, `stop`, and the [`idle`](runtime::WaveformRuntime::idle)
//! hook — is single-threaded and runs to completion. The two meet only
//! through immutable [`TaskSnapshot`](clock::TaskSnapshot) values and leased
//! buffers, never through shared locks.
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `sim` | yes | [`sim`]: software sample clock + event log |
//! | `defmt` | no | `defmt::Format` derives and per-site warnings |

#![no_std]

extern crate alloc;

pub mod buffer;
pub mod clock;
pub mod constants;
pub mod error;
pub mod event;
pub mod runtime;
pub mod waveform;

#[cfg(feature = "sim")]
pub mod sim;

pub use buffer::{BufferId, BufferLease, BufferSlot, SampleBuffer};
pub use clock::{ClockError, Direction, Pin, SampleClock, TaskConfig, TaskSnapshot, Ticks};
pub use error::Error;
pub use event::{EventSink, Notification};
pub use runtime::{WaveformId, WaveformRuntime};
pub use waveform::{CreateOptions, StartOptions, Waveform};
