//! Double-buffered streaming walkthrough — runs anywhere, no hardware.
//!
//! Plays a short sawtooth out of a simulated pin using two 8-byte buffers,
//! refilling each buffer as the runtime hands it back, then records a window
//! of input from another pin. Prints the notification stream as it happens.
//!
//! ```text
//!   WaveformRuntime ──start_output──► SimClock (timer domain)
//!        ▲                                │ advance()
//!        └──────── idle() ◄───────────────┘
//! ```

use pinwave::sim::{EventLog, SimClock};
use pinwave::{BufferSlot, CreateOptions, Notification, Pin, StartOptions, WaveformRuntime};

const SAMPLES: usize = 8;
const FREQ_HZ: f32 = 1000.0;
/// One buffer's worth of sim time at `FREQ_HZ` (ticks are microseconds).
const WINDOW: u64 = SAMPLES as u64 * 1_000;

fn sawtooth(phase: u8) -> [u8; SAMPLES] {
    core::array::from_fn(|i| phase.wrapping_add(i as u8).wrapping_mul(16))
}

fn drain_events(events: &mut EventLog) -> Vec<Notification> {
    let drained = events.take();
    for event in &drained {
        match event {
            Notification::Buffer { waveform, free } => {
                println!("  event: buffer {free:?} of {waveform:?} is free")
            }
            Notification::Finish { waveform } => {
                println!("  event: {waveform:?} finished")
            }
        }
    }
    drained
}

fn main() {
    let mut runtime = WaveformRuntime::new();
    let mut clock = SimClock::new();
    let mut events = EventLog::new();

    // ── Output: double-buffered sawtooth ────────────────────────────
    println!("starting double-buffered output on pin 2 @ {FREQ_HZ} Hz");
    let out = runtime
        .create(SAMPLES, CreateOptions { double_buffer: true })
        .expect("create output waveform");
    runtime
        .waveform_mut(out)
        .unwrap()
        .buffer_mut(BufferSlot::Primary)
        .unwrap()
        .copy_from_slice(&sawtooth(0));
    runtime
        .waveform_mut(out)
        .unwrap()
        .buffer_mut(BufferSlot::Secondary)
        .unwrap()
        .copy_from_slice(&sawtooth(1));
    runtime
        .start_output(
            out,
            &mut clock,
            Pin(2),
            FREQ_HZ,
            StartOptions {
                time: None,
                repeat: true,
            },
        )
        .expect("start output");

    // Stream four windows, refilling whichever buffer comes back free.
    let mut phase = 2u8;
    for window in 0..4 {
        clock.advance(WINDOW);
        runtime.idle(&mut clock, &mut events);
        println!("window {window}: {} bytes on the wire", clock.output().len());
        for event in drain_events(&mut events) {
            if let Notification::Buffer { free, .. } = event {
                runtime
                    .waveform_mut(out)
                    .unwrap()
                    .buffer_mut(free)
                    .unwrap()
                    .copy_from_slice(&sawtooth(phase));
                phase = phase.wrapping_add(1);
            }
        }
    }

    runtime
        .stop(out, &mut clock, &mut events)
        .expect("stop output");
    drain_events(&mut events);
    println!("streamed {} bytes total\n", clock.output().len());

    // ── Input: capture one window from pin 7 ────────────────────────
    println!("recording {SAMPLES} samples from pin 7");
    let rec = runtime
        .create(SAMPLES, CreateOptions::default())
        .expect("create input waveform");
    runtime
        .start_input(rec, &mut clock, Pin(7), FREQ_HZ, StartOptions::default())
        .expect("start input");

    clock.advance(WINDOW + 1_000);
    runtime.idle(&mut clock, &mut events);
    drain_events(&mut events);

    let captured = runtime.waveform(rec).unwrap();
    println!("captured: {:?}", &captured.buffer(BufferSlot::Primary).unwrap()[..]);
}
