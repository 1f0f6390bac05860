/// Maximum number of waveform streams that may run concurrently.
///
/// Bounds the active-set registry walked by [`WaveformRuntime::idle`]
/// (and therefore the worst-case work done per interpreter tick).
///
/// [`WaveformRuntime::idle`]: crate::runtime::WaveformRuntime::idle
pub const MAX_ACTIVE_WAVEFORMS: usize = 16;

/// Lowest schedulable sample rate in Hz.
pub const MIN_FREQUENCY_HZ: f32 = 1.0;
