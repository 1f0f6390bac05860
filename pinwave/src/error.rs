use core::fmt;

/// Errors surfaced by waveform construction, lifecycle operations, and
/// content access.
///
/// None of these are fatal to the host runtime; every operation that fails
/// either leaves state untouched (construction and argument validation) or
/// still drives the controller toward a consistent local state (`stop` after
/// a refused cancellation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A sample count of zero, a buffer slot the controller does not have,
    /// or a `WaveformId` that no longer resolves.
    InvalidArgument,
    /// The sample clock rejected the pin (invalid handle, or it cannot be
    /// prepared for analog capture).
    InvalidPin,
    /// The requested sample rate is non-finite or below
    /// [`MIN_FREQUENCY_HZ`](crate::constants::MIN_FREQUENCY_HZ).
    InvalidFrequency,
    /// `start` was called on a controller that is already running, or
    /// `release` on a controller that must be stopped first.
    AlreadyRunning,
    /// `stop` was called on a controller that is not running.
    NotRunning,
    /// The timer subsystem refused to create a task, or the active-set
    /// registry is full. The controller remains idle and unregistered.
    SchedulingFailed,
    /// The timer subsystem refused to cancel the task. Reconciliation still
    /// runs so local bookkeeping converges.
    StopFailed,
    /// Buffer allocation failed during construction. No partially built
    /// controller escapes.
    OutOfMemory,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Error::InvalidArgument => "invalid argument",
            Error::InvalidPin => "invalid pin",
            Error::InvalidFrequency => "frequency must be finite and at least 1Hz",
            Error::AlreadyRunning => "waveform is already running",
            Error::NotRunning => "waveform is not running",
            Error::SchedulingFailed => "unable to schedule a timer task",
            Error::StopFailed => "waveform could not be stopped",
            Error::OutOfMemory => "out of memory",
        };
        f.write_str(message)
    }
}

impl core::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_host_readable() {
        use alloc::string::ToString;

        assert_eq!(Error::NotRunning.to_string(), "waveform is not running");
        assert_eq!(
            Error::SchedulingFailed.to_string(),
            "unable to schedule a timer task"
        );
    }
}
