/*
 * Scheduler Configuration
 *
 * Boot-time settings for the scheduler. The mode is fixed for the lifetime
 * of the system; it is normally picked from the kernel command line
 * (`-o mlfqs`).
 */

use super::types::{SchedMode, TimeSliceTicks};
use crate::utils::timer::TIMER_FREQ;

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Scheduling mode
    pub mode: SchedMode,

    /// Ticks a thread may run before preemption is requested
    pub time_slice: TimeSliceTicks,

    /// Timer interrupts per second
    pub timer_freq: u32,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            mode: SchedMode::Priority,
            time_slice: TimeSliceTicks::DEFAULT,
            timer_freq: TIMER_FREQ,
        }
    }
}

impl SchedConfig {
    /// Default configuration in MLFQS mode
    pub fn mlfqs() -> Self {
        Self {
            mode: SchedMode::Mlfqs,
            ..Self::default()
        }
    }

    /// Parse the kernel command line
    ///
    /// Recognizes `-o mlfqs`; every other token is left for other subsystems.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::default();
        let mut tokens = cmdline.split_whitespace();
        while let Some(token) = tokens.next() {
            if token == "-o" && tokens.next() == Some("mlfqs") {
                config.mode = SchedMode::Mlfqs;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedConfig::default();
        assert_eq!(config.mode, SchedMode::Priority);
        assert_eq!(config.time_slice, TimeSliceTicks(4));
        assert_eq!(config.timer_freq, 100);
    }

    #[test]
    fn test_cmdline() {
        assert_eq!(SchedConfig::from_cmdline("-q -o mlfqs run alarm").mode, SchedMode::Mlfqs);
        assert_eq!(SchedConfig::from_cmdline("-q run alarm").mode, SchedMode::Priority);
        assert_eq!(SchedConfig::from_cmdline("-o").mode, SchedMode::Priority);
        assert_eq!(SchedConfig::from_cmdline("").mode, SchedMode::Priority);
    }
}
