//! Time subsystem configuration

use serde::{Deserialize, Serialize};

/// Tunables for the continuous PLL, lockstep, and mode switching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Fixed step used by deterministic (lockstep) mode, seconds.
    pub fixed_delta_seconds: f32,
    /// P-controller gain applied to the filtered clock error.
    pub pll_gain: f64,
    /// Per-update slew limit on the PLL correction, as a fraction of dt.
    pub max_slew: f32,
    /// Filtered error beyond this snaps the virtual clock to the master.
    pub snap_threshold_ms: f64,
    /// Median filter window over per-pulse clock errors, in samples.
    pub jitter_window: u32,
    /// Lookahead when scheduling the continuous-to-stepped barrier frame.
    pub pause_barrier_frames: u32,
    /// Transport latency compensation added to pulse targets, microseconds.
    pub average_latency_ticks: i64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            fixed_delta_seconds: 1.0 / 60.0,
            pll_gain: 0.1,
            max_slew: 0.05,
            snap_threshold_ms: 500.0,
            jitter_window: 5,
            pause_barrier_frames: 5,
            average_latency_ticks: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TimeConfig::default();
        assert!((config.fixed_delta_seconds - 1.0 / 60.0).abs() < f32::EPSILON);
        assert_eq!(config.pll_gain, 0.1);
        assert_eq!(config.max_slew, 0.05);
        assert_eq!(config.snap_threshold_ms, 500.0);
        assert_eq!(config.jitter_window, 5);
        assert_eq!(config.pause_barrier_frames, 5);
        assert_eq!(config.average_latency_ticks, 0);
    }
}
