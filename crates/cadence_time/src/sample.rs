// sample.rs - Time samples and controller state snapshots

/// What one controller update hands to the frame loop.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TimeSample {
    /// Scaled simulation delta for this frame, seconds.
    pub dt: f64,
    /// Wall (or lockstep) delta before time scaling, seconds.
    pub unscaled_dt: f64,
    /// Accumulated simulation time, seconds.
    pub total_time: f64,
    pub frame_number: i64,
    pub time_scale: f64,
}

impl TimeSample {
    /// A waiting sample: the controller did not advance this update.
    pub fn waiting(total_time: f64, frame_number: i64, time_scale: f64) -> Self {
        Self {
            dt: 0.0,
            unscaled_dt: 0.0,
            total_time,
            frame_number,
            time_scale,
        }
    }
}

/// Snapshot used to hand state across a controller swap.
///
/// `total_time` and `frame_number` survive a swap bit-for-bit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeState {
    pub total_time: f64,
    pub frame_number: i64,
    pub time_scale: f64,
}

impl Default for TimeState {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            frame_number: 0,
            time_scale: 1.0,
        }
    }
}
