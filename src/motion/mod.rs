// Motion estimation for dead reckoning
//
// Provides:
// - Fixed-point velocity/distance integration
// - Sample averaging and noise floor
// - The motion state carried between ticks

pub mod filter;
pub mod integrator;

use serde::Serialize;

use crate::config::{COUNTS_PER_G, MM_PER_S2_PER_G};

pub use filter::{SampleWindow, noise_floor};
pub use integrator::{update_distance, update_velocity};

/// Integrated velocity (mm/s) and distance (mm) along the drive axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MotionState {
    pub velocity: i32,
    pub distance: i32,
}

impl MotionState {
    /// Advance one step: velocity first, then distance from the new velocity
    pub fn advance(&mut self, accel_mm_s2: i32, dt_ms: i32) {
        self.velocity = update_velocity(accel_mm_s2, self.velocity, dt_ms);
        self.distance = update_distance(self.velocity, self.distance, dt_ms);
    }
}

/// Convert raw accelerometer counts (+/-2g range) to mm/s^2
pub fn counts_to_mm_s2(counts: i32) -> i32 {
    counts * MM_PER_S2_PER_G / COUNTS_PER_G
}
