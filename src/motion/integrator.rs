// Fixed-point dead-reckoning integration
//
// Units: acceleration mm/s^2, dt ms, velocity mm/s, distance mm.
// `INTEGRATOR_SCALE` converts ms to s. Division truncates toward zero and the
// truncation error is not carried between steps.

use crate::config::INTEGRATOR_SCALE;

/// velocity = prev_velocity + accel * dt / scale
pub fn update_velocity(accel: i32, prev_velocity: i32, dt_ms: i32) -> i32 {
    prev_velocity.saturating_add(scaled_product(accel, dt_ms))
}

/// distance = prev_distance + velocity * dt / scale
pub fn update_distance(velocity: i32, prev_distance: i32, dt_ms: i32) -> i32 {
    prev_distance.saturating_add(scaled_product(velocity, dt_ms))
}

fn scaled_product(rate: i32, dt_ms: i32) -> i32 {
    let step = i64::from(rate) * i64::from(dt_ms) / i64::from(INTEGRATOR_SCALE);
    step.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
