// Course control module
//
// Provides:
// - The course phase state machine
// - The per-tick control loop tying sensor, integrator and motors together

mod controller;
pub mod course;

pub use controller::{ControlLoop, LoopConfig, TickOutcome};
pub use course::{Course, CourseConfig, CoursePhase};

use crate::motor::TransportError;
use crate::sensor::SensorError;

/// Error types for the control loop
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Motor link error: {0}")]
    Transport(#[from] TransportError),
}
