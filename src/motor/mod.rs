// Motor control module for the shuttle robot
//
// Provides:
// - Two-byte drive command encoding
// - Serial (and in-memory) links to the motor controller
// - High-level motor driver API

pub mod command;
mod driver;
pub mod link;

pub use command::{DriveCommand, StatusCode};
pub use driver::MotorDriver;
pub use link::{RecordingTransport, SerialTransport, Transport, TransportError};
