// Accelerometer sensor module
//
// Provides:
// - 12-bit two's-complement sample decoding
// - MMA8450Q driver over the two-wire bus (init, sample, zero calibration)
// - A simulated MMA8450Q register file for the bench and tests

pub mod mma8450;
pub mod registers;
pub mod sim;

use serde::Serialize;

use crate::bus::BusError;

pub use mma8450::{CalibrationOffsets, Mma8450, Timing};

/// One signed X/Y/Z reading in raw device counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccelerationSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl AccelerationSample {
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Returns the axes as array [x, y, z]
    pub fn as_array(&self) -> [i16; 3] {
        [self.x, self.y, self.z]
    }
}

/// Combine an axis register pair into a signed 12-bit value.
///
/// The MSB register carries bits 11..4, the low nibble of the LSB register
/// bits 3..0. Raw values of 2048 and above are negative.
pub fn decode_axis(lsb: u8, msb: u8) -> i16 {
    let raw = ((u16::from(msb) << 4) | u16::from(lsb & 0x0F)) & 0x0FFF;
    if raw >= 2048 {
        raw as i16 - 4096
    } else {
        raw as i16
    }
}

/// Anything the control loop can pull acceleration samples from
pub trait AccelSource {
    fn read_sample(&mut self) -> Result<AccelerationSample, SensorError>;
}

/// Error types for the accelerometer
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Unexpected device identity 0x{found:02X} (expected 0x{expected:02X})")]
    UnexpectedIdentity { found: u8, expected: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_covers_full_12_bit_range() {
        for raw in 0u16..4096 {
            let lsb = (raw & 0x0F) as u8;
            let msb = (raw >> 4) as u8;
            let decoded = decode_axis(lsb, msb);
            if raw >= 2048 {
                assert_eq!(decoded, raw as i16 - 4096);
                assert!((-2048..=-1).contains(&decoded));
            } else {
                assert_eq!(decoded, raw as i16);
                assert!((0..=2047).contains(&decoded));
            }
        }
    }

    #[test]
    fn test_decode_ignores_high_nibble_of_lsb() {
        assert_eq!(decode_axis(0xF1, 0x00), 1);
        assert_eq!(decode_axis(0x0F, 0xFF), -1);
        assert_eq!(decode_axis(0x00, 0x80), -2048);
        assert_eq!(decode_axis(0x0F, 0x7F), 2047);
    }
}
