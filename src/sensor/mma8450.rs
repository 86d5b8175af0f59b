// NXP MMA8450Q 3-axis accelerometer driver
//
// Zero calibration follows AN3916: sample at rest in 8g mode, write the
// negated error into the offset registers, repeat.

use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::registers::{
    ACTIVE_MODE, CALIBRATION_MODE, DATA_BURST_LEN, DEVICE_ID, GRAVITY_COUNTS_8G, Register,
    STANDBY_MODE, STATUS_ZYXOW,
};
use super::{AccelSource, AccelerationSample, SensorError, decode_axis};
use crate::bus::{Bus, Controller};
use crate::config::{ACCEL_ADDRESS, CALIBRATION_PASSES, CALIBRATION_SETTLE, POWER_UP_DELAY};

pub type Result<T> = std::result::Result<T, SensorError>;

/// Delays the driver sleeps through
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Before bus bring-up, for the supply rail to settle
    pub power_up: Duration,
    /// After entering calibration mode, before sampling
    pub calibration_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            power_up: POWER_UP_DELAY,
            calibration_settle: CALIBRATION_SETTLE,
        }
    }
}

impl Timing {
    /// No delays (simulated hardware)
    pub fn immediate() -> Self {
        Self {
            power_up: Duration::ZERO,
            calibration_settle: Duration::ZERO,
        }
    }
}

/// Offsets left in OFF_X/OFF_Y/OFF_Z after calibration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationOffsets {
    pub x: i8,
    pub y: i8,
    pub z: i8,
}

/// MMA8450Q on a two-wire bus
pub struct Mma8450<C> {
    bus: Bus<C>,
    timing: Timing,
}

impl<C: Controller> Mma8450<C> {
    pub fn new(bus: Bus<C>) -> Self {
        Self::with_timing(bus, Timing::default())
    }

    pub fn with_timing(bus: Bus<C>, timing: Timing) -> Self {
        Self { bus, timing }
    }

    /// Bring up the bus and put the device in active mode (+/-2g, 200 Hz)
    pub fn init(&mut self) -> Result<()> {
        sleep(self.timing.power_up);
        self.bus.init_master()?;
        self.bus.set_slave_address(ACCEL_ADDRESS);
        self.bus.write_register(Register::CtrlReg1.addr(), ACTIVE_MODE)?;
        info!("Accelerometer active at 0x{:02X}", ACCEL_ADDRESS);
        Ok(())
    }

    /// Read the WHO_AM_I register
    pub fn who_am_i(&mut self) -> Result<u8> {
        Ok(self.bus.read_register(Register::WhoAmI.addr())?)
    }

    /// Check that the device on the bus is an MMA8450Q
    pub fn verify_identity(&mut self) -> Result<()> {
        let found = self.who_am_i()?;
        if found != DEVICE_ID {
            return Err(SensorError::UnexpectedIdentity {
                found,
                expected: DEVICE_ID,
            });
        }
        debug!("WHO_AM_I 0x{:02X}", found);
        Ok(())
    }

    /// Burst-read X/Y/Z and the status byte
    pub fn read_xyz(&mut self) -> Result<(AccelerationSample, u8)> {
        let mut data = [0u8; DATA_BURST_LEN];
        self.bus.read_registers(Register::OutXLsb.addr(), &mut data)?;

        let sample = AccelerationSample {
            x: decode_axis(data[0], data[1]),
            y: decode_axis(data[2], data[3]),
            z: decode_axis(data[4], data[5]),
        };
        let status = data[6];
        if status & STATUS_ZYXOW != 0 {
            debug!("Sample overwritten before read (status 0x{:02X})", status);
        }
        Ok((sample, status))
    }

    /// Compute zero offsets with the robot at rest and store them on the device.
    ///
    /// Expects X and Y to read zero and Z to read 1g. Leaves the device in
    /// active mode. The robot must not move while this runs.
    pub fn calibrate_zero(&mut self) -> Result<CalibrationOffsets> {
        let expected = [0, 0, GRAVITY_COUNTS_8G];
        let mut accumulated = [0i32; 3];

        for pass in 0..CALIBRATION_PASSES {
            self.bus.write_register(Register::CtrlReg1.addr(), CALIBRATION_MODE)?;
            sleep(self.timing.calibration_settle);

            let (sample, _) = self.read_xyz()?;
            for (axis, value) in sample.as_array().into_iter().enumerate() {
                accumulated[axis] += expected[axis] - i32::from(value);
            }

            // Offset registers only accept writes in standby
            self.bus.write_register(Register::CtrlReg1.addr(), STANDBY_MODE)?;
            let offsets = accumulated.map(clamp_offset);
            self.write_offsets(offsets)?;
            debug!("Calibration pass {}: sample {:?}, offsets {:?}", pass + 1, sample, offsets);
        }

        self.bus.write_register(Register::CtrlReg1.addr(), ACTIVE_MODE)?;

        let [x, y, z] = accumulated.map(clamp_offset);
        let offsets = CalibrationOffsets { x, y, z };
        if accumulated.iter().any(|&v| v != i32::from(clamp_offset(v))) {
            warn!("Calibration offsets saturated: {:?}", accumulated);
        }
        info!("Calibration complete: {:?}", offsets);
        Ok(offsets)
    }

    pub fn bus(&self) -> &Bus<C> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus<C> {
        &mut self.bus
    }

    fn write_offsets(&mut self, offsets: [i8; 3]) -> Result<()> {
        let registers = [Register::OffX, Register::OffY, Register::OffZ];
        for (register, offset) in registers.into_iter().zip(offsets) {
            self.bus.write_register(register.addr(), offset as u8)?;
        }
        Ok(())
    }
}

impl<C: Controller> AccelSource for Mma8450<C> {
    fn read_sample(&mut self) -> Result<AccelerationSample> {
        let (sample, _) = self.read_xyz()?;
        Ok(sample)
    }
}

/// Offset registers hold a signed byte
fn clamp_offset(value: i32) -> i8 {
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}
