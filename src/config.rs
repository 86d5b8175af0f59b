// Course, timing, bus and scaling constants
use std::time::Duration;

// Control loop tick period
pub const TICK_MS: u32 = 100;
pub const TICK_PERIOD: Duration = Duration::from_millis(TICK_MS as u64);

// Integrator scale: accel in mm/s^2, dt in ms, velocity in mm/s, distance in mm
pub const INTEGRATOR_SCALE: i32 = 1000;

// Number of raw samples averaged per tick
pub const AVERAGE_WINDOW: usize = 4;

// Low bits cleared from the averaged sample as a noise floor
pub const NOISE_MASK_BITS: u32 = 2;

// Accelerometer full scale in active mode (+/-2g, 12 bit)
pub const COUNTS_PER_G: i32 = 1024;
pub const MM_PER_S2_PER_G: i32 = 9807;

// Course layout (mm)
pub const FORWARD_TARGET_MM: i32 = 1000;
pub const START_LINE_MM: i32 = 0;

// Speed ramp issued while accelerating, one step per tick
pub const RAMP_SPEEDS: [u8; 4] = [32, 64, 96, 128];

// Reverse speed after the dwell
pub const REVERSE_SPEED: u8 = 96;

// Ticks spent stopped between forward and reverse legs
pub const DWELL_TICKS: u32 = 5;

// Two-wire bus: SMCLK (1 MHz) / 10 = ~100 kHz
pub const BUS_CLOCK_DIVISOR: u16 = 10;

// Upper bound on status polls before a bus wait gives up
pub const BUS_MAX_POLLS: u32 = 100_000;

// Accelerometer slave address
pub const ACCEL_ADDRESS: u8 = 0x1C;

// Power rail settle time before bus bring-up
pub const POWER_UP_DELAY: Duration = Duration::from_millis(250);

// Settle time after switching to calibration mode
pub const CALIBRATION_SETTLE: Duration = Duration::from_secs(2);

// Calibration passes
pub const CALIBRATION_PASSES: usize = 2;

// Serial link to the motor controller
pub const MOTOR_BAUDRATE: u32 = 9600;
pub const MOTOR_TIMEOUT_MS: u64 = 100;
