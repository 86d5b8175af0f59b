// MMA8450Q register map (subset used by the driver)

/// Identity value returned by WHO_AM_I
pub const DEVICE_ID: u8 = 0xC6;

/// Z reading at rest in 8g calibration mode (1g)
pub const GRAVITY_COUNTS_8G: i32 = 256;

/// Register addresses
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Status = 0x00,
    OutXLsb = 0x05,
    OutXMsb = 0x06,
    OutYLsb = 0x07,
    OutYMsb = 0x08,
    OutZLsb = 0x09,
    OutZMsb = 0x0A,
    // Read back as the 7th byte of a data burst from OutXLsb
    DataStatus = 0x0B,
    WhoAmI = 0x0F,
    CtrlReg1 = 0x38,
    OffX = 0x3D,
    OffY = 0x3E,
    OffZ = 0x3F,
}

impl Register {
    pub fn addr(self) -> u8 {
        self as u8
    }
}

/// Bytes in one X/Y/Z burst: three LSB/MSB pairs plus status
pub const DATA_BURST_LEN: usize = 7;

// STATUS register bits
pub const STATUS_ZYXDR: u8 = 0x08;
pub const STATUS_ZYXOW: u8 = 0x80;

/// CTRL_REG1 full-scale selection, 0 puts the device in standby
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullScale {
    Standby = 0x00,
    G2 = 0x01,
    G4 = 0x02,
    G8 = 0x03,
}

/// CTRL_REG1 output data rate (DR2..DR0 bits)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    Hz400 = 0x00,
    Hz200 = 0x04,
    Hz100 = 0x08,
    Hz50 = 0x0C,
    Hz12_5 = 0x10,
    Hz1_56 = 0x14,
}

pub const fn ctrl_reg1(scale: FullScale, rate: DataRate) -> u8 {
    scale as u8 | rate as u8
}

/// Measurement mode used by the control loop: +/-2g, 200 Hz
pub const ACTIVE_MODE: u8 = ctrl_reg1(FullScale::G2, DataRate::Hz200);

/// Slow, wide-range mode used while calibrating: +/-8g, 1.56 Hz
pub const CALIBRATION_MODE: u8 = ctrl_reg1(FullScale::G8, DataRate::Hz1_56);

pub const STANDBY_MODE: u8 = FullScale::Standby as u8;

/// True if a CTRL_REG1 value leaves the device measuring
pub fn is_active(ctrl_reg1: u8) -> bool {
    ctrl_reg1 & 0x03 != FullScale::Standby as u8
}
