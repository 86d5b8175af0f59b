// Simulated MMA8450Q register file
//
// Latches a fresh reading whenever a burst read is addressed at OUT_X_LSB.
// Readings are kept in +/-2g counts (1024/g) and scaled to the full scale
// selected in CTRL_REG1. Offset registers hold 8g counts.

use super::registers::{self, DEVICE_ID, FullScale, Register, STATUS_ZYXDR};
use crate::bus::sim::Device;
use crate::config::ACCEL_ADDRESS;

/// Produces the sensed acceleration (+/-2g counts) for each latched sample
pub type SampleSource = Box<dyn FnMut() -> [i16; 3] + Send>;

pub struct SimAccelerometer {
    regs: [u8; 256],
    pointer: u8,
    reading: [i16; 3],
    source: Option<SampleSource>,
    modes: Vec<u8>,
    errors: Vec<&'static str>,
}

impl Default for SimAccelerometer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAccelerometer {
    pub fn new() -> Self {
        let mut regs = [0u8; 256];
        regs[Register::WhoAmI.addr() as usize] = DEVICE_ID;
        Self {
            regs,
            pointer: 0,
            reading: [0; 3],
            source: None,
            modes: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_identity(mut self, id: u8) -> Self {
        self.regs[Register::WhoAmI.addr() as usize] = id;
        self
    }

    /// Pull every latched sample from `source` instead of the fixed reading
    pub fn with_source(mut self, source: SampleSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Fixed reading (+/-2g counts) returned until changed
    pub fn set_reading(&mut self, reading: [i16; 3]) {
        self.reading = reading;
    }

    pub fn ctrl_reg1(&self) -> u8 {
        self.get(Register::CtrlReg1)
    }

    /// Every value written to CTRL_REG1, in order
    pub fn mode_history(&self) -> &[u8] {
        &self.modes
    }

    pub fn offsets(&self) -> [i8; 3] {
        [Register::OffX, Register::OffY, Register::OffZ].map(|reg| self.get(reg) as i8)
    }

    pub fn errors(&self) -> &[&'static str] {
        &self.errors
    }

    fn get(&self, reg: Register) -> u8 {
        self.regs[reg.addr() as usize]
    }

    fn store(&mut self, reg: u8, value: u8) {
        if reg == Register::CtrlReg1.addr() {
            self.modes.push(value);
        }
        let offset_range = Register::OffX.addr()..=Register::OffZ.addr();
        if offset_range.contains(&reg) && registers::is_active(self.ctrl_reg1()) {
            self.errors.push("offset register written while active");
        }
        self.regs[reg as usize] = value;
    }

    fn latch(&mut self) {
        if let Some(source) = self.source.as_mut() {
            self.reading = source();
        }

        // 2g counts per output count, and output counts per offset count
        let (divisor, offset_weight) = match self.ctrl_reg1() & 0x03 {
            x if x == FullScale::G4 as u8 => (2, 2),
            x if x == FullScale::G8 as u8 => (4, 1),
            _ => (1, 4),
        };

        let offsets = self.offsets();
        let pairs = [
            (Register::OutXLsb, Register::OutXMsb),
            (Register::OutYLsb, Register::OutYMsb),
            (Register::OutZLsb, Register::OutZMsb),
        ];
        for (axis, (lsb, msb)) in pairs.into_iter().enumerate() {
            let value = (i32::from(self.reading[axis]) / divisor
                + i32::from(offsets[axis]) * offset_weight)
                .clamp(-2048, 2047);
            let raw = (value as u16) & 0x0FFF;
            self.regs[msb.addr() as usize] = (raw >> 4) as u8;
            self.regs[lsb.addr() as usize] = (raw & 0x0F) as u8;
        }

        self.regs[Register::Status.addr() as usize] = STATUS_ZYXDR;
        self.regs[Register::DataStatus.addr() as usize] = STATUS_ZYXDR;
    }
}

impl Device for SimAccelerometer {
    fn address(&self) -> u8 {
        ACCEL_ADDRESS
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Some((&reg, data)) = bytes.split_first() {
            self.pointer = reg;
            for &byte in data {
                self.store(self.pointer, byte);
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
    }

    fn begin_read(&mut self) {
        if self.pointer == Register::OutXLsb.addr() {
            self.latch();
        }
    }

    fn read(&mut self) -> u8 {
        let value = self.regs[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        value
    }
}
