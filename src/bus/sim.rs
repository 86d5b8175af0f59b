// Simulated two-wire master peripheral
//
// Models the status flags of a USCI-style controller closely enough to
// exercise the blocking driver: every flag settles after a configurable
// number of polls, a receive in progress keeps clocking bytes until NACK+STOP
// is requested, and every exchange is appended to a transaction log.

use std::mem;

use tracing::trace;

use super::{Controller, Direction, Terminal, Transaction};

/// Slave device attached to the simulated bus
pub trait Device {
    fn address(&self) -> u8;

    /// Bytes of one completed write (before STOP or repeated START)
    fn write(&mut self, bytes: &[u8]);

    /// Called when a read transaction is addressed, before the first byte
    fn begin_read(&mut self) {}

    /// Next byte clocked out of the device
    fn read(&mut self) -> u8;
}

/// Plain 256-byte register file with an auto-incrementing pointer
pub struct RegisterFile {
    address: u8,
    regs: [u8; 256],
    pointer: u8,
}

impl RegisterFile {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            regs: [0; 256],
            pointer: 0,
        }
    }

    pub fn get(&self, reg: u8) -> u8 {
        self.regs[reg as usize]
    }

    pub fn set(&mut self, reg: u8, value: u8) {
        self.regs[reg as usize] = value;
    }
}

impl Device for RegisterFile {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Some((&reg, data)) = bytes.split_first() {
            self.pointer = reg;
            for &byte in data {
                self.regs[self.pointer as usize] = byte;
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
    }

    fn read(&mut self) -> u8 {
        let value = self.regs[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        value
    }
}

/// Poll countdown for a status flag
#[derive(Debug, Default, Clone, Copy)]
struct Countdown(u32);

impl Countdown {
    fn arm(&mut self, polls: u32) {
        self.0 = polls;
    }

    /// True once the flag has settled
    fn poll(&mut self) -> bool {
        if self.0 == 0 {
            true
        } else {
            self.0 -= 1;
            false
        }
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    /// Slave did not acknowledge its address; bus held until reset
    Unacknowledged,
    Writing {
        address: u8,
        payload: Vec<u8>,
    },
    Reading {
        address: u8,
        payload: Vec<u8>,
        rx: Option<u8>,
        nack_after: Option<usize>,
    },
}

/// Simulated master peripheral with one attached slave
pub struct SimController<D> {
    device: D,
    divisor: Option<u16>,
    slave_address: u8,
    phase: Phase,
    latency: u32,
    start: Countdown,
    tx: Countdown,
    rx: Countdown,
    stop: Countdown,
    stop_in_flight: bool,
    stalled: bool,
    log: Vec<Transaction>,
    errors: Vec<&'static str>,
}

impl<D: Device> SimController<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            divisor: None,
            slave_address: 0,
            phase: Phase::Idle,
            latency: 0,
            start: Countdown::default(),
            tx: Countdown::default(),
            rx: Countdown::default(),
            stop: Countdown::default(),
            stop_in_flight: false,
            stalled: false,
            log: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Number of polls each status flag stays unsettled
    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Freeze every status flag in its "not ready" state
    pub fn stall(&mut self) {
        self.stalled = true;
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn divisor(&self) -> Option<u16> {
        self.divisor
    }

    pub fn slave_address(&self) -> u8 {
        self.slave_address
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Driver misuse observed on the wire (STOP without NACK on a read, etc.)
    pub fn protocol_errors(&self) -> &[&'static str] {
        &self.errors
    }

    fn open(&mut self, direction: Direction) {
        self.start.arm(self.latency);
        if self.slave_address != self.device.address() {
            trace!("sim: address 0x{:02X} not acknowledged", self.slave_address);
            self.phase = Phase::Unacknowledged;
            return;
        }

        let address = self.slave_address;
        self.phase = match direction {
            Direction::Write => Phase::Writing {
                address,
                payload: Vec::new(),
            },
            Direction::Read => {
                self.device.begin_read();
                self.rx.arm(self.latency);
                Phase::Reading {
                    address,
                    payload: Vec::new(),
                    rx: Some(self.device.read()),
                    nack_after: None,
                }
            }
        };
    }

    fn close(&mut self, direction: Direction, address: u8, payload: Vec<u8>, terminal: Terminal) {
        if direction == Direction::Write {
            self.device.write(&payload);
        }
        trace!("sim: {:?} {:02X?} {:?}", direction, payload, terminal);
        self.log.push(Transaction {
            address,
            direction,
            payload,
            terminal,
        });
    }

    fn finish_with_stop(&mut self) {
        self.phase = Phase::Idle;
        self.stop_in_flight = true;
        self.stop.arm(self.latency);
    }
}

impl<D: Device> Controller for SimController<D> {
    fn configure_master(&mut self, divisor: u16) {
        self.divisor = Some(divisor);
        self.phase = Phase::Idle;
        self.stop_in_flight = false;
    }

    fn set_slave_address(&mut self, address: u8) {
        if !matches!(self.phase, Phase::Idle | Phase::Unacknowledged) {
            self.errors.push("slave address changed mid-transaction");
        }
        if matches!(self.phase, Phase::Unacknowledged) {
            self.phase = Phase::Idle;
        }
        self.slave_address = address;
    }

    fn is_busy(&mut self) -> bool {
        self.stalled || !matches!(self.phase, Phase::Idle) || self.stop_pending()
    }

    fn start(&mut self, direction: Direction) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => self.open(direction),
            Phase::Writing { address, payload } => {
                self.close(Direction::Write, address, payload, Terminal::RepeatedStart);
                self.open(direction);
            }
            phase @ Phase::Reading { .. } => {
                self.errors.push("START while receiving");
                self.phase = phase;
            }
            Phase::Unacknowledged => self.phase = Phase::Unacknowledged,
        }
    }

    fn start_pending(&mut self) -> bool {
        if self.stalled {
            return true;
        }
        match self.phase {
            Phase::Idle | Phase::Unacknowledged => false,
            _ => !self.start.poll(),
        }
    }

    fn tx_ready(&mut self) -> bool {
        !self.stalled
            && matches!(self.phase, Phase::Writing { .. })
            && self.start.poll()
            && self.tx.poll()
    }

    fn write_tx(&mut self, byte: u8) {
        match &mut self.phase {
            Phase::Writing { payload, .. } => {
                payload.push(byte);
                self.tx.arm(self.latency);
            }
            _ => self.errors.push("write with no open write transaction"),
        }
    }

    fn rx_ready(&mut self) -> bool {
        !self.stalled
            && matches!(self.phase, Phase::Reading { rx: Some(_), .. })
            && self.start.poll()
            && self.rx.poll()
    }

    fn read_rx(&mut self) -> u8 {
        let Phase::Reading {
            payload,
            rx,
            nack_after,
            ..
        } = &mut self.phase
        else {
            self.errors.push("receive buffer read outside a read transaction");
            return 0xFF;
        };

        let Some(byte) = rx.take() else {
            self.errors.push("receive buffer read before a byte arrived");
            return 0xFF;
        };
        payload.push(byte);

        match *nack_after {
            Some(after) if payload.len() > after => {
                if let Phase::Reading {
                    address, payload, ..
                } = mem::replace(&mut self.phase, Phase::Idle)
                {
                    self.close(
                        Direction::Read,
                        address,
                        payload,
                        Terminal::NackStop { after },
                    );
                }
                self.finish_with_stop();
            }
            _ => {
                // Byte acknowledged, slave clocks out the next one
                *rx = Some(self.device.read());
                self.rx.arm(self.latency);
            }
        }
        byte
    }

    fn stop(&mut self) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Writing { address, payload } => {
                self.close(Direction::Write, address, payload, Terminal::Stop);
                self.finish_with_stop();
            }
            Phase::Reading {
                address, payload, ..
            } => {
                self.errors.push("STOP without NACK during a read");
                self.close(Direction::Read, address, payload, Terminal::Stop);
                self.finish_with_stop();
            }
            Phase::Unacknowledged => self.finish_with_stop(),
            Phase::Idle => self.errors.push("STOP with no open transaction"),
        }
    }

    fn nack_stop(&mut self) {
        match &mut self.phase {
            Phase::Reading {
                payload,
                nack_after,
                ..
            } => {
                if nack_after.is_some() {
                    self.errors.push("NACK+STOP requested twice");
                } else {
                    *nack_after = Some(payload.len());
                }
            }
            _ => self.errors.push("NACK+STOP outside a read transaction"),
        }
    }

    fn stop_pending(&mut self) -> bool {
        if self.stalled {
            return true;
        }
        if !self.stop_in_flight {
            return false;
        }
        if self.stop.poll() {
            self.stop_in_flight = false;
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> SimController<RegisterFile> {
        let mut regs = RegisterFile::new(0x1C);
        regs.set(0x05, 0x11);
        regs.set(0x06, 0x22);
        regs.set(0x07, 0x33);
        let mut sim = SimController::new(regs);
        sim.configure_master(10);
        sim.set_slave_address(0x1C);
        sim
    }

    #[test]
    fn test_register_file_pointer_auto_increments() {
        let mut regs = RegisterFile::new(0x1C);
        regs.write(&[0x20, 1, 2, 3]);
        assert_eq!(regs.get(0x20), 1);
        assert_eq!(regs.get(0x22), 3);
        regs.write(&[0x21]);
        assert_eq!(regs.read(), 2);
        assert_eq!(regs.read(), 3);
    }

    #[test]
    fn test_countdown_settles_after_latency() {
        let mut flag = Countdown::default();
        flag.arm(2);
        assert!(!flag.poll());
        assert!(!flag.poll());
        assert!(flag.poll());
    }

    #[test]
    fn test_missing_nack_keeps_bus_busy() {
        let mut sim = controller();
        sim.start(Direction::Write);
        sim.write_tx(0x05);
        sim.start(Direction::Read);
        assert_eq!(sim.read_rx(), 0x11);
        assert_eq!(sim.read_rx(), 0x22);

        // No NACK+STOP: the slave keeps driving the next byte
        assert!(sim.is_busy());
        assert!(sim.rx_ready());
    }

    #[test]
    fn test_early_nack_starves_final_read() {
        let mut sim = controller();
        sim.start(Direction::Write);
        sim.write_tx(0x05);
        sim.start(Direction::Read);
        // Requested while the first of three wanted bytes is in flight
        sim.nack_stop();
        assert_eq!(sim.read_rx(), 0x11);

        // The remaining two bytes never arrive
        assert!(!sim.rx_ready());
        let last = sim.transactions().last().unwrap();
        assert_eq!(last.terminal, Terminal::NackStop { after: 0 });
        assert_eq!(last.payload, vec![0x11]);
    }

    #[test]
    fn test_address_change_mid_transaction_is_flagged() {
        let mut sim = controller();
        sim.start(Direction::Write);
        sim.set_slave_address(0x1D);
        assert_eq!(
            sim.protocol_errors(),
            &["slave address changed mid-transaction"]
        );
    }
}
