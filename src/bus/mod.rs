// Two-wire serial bus (I2C master)
//
// Provides:
// - A register-level view of the bus peripheral (`Controller`)
// - The blocking transaction driver built on it (`Bus`)
// - A simulated peripheral with a transaction log for tests and bench runs

pub mod sim;
mod twowire;

pub use twowire::{Bus, BusConfig};

/// Data direction of a transaction, as carried by the R/W bit after the address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// Status flag a blocking bus call is polling for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    BusIdle,
    TxReady,
    RxReady,
    StartSent,
    StopSent,
}

/// How a transaction ended on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Plain STOP after the last written byte
    Stop,
    /// START re-asserted with the direction bit flipped
    RepeatedStart,
    /// NACK+STOP requested after `after` bytes had been taken from the receive buffer
    NackStop { after: usize },
}

/// One complete START..STOP (or START..repeated START) exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub address: u8,
    pub direction: Direction,
    pub payload: Vec<u8>,
    pub terminal: Terminal,
}

/// Register-level interface of a master-mode two-wire peripheral.
///
/// Status queries take `&mut self` because reading a hardware status register
/// may have side effects.
pub trait Controller {
    /// Hold the peripheral in reset, program master/synchronous mode and the
    /// clock divisor, then release it.
    fn configure_master(&mut self, divisor: u16);

    /// Program the slave address used by the next START.
    fn set_slave_address(&mut self, address: u8);

    /// Bus busy flag (carrier sense).
    fn is_busy(&mut self) -> bool;

    /// Assert START + address + R/W bit. Issued while a write is open this
    /// becomes a repeated START.
    fn start(&mut self, direction: Direction);

    /// START (or repeated START) not yet on the wire.
    fn start_pending(&mut self) -> bool;

    /// Transmit buffer empty.
    fn tx_ready(&mut self) -> bool;

    fn write_tx(&mut self, byte: u8);

    /// Receive buffer full.
    fn rx_ready(&mut self) -> bool;

    fn read_rx(&mut self) -> u8;

    fn stop(&mut self);

    /// NACK the byte in flight and follow it with STOP.
    fn nack_stop(&mut self);

    /// STOP requested but not yet on the wire.
    fn stop_pending(&mut self) -> bool;
}

/// Error types for bus transactions
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Timed out waiting for {condition:?} after {polls} polls")]
    Timeout {
        condition: WaitCondition,
        polls: u32,
    },

    #[error("No slave address selected")]
    NoSlaveAddress,
}

pub type Result<T> = std::result::Result<T, BusError>;
