// Blocking two-wire transaction driver
//
// Every call polls peripheral status flags until the next protocol step can
// proceed. Polls are bounded by `BusConfig::max_polls` so a stuck slave
// surfaces as `BusError::Timeout` instead of hanging the tick. A transaction
// that times out is still closed with a STOP.

use tracing::{debug, trace, warn};

use super::{BusError, Controller, Direction, Result, WaitCondition};
use crate::config::{BUS_CLOCK_DIVISOR, BUS_MAX_POLLS};

/// Bus timing configuration
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Peripheral clock divisor (SMCLK / divisor = SCL)
    pub divisor: u16,
    /// Status polls allowed per wait before giving up
    pub max_polls: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            divisor: BUS_CLOCK_DIVISOR,
            max_polls: BUS_MAX_POLLS,
        }
    }
}

/// Progress of a multi-byte read.
///
/// NACK+STOP has to be requested while the last byte is still in flight,
/// i.e. on entering `Last`, and only then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstPhase {
    /// More than one byte still to arrive
    Acking { remaining: usize },
    /// Exactly one byte to arrive, NACK+STOP requested
    Last,
    Complete,
}

impl BurstPhase {
    fn begin(count: usize) -> Self {
        match count {
            0 => Self::Complete,
            1 => Self::Last,
            remaining => Self::Acking { remaining },
        }
    }

    fn byte_received(self) -> Self {
        match self {
            Self::Acking { remaining: 2 } => Self::Last,
            Self::Acking { remaining } => Self::Acking {
                remaining: remaining - 1,
            },
            Self::Last | Self::Complete => Self::Complete,
        }
    }
}

/// Master-mode two-wire bus owning its peripheral
pub struct Bus<C> {
    controller: C,
    config: BusConfig,
    address: Option<u8>,
}

impl<C: Controller> Bus<C> {
    pub fn new(controller: C) -> Self {
        Self::with_config(controller, BusConfig::default())
    }

    pub fn with_config(controller: C, config: BusConfig) -> Self {
        Self {
            controller,
            config,
            address: None,
        }
    }

    /// Configure the peripheral for master mode (~100 kHz) and wait for the
    /// bus to go idle. Start-up only, never mid-transaction.
    pub fn init_master(&mut self) -> Result<()> {
        debug!("Configuring bus master, divisor {}", self.config.divisor);
        self.controller.configure_master(self.config.divisor);
        self.address = None;
        self.wait_for(WaitCondition::BusIdle)
    }

    /// Select the slave for subsequent transactions. The bus must be idle.
    pub fn set_slave_address(&mut self, address: u8) {
        debug!("Slave address 0x{:02X}", address);
        self.controller.set_slave_address(address);
        self.address = Some(address);
    }

    pub fn slave_address(&self) -> Option<u8> {
        self.address
    }

    /// Send one byte: START+address+W, data, STOP.
    pub fn write_byte(&mut self, data: u8) -> Result<()> {
        trace!("write_byte 0x{:02X}", data);
        self.transaction(Direction::Write, |bus| {
            bus.wait_for(WaitCondition::TxReady)?;
            bus.controller.write_tx(data);
            bus.finish_write()
        })
    }

    /// Send a buffer in one transaction, MSB first: the byte at the highest
    /// index goes on the wire first.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        trace!("write_bytes {:02X?}", data);
        self.transaction(Direction::Write, |bus| {
            for &byte in data.iter().rev() {
                bus.wait_for(WaitCondition::TxReady)?;
                bus.controller.write_tx(byte);
            }
            bus.finish_write()
        })
    }

    /// Write `data` to device register `reg` in one transaction.
    pub fn write_register(&mut self, reg: u8, data: u8) -> Result<()> {
        trace!("write_register 0x{:02X} <- 0x{:02X}", reg, data);
        self.transaction(Direction::Write, |bus| {
            bus.wait_for(WaitCondition::TxReady)?;
            bus.controller.write_tx(reg);
            bus.wait_for(WaitCondition::TxReady)?;
            bus.controller.write_tx(data);
            bus.finish_write()
        })
    }

    /// Read a single register (burst read of length one).
    pub fn read_register(&mut self, reg: u8) -> Result<u8> {
        let mut data = [0u8];
        self.read_registers(reg, &mut data)?;
        Ok(data[0])
    }

    /// Read `buf.len()` consecutive registers starting at `first`.
    pub fn read_registers(&mut self, first: u8, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        trace!("read_registers 0x{:02X} x{}", first, buf.len());

        self.transaction(Direction::Write, |bus| {
            // Register pointer, then repeated START with the R/W bit flipped
            bus.wait_for(WaitCondition::TxReady)?;
            bus.controller.write_tx(first);
            bus.wait_for(WaitCondition::TxReady)?;
            bus.controller.start(Direction::Read);
            bus.wait_for(WaitCondition::StartSent)?;

            let mut phase = BurstPhase::begin(buf.len());
            if phase == BurstPhase::Last {
                bus.controller.nack_stop();
            }

            for slot in buf.iter_mut() {
                bus.wait_for(WaitCondition::RxReady)?;
                *slot = bus.controller.read_rx();

                let next = phase.byte_received();
                if next == BurstPhase::Last {
                    bus.controller.nack_stop();
                }
                phase = next;
            }
            debug_assert_eq!(phase, BurstPhase::Complete);

            bus.wait_for(WaitCondition::StopSent)
        })
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Open a transaction once the bus is idle and run `body` inside it.
    ///
    /// A timeout inside the transaction forces a STOP so the bus is released
    /// for the next one.
    fn transaction<R>(
        &mut self,
        direction: Direction,
        body: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if self.address.is_none() {
            return Err(BusError::NoSlaveAddress);
        }
        self.wait_for(WaitCondition::BusIdle)?;
        self.controller.start(direction);

        let result = body(self);
        if let Err(BusError::Timeout { condition, .. }) = &result {
            if *condition != WaitCondition::StopSent {
                warn!("Bus timeout waiting for {:?}, forcing STOP", condition);
                self.controller.stop();
                // Best effort: the original timeout is what gets reported
                let _ = self.wait_for(WaitCondition::StopSent);
            }
        }
        result
    }

    /// Wait for the last byte to latch, then STOP
    fn finish_write(&mut self) -> Result<()> {
        self.wait_for(WaitCondition::TxReady)?;
        self.controller.stop();
        self.wait_for(WaitCondition::StopSent)
    }

    fn wait_for(&mut self, condition: WaitCondition) -> Result<()> {
        for _ in 0..self.config.max_polls {
            let ready = match condition {
                WaitCondition::BusIdle => !self.controller.is_busy(),
                WaitCondition::TxReady => self.controller.tx_ready(),
                WaitCondition::RxReady => self.controller.rx_ready(),
                WaitCondition::StartSent => !self.controller.start_pending(),
                WaitCondition::StopSent => !self.controller.stop_pending(),
            };
            if ready {
                return Ok(());
            }
            std::hint::spin_loop();
        }

        Err(BusError::Timeout {
            condition,
            polls: self.config.max_polls,
        })
    }
}
