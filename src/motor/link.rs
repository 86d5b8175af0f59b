// Serial byte link to the motor controller
//
// Blocking send of a whole buffer, no reply expected.

use serialport::{self, SerialPort};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::config::{MOTOR_BAUDRATE, MOTOR_TIMEOUT_MS};

/// Error types for the motor link
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Output byte stream to the motor controller
pub trait Transport {
    /// Blocks until every byte has been handed to the link
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }
}

/// UART link through a serial port
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, MOTOR_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(MOTOR_TIMEOUT_MS))
            .open()?;
        debug!("Opened motor link {} at {} baud", port_name, baudrate);
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

/// In-memory link keeping every frame sent; clones share the record
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        // A panicked sender cannot leave a half-written frame behind
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.lock().push(bytes.to_vec());
        Ok(())
    }
}
