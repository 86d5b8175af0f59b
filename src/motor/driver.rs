// High-level motor driver for the shuttle robot
//
// Turns forward/reverse/stop requests into drive commands on a Transport.

use tracing::{debug, info, warn};

use super::command::{DriveCommand, StatusCode};
use super::link::{Result, Transport};

pub struct MotorDriver<T: Transport> {
    link: T,
    moving: bool,
    sent: u32,
}

impl<T: Transport> MotorDriver<T> {
    pub fn new(link: T) -> Self {
        Self {
            link,
            moving: false,
            sent: 0,
        }
    }

    /// Send one command, blocking until it is on the link
    pub fn send(&mut self, command: DriveCommand) -> Result<()> {
        debug!("Drive command {:?}", command);
        self.link.send(&command.encode())?;
        self.moving = match command {
            DriveCommand::Stop => false,
            DriveCommand::Status(_) => self.moving,
            motion => motion.is_motion(),
        };
        self.sent += 1;
        Ok(())
    }

    pub fn forward(&mut self, speed: u8) -> Result<()> {
        self.send(DriveCommand::Forward(speed))
    }

    pub fn reverse(&mut self, speed: u8) -> Result<()> {
        self.send(DriveCommand::Reverse(speed))
    }

    /// Stop both motors immediately
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping motors");
        self.send(DriveCommand::Stop)
    }

    /// Report a status code over the link
    pub fn report(&mut self, code: StatusCode) -> Result<()> {
        self.send(DriveCommand::Status(code))
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Commands sent so far
    pub fn sent(&self) -> u32 {
        self.sent
    }
}

impl<T: Transport> Drop for MotorDriver<T> {
    fn drop(&mut self) {
        if self.moving {
            if let Err(e) = self.stop() {
                warn!("Failed to stop motors on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::link::RecordingTransport;

    #[test]
    fn test_commands_reach_link_in_order() {
        let recorder = RecordingTransport::new();
        let mut motors = MotorDriver::new(recorder.clone());
        motors.forward(32).unwrap();
        motors.stop().unwrap();
        motors.reverse(96).unwrap();

        assert_eq!(
            recorder.frames(),
            vec![vec![0x01, 32], vec![0x00, 0x00], vec![0x02, 96]]
        );
        assert_eq!(motors.sent(), 3);
    }

    #[test]
    fn test_drop_stops_moving_motors() {
        let recorder = RecordingTransport::new();
        {
            let mut motors = MotorDriver::new(recorder.clone());
            motors.forward(64).unwrap();
            assert!(motors.is_moving());
        }
        assert_eq!(recorder.frames().last(), Some(&vec![0x00, 0x00]));
    }

    #[test]
    fn test_drop_after_stop_sends_nothing() {
        let recorder = RecordingTransport::new();
        {
            let mut motors = MotorDriver::new(recorder.clone());
            motors.forward(64).unwrap();
            motors.stop().unwrap();
            motors.report(StatusCode::CourseComplete).unwrap();
            assert!(!motors.is_moving());
        }
        assert_eq!(recorder.frames().len(), 3);
    }
}
