// Tick handler: sample, filter, integrate, advance the course, drive
//
// One call to `tick` is one control period. Ticks never overlap. A sensor
// failure halts the robot and reports a fault status over the motor link; a
// command lost on the link halts it too, since the course has already moved on.

use tracing::{debug, error, info, warn};

use super::ControlError;
use super::course::{Course, CourseConfig, CoursePhase};
use crate::bus::BusError;
use crate::config::{AVERAGE_WINDOW, NOISE_MASK_BITS, TICK_MS};
use crate::messages::{RunOutcome, RunSummary};
use crate::motion::{MotionState, SampleWindow, counts_to_mm_s2, noise_floor};
use crate::motor::{MotorDriver, StatusCode, Transport, TransportError};
use crate::sensor::{AccelSource, SensorError};

/// Loop timing and filtering
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub dt_ms: i32,
    pub window: usize,
    pub noise_bits: u32,
    pub course: CourseConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            dt_ms: TICK_MS as i32,
            window: AVERAGE_WINDOW,
            noise_bits: NOISE_MASK_BITS,
            course: CourseConfig::default(),
        }
    }
}

/// State of the loop after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running(CoursePhase),
    Finished,
    Faulted,
}

pub struct ControlLoop<S, T: Transport> {
    sensor: S,
    motors: MotorDriver<T>,
    course: Course,
    window: SampleWindow,
    motion: MotionState,
    config: LoopConfig,
    ticks: u64,
    halt: Option<RunOutcome>,
}

impl<S: AccelSource, T: Transport> ControlLoop<S, T> {
    pub fn new(sensor: S, link: T) -> Self {
        Self::with_config(sensor, link, LoopConfig::default())
    }

    pub fn with_config(sensor: S, link: T, config: LoopConfig) -> Self {
        Self {
            sensor,
            motors: MotorDriver::new(link),
            course: Course::new(config.course.clone()),
            window: SampleWindow::new(config.window),
            motion: MotionState::default(),
            config,
            ticks: 0,
            halt: None,
        }
    }

    /// Run one control period
    pub fn tick(&mut self) -> Result<TickOutcome, ControlError> {
        if let Some(outcome) = self.terminal() {
            return Ok(outcome);
        }
        self.ticks += 1;

        let sample = match self.sensor.read_sample() {
            Ok(sample) => sample,
            Err(e) => return self.fault(e),
        };

        let averaged = self.window.push(sample);
        let accel = counts_to_mm_s2(noise_floor(i32::from(averaged.x), self.config.noise_bits));

        if self.course.integrating() {
            self.motion.advance(accel, self.config.dt_ms);
        }

        let step = self.course.step(self.motion.distance);
        if step.reset_velocity {
            self.motion.velocity = 0;
        }
        for command in step.commands {
            if let Err(e) = self.motors.send(command) {
                return Err(self.link_failure(e));
            }
        }

        debug!(
            "tick {}: accel {} mm/s^2, {:?}, {:?}",
            self.ticks,
            accel,
            self.motion,
            self.course.phase()
        );

        if self.course.is_finished() {
            self.halt = Some(RunOutcome::Completed);
            self.motors.report(StatusCode::CourseComplete)?;
            info!("Course complete after {} ticks, {:?}", self.ticks, self.motion);
            return Ok(TickOutcome::Finished);
        }
        Ok(TickOutcome::Running(self.course.phase()))
    }

    /// Stop the robot before the course ends; no further ticks drive it
    pub fn abort(&mut self) -> Result<(), ControlError> {
        if self.halt.is_some() {
            return Ok(());
        }
        warn!("Aborting course in {:?}", self.course.phase());
        self.halt = Some(RunOutcome::Aborted);
        self.motors.stop()?;
        self.motors.report(StatusCode::Aborted)?;
        Ok(())
    }

    pub fn phase(&self) -> CoursePhase {
        self.course.phase()
    }

    pub fn motion(&self) -> MotionState {
        self.motion
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    pub fn motors(&self) -> &MotorDriver<T> {
        &self.motors
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            outcome: self.halt.clone().unwrap_or(RunOutcome::Running),
            phase: self.course.phase(),
            ticks: self.ticks,
            motion: self.motion,
            commands_sent: self.motors.sent(),
        }
    }

    fn terminal(&self) -> Option<TickOutcome> {
        match self.halt.as_ref()? {
            RunOutcome::Completed => Some(TickOutcome::Finished),
            _ => Some(TickOutcome::Faulted),
        }
    }

    /// Halt after a command failed to go out, with a best-effort stop
    fn link_failure(&mut self, e: TransportError) -> ControlError {
        error!("Motor link failure in {:?}: {}", self.course.phase(), e);
        self.halt = Some(RunOutcome::Faulted {
            reason: e.to_string(),
        });
        if let Err(stop) = self.motors.stop() {
            warn!("Stop after link failure also failed: {}", stop);
        }
        e.into()
    }

    /// Halt motion and report the failure over the motor link
    fn fault(&mut self, e: SensorError) -> Result<TickOutcome, ControlError> {
        error!("Sensor failure in {:?}: {}", self.course.phase(), e);
        let code = match e {
            SensorError::Bus(BusError::Timeout { .. }) => StatusCode::BusFault,
            _ => StatusCode::SensorFault,
        };
        self.halt = Some(RunOutcome::Faulted {
            reason: e.to_string(),
        });
        self.motors.stop()?;
        self.motors.report(code)?;
        Ok(TickOutcome::Faulted)
    }
}
