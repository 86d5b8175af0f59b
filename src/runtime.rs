// Periodic tick source driving the control loop
//
// A tokio interval produces ticks; the control loop runs on a blocking thread
// and handles one tick at a time. If a tick is still being handled when the
// next one fires, the new tick is dropped and an overrun is logged.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::bus::sim::SimController;
use crate::bus::{Bus, Controller};
use crate::config::MOTOR_BAUDRATE;
use crate::control::{ControlError, ControlLoop, LoopConfig, TickOutcome};
use crate::messages::RunSummary;
use crate::motor::{SerialTransport, Transport, TransportError};
use crate::plant::{Plant, PlantLink, accelerometer_source};
use crate::sensor::sim::SimAccelerometer;
use crate::sensor::{AccelSource, Mma8450, SensorError, Timing};

/// Error types for the runtime
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Sensor bring-up failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("Motor link error: {0}")]
    Transport(#[from] TransportError),

    #[error("Control task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    Shutdown,
}

async fn tick_source<F>(events: mpsc::Sender<Event>, period: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => match events.try_send(Event::Tick) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Tick overran its period, skipping"),
                Err(TrySendError::Closed(_)) => break,
            },
            _ = &mut shutdown => {
                info!("Shutdown requested");
                let _ = events.send(Event::Shutdown).await;
                break;
            }
        }
    }
}

/// Handle events until the course ends, the tick limit is hit or shutdown
fn drive<S, T>(
    mut control: ControlLoop<S, T>,
    mut events: mpsc::Receiver<Event>,
    max_ticks: Option<u64>,
) -> Result<RunSummary, ControlError>
where
    S: AccelSource,
    T: Transport,
{
    while let Some(event) = events.blocking_recv() {
        if event == Event::Shutdown {
            control.abort()?;
            break;
        }
        match control.tick()? {
            TickOutcome::Running(_) => {}
            TickOutcome::Finished | TickOutcome::Faulted => break,
        }
        if max_ticks.is_some_and(|max| control.ticks() >= max) {
            warn!("Tick limit {} reached", control.ticks());
            control.abort()?;
            break;
        }
    }
    Ok(control.summary())
}

/// Run the control loop every `period` until it halts
pub async fn run<S, T, F>(
    control: ControlLoop<S, T>,
    period: Duration,
    max_ticks: Option<u64>,
    shutdown: F,
) -> Result<RunSummary, RuntimeError>
where
    S: AccelSource + Send + 'static,
    T: Transport + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let ticker = tokio::spawn(tick_source(tx, period, shutdown));

    info!("Control loop started: {}ms period", period.as_millis());
    let summary = tokio::task::spawn_blocking(move || drive(control, rx, max_ticks)).await;
    ticker.abort();

    let summary = summary??;
    info!("Control loop finished: {:?}", summary.outcome);
    Ok(summary)
}

/// Power up the accelerometer and optionally zero it.
///
/// A wrong WHO_AM_I is logged and tolerated; bus failures are not.
pub fn bring_up<C: Controller>(
    sensor: &mut Mma8450<C>,
    calibrate: bool,
) -> Result<(), SensorError> {
    sensor.init()?;
    match sensor.verify_identity() {
        Err(SensorError::UnexpectedIdentity { found, expected }) => {
            warn!("WHO_AM_I 0x{:02X}, expected 0x{:02X}; continuing", found, expected)
        }
        other => other?,
    }
    if calibrate {
        info!("Calibrating, keep the robot still");
        let offsets = sensor.calibrate_zero()?;
        info!("Calibration offsets {:?}", offsets);
    }
    Ok(())
}

/// Settings for a bench run against the simulated plant
#[derive(Debug, Clone)]
pub struct BenchOptions {
    /// Mirror drive commands to this serial port
    pub port: Option<String>,
    pub baudrate: u32,
    pub calibrate: bool,
    pub timing: Timing,
    pub loop_config: LoopConfig,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            port: None,
            baudrate: MOTOR_BAUDRATE,
            calibrate: true,
            timing: Timing::default(),
            loop_config: LoopConfig::default(),
        }
    }
}

pub type BenchLoop = ControlLoop<Mma8450<SimController<SimAccelerometer>>, PlantLink>;

/// Build a control loop whose sensor and motors are the bench plant
pub fn build_bench(options: &BenchOptions) -> Result<BenchLoop, RuntimeError> {
    let mirror = match &options.port {
        Some(port) => {
            let link: Box<dyn Transport + Send> =
                Box::new(SerialTransport::open_with_baudrate(port, options.baudrate)?);
            Some(link)
        }
        None => None,
    };
    assemble_bench(options, mirror)
}

fn assemble_bench(
    options: &BenchOptions,
    mirror: Option<Box<dyn Transport + Send>>,
) -> Result<BenchLoop, RuntimeError> {
    let plant = Plant::shared();
    let device = SimAccelerometer::new()
        .with_source(accelerometer_source(plant.clone(), options.loop_config.dt_ms));
    let mut sensor = Mma8450::with_timing(Bus::new(SimController::new(device)), options.timing);
    bring_up(&mut sensor, options.calibrate)?;

    let mut link = PlantLink::new(plant);
    if let Some(mirror) = mirror {
        link = link.with_mirror(mirror);
    }
    Ok(ControlLoop::with_config(sensor, link, options.loop_config.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CoursePhase;
    use crate::messages::RunOutcome;
    use crate::motor::{DriveCommand, RecordingTransport, StatusCode};
    use crate::sensor::registers::{ACTIVE_MODE, CALIBRATION_MODE};

    fn options() -> BenchOptions {
        BenchOptions {
            timing: Timing::immediate(),
            ..BenchOptions::default()
        }
    }

    fn commands(recorder: &RecordingTransport) -> Vec<DriveCommand> {
        recorder
            .frames()
            .into_iter()
            .map(|f| DriveCommand::decode([f[0], f[1]]).unwrap())
            .collect()
    }

    #[test]
    fn test_bring_up_calibrates_and_returns_active() {
        let mut sensor = Mma8450::with_timing(
            Bus::new(SimController::new(SimAccelerometer::new())),
            Timing::immediate(),
        );
        bring_up(&mut sensor, true).unwrap();

        let device = sensor.bus().controller().device();
        assert!(device.mode_history().contains(&CALIBRATION_MODE));
        assert_eq!(device.ctrl_reg1(), ACTIVE_MODE);
    }

    #[test]
    fn test_bring_up_tolerates_wrong_identity() {
        let mut sensor = Mma8450::with_timing(
            Bus::new(SimController::new(SimAccelerometer::new().with_identity(0x1A))),
            Timing::immediate(),
        );
        assert!(bring_up(&mut sensor, false).is_ok());
    }

    #[tokio::test]
    async fn test_bench_run_completes_course() {
        let recorder = RecordingTransport::new();
        let control = assemble_bench(&options(), Some(Box::new(recorder.clone()))).unwrap();

        let summary = run(
            control,
            Duration::from_millis(1),
            Some(2000),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.phase, CoursePhase::Stopped);
        assert!(summary.motion.distance <= 0);

        let sent = commands(&recorder);
        assert_eq!(sent[0], DriveCommand::Forward(32));
        let reverse = sent
            .iter()
            .position(|c| matches!(c, DriveCommand::Reverse(_)))
            .unwrap();
        assert_eq!(sent[reverse - 1], DriveCommand::Stop);
        assert_eq!(
            &sent[sent.len() - 2..],
            &[DriveCommand::Stop, DriveCommand::Status(StatusCode::CourseComplete)]
        );
        assert_eq!(summary.commands_sent as usize, sent.len());
    }

    #[tokio::test]
    async fn test_tick_limit_aborts() {
        let recorder = RecordingTransport::new();
        let control = assemble_bench(&options(), Some(Box::new(recorder.clone()))).unwrap();

        let summary = run(
            control,
            Duration::from_millis(1),
            Some(3),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Aborted);
        assert_eq!(summary.ticks, 3);
        assert_eq!(
            commands(&recorder).last(),
            Some(&DriveCommand::Status(StatusCode::Aborted))
        );
    }

    #[tokio::test]
    async fn test_shutdown_aborts_before_first_tick_completes() {
        let control = assemble_bench(&options(), None).unwrap();

        let summary = run(control, Duration::from_secs(3600), None, async {})
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Aborted);
        assert!(summary.ticks <= 1);
    }

    #[tokio::test]
    async fn test_overrun_drops_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        let ticker = tokio::spawn(tick_source(
            tx,
            Duration::from_millis(1),
            std::future::pending(),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Capacity one: only a single tick is ever queued
        assert_eq!(rx.try_recv(), Ok(Event::Tick));
        assert!(rx.try_recv().is_err());
        ticker.abort();
    }
}
