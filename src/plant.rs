// Bench plant: first-order wheel response to drive commands
//
// Lets the runtime close the loop without hardware. Drive commands set a
// target speed; each accelerometer sample advances the plant by one tick and
// reports the resulting acceleration.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{COUNTS_PER_G, MM_PER_S2_PER_G};
use crate::motor::link::Result;
use crate::motor::{DriveCommand, Transport};
use crate::sensor::sim::SampleSource;

/// Ground speed per unit of commanded speed (mm/s)
const MM_S_PER_SPEED: i32 = 2;

/// Speed error corrected per second
const RESPONSE_PER_S: i32 = 8;

const MAX_ACCEL_MM_S2: i32 = 2000;

#[derive(Debug, Default)]
pub struct Plant {
    target: i32,
    velocity: i32,
    position: i32,
}

pub type SharedPlant = Arc<Mutex<Plant>>;

impl Plant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedPlant {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn apply(&mut self, command: DriveCommand) {
        self.target = match command {
            DriveCommand::Stop => 0,
            DriveCommand::Forward(speed) => i32::from(speed) * MM_S_PER_SPEED,
            DriveCommand::Reverse(speed) => -i32::from(speed) * MM_S_PER_SPEED,
            DriveCommand::Status(_) => self.target,
        };
    }

    /// Advance by `dt_ms`, returning the acceleration over the step (mm/s^2)
    pub fn step(&mut self, dt_ms: i32) -> i32 {
        let accel = ((self.target - self.velocity) * RESPONSE_PER_S)
            .clamp(-MAX_ACCEL_MM_S2, MAX_ACCEL_MM_S2);
        self.velocity += accel * dt_ms / 1000;
        self.position += self.velocity * dt_ms / 1000;
        accel
    }

    pub fn velocity(&self) -> i32 {
        self.velocity
    }

    /// True position (mm), for comparing against the dead-reckoned estimate
    pub fn position(&self) -> i32 {
        self.position
    }
}

fn lock(plant: &SharedPlant) -> MutexGuard<'_, Plant> {
    plant.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn mm_s2_to_counts(accel: i32) -> i16 {
    (accel * COUNTS_PER_G / MM_PER_S2_PER_G).clamp(-2048, 2047) as i16
}

/// Accelerometer sample source stepping the plant once per sample
pub fn accelerometer_source(plant: SharedPlant, dt_ms: i32) -> SampleSource {
    Box::new(move || {
        let accel = lock(&plant).step(dt_ms);
        [mm_s2_to_counts(accel), 0, COUNTS_PER_G as i16]
    })
}

/// Motor link that drives the plant, optionally mirroring frames to a real link
pub struct PlantLink {
    plant: SharedPlant,
    mirror: Option<Box<dyn Transport + Send>>,
}

impl PlantLink {
    pub fn new(plant: SharedPlant) -> Self {
        Self {
            plant,
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, link: Box<dyn Transport + Send>) -> Self {
        self.mirror = Some(link);
        self
    }
}

impl Transport for PlantLink {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        for frame in bytes.chunks_exact(2) {
            if let Some(command) = DriveCommand::decode([frame[0], frame[1]]) {
                lock(&self.plant).apply(command);
            }
        }
        if let Some(link) = self.mirror.as_mut() {
            link.send(bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::RecordingTransport;

    #[test]
    fn test_plant_settles_near_target() {
        let mut plant = Plant::new();
        plant.apply(DriveCommand::Forward(100));
        for _ in 0..20 {
            plant.step(100);
        }
        assert!((plant.velocity() - 200).abs() <= 2, "{}", plant.velocity());
        assert!(plant.position() > 0);

        plant.apply(DriveCommand::Stop);
        for _ in 0..20 {
            plant.step(100);
        }
        assert!(plant.velocity().abs() <= 2);
    }

    #[test]
    fn test_accel_is_clamped() {
        let mut plant = Plant::new();
        plant.apply(DriveCommand::Reverse(255));
        assert_eq!(plant.step(100), -MAX_ACCEL_MM_S2);
    }

    #[test]
    fn test_link_drives_plant_and_mirrors() {
        let recorder = RecordingTransport::new();
        let plant = Plant::shared();
        let mut link = PlantLink::new(plant.clone()).with_mirror(Box::new(recorder.clone()));

        link.send(&DriveCommand::Forward(50).encode()).unwrap();
        let mut source = accelerometer_source(plant, 100);
        let [x, _, z] = source();
        assert!(x > 0);
        assert_eq!(z, 1024);
        assert_eq!(recorder.frames(), vec![vec![0x01, 50]]);
    }
}
