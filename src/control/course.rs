// Course phase state machine
//
// Forward ramp, cruise to the target distance, stop and dwell, reverse to the
// start line, stop for good. Phases only move forward; exits are driven by the
// integrated distance.

use serde::Serialize;
use tracing::info;

use crate::config::{DWELL_TICKS, FORWARD_TARGET_MM, RAMP_SPEEDS, REVERSE_SPEED, START_LINE_MM};
use crate::motor::DriveCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoursePhase {
    Accelerating,
    CruisingForward,
    Reversing,
    Stopped,
}

/// Course layout and speeds
#[derive(Debug, Clone)]
pub struct CourseConfig {
    /// Speeds issued one per tick while accelerating
    pub ramp: Vec<u8>,
    pub forward_target_mm: i32,
    pub start_line_mm: i32,
    pub dwell_ticks: u32,
    pub reverse_speed: u8,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            ramp: RAMP_SPEEDS.to_vec(),
            forward_target_mm: FORWARD_TARGET_MM,
            start_line_mm: START_LINE_MM,
            dwell_ticks: DWELL_TICKS,
            reverse_speed: REVERSE_SPEED,
        }
    }
}

/// Result of one course step
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// Commands to send this tick, in order
    pub commands: Vec<DriveCommand>,
    /// Estimated velocity must be re-zeroed
    pub reset_velocity: bool,
}

#[derive(Debug)]
pub struct Course {
    config: CourseConfig,
    phase: CoursePhase,
    ramp_step: usize,
    dwell_remaining: u32,
    reverse_issued: bool,
}

impl Course {
    pub fn new(config: CourseConfig) -> Self {
        Self {
            config,
            phase: CoursePhase::Accelerating,
            ramp_step: 0,
            dwell_remaining: 0,
            reverse_issued: false,
        }
    }

    pub fn phase(&self) -> CoursePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == CoursePhase::Stopped
    }

    /// Whether motion should be integrated this tick. Not while parked
    /// between legs or after the course ends.
    pub fn integrating(&self) -> bool {
        match self.phase {
            CoursePhase::Accelerating | CoursePhase::CruisingForward => true,
            CoursePhase::Reversing => self.reverse_issued,
            CoursePhase::Stopped => false,
        }
    }

    /// Advance one tick given the current integrated distance
    pub fn step(&mut self, distance: i32) -> Step {
        let mut step = Step::default();

        match self.phase {
            CoursePhase::Accelerating => {
                if let Some(&speed) = self.config.ramp.get(self.ramp_step) {
                    step.commands.push(DriveCommand::Forward(speed));
                    self.ramp_step += 1;
                }
                if self.ramp_step >= self.config.ramp.len() {
                    self.enter(CoursePhase::CruisingForward, distance);
                }
            }
            CoursePhase::CruisingForward => {
                if distance >= self.config.forward_target_mm {
                    step.commands.push(DriveCommand::Stop);
                    self.dwell_remaining = self.config.dwell_ticks;
                    self.enter(CoursePhase::Reversing, distance);
                    if self.dwell_remaining == 0 {
                        self.issue_reverse(&mut step);
                    }
                }
            }
            CoursePhase::Reversing if !self.reverse_issued => {
                self.dwell_remaining = self.dwell_remaining.saturating_sub(1);
                if self.dwell_remaining == 0 {
                    self.issue_reverse(&mut step);
                }
            }
            CoursePhase::Reversing => {
                if distance <= self.config.start_line_mm {
                    step.commands.push(DriveCommand::Stop);
                    self.enter(CoursePhase::Stopped, distance);
                }
            }
            CoursePhase::Stopped => {}
        }

        step
    }

    fn issue_reverse(&mut self, step: &mut Step) {
        step.commands.push(DriveCommand::Reverse(self.config.reverse_speed));
        step.reset_velocity = true;
        self.reverse_issued = true;
    }

    fn enter(&mut self, next: CoursePhase, distance: i32) {
        debug_assert!(next > self.phase);
        info!("Phase {:?} -> {:?} at {} mm", self.phase, next, distance);
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CourseConfig {
        CourseConfig {
            ramp: vec![10, 20, 30],
            forward_target_mm: 500,
            start_line_mm: 0,
            dwell_ticks: 3,
            reverse_speed: 40,
        }
    }

    /// Runs the course over a distance trace, returning the phase after each
    /// step and every command sent with its tick index
    fn run(
        course: &mut Course,
        distances: &[i32],
    ) -> (Vec<CoursePhase>, Vec<(usize, DriveCommand)>) {
        let mut phases = Vec::new();
        let mut commands = Vec::new();
        for (tick, &d) in distances.iter().enumerate() {
            let step = course.step(d);
            commands.extend(step.commands.into_iter().map(|c| (tick, c)));
            phases.push(course.phase());
        }
        (phases, commands)
    }

    #[test]
    fn test_ramp_issues_increasing_speeds() {
        let mut course = Course::new(config());
        let (phases, commands) = run(&mut course, &[0, 1, 2]);
        assert_eq!(
            commands,
            vec![
                (0, DriveCommand::Forward(10)),
                (1, DriveCommand::Forward(20)),
                (2, DriveCommand::Forward(30)),
            ]
        );
        assert_eq!(phases[1], CoursePhase::Accelerating);
        assert_eq!(phases[2], CoursePhase::CruisingForward);
    }

    #[test]
    fn test_rising_distance_never_goes_back() {
        let mut course = Course::new(config());
        let distances: Vec<i32> = (0..200).map(|i| i * 10).collect();
        let (phases, commands) = run(&mut course, &distances);

        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*phases.last().unwrap(), CoursePhase::Reversing);
        // Stop once at the target, reverse once after the dwell
        let stops = commands.iter().filter(|(_, c)| *c == DriveCommand::Stop).count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_full_course_visits_each_phase_once() {
        let mut course = Course::new(config());
        // Out to 600 mm, back to -20 mm, then idle
        let mut distances: Vec<i32> = (0..=12).map(|i| i * 50).collect();
        distances.extend((0..=31).map(|i| 600 - i * 20));
        distances.extend([-20; 10]);
        let (phases, commands) = run(&mut course, &distances);

        let mut visited = phases.clone();
        visited.dedup();
        assert_eq!(
            visited,
            vec![
                CoursePhase::Accelerating,
                CoursePhase::CruisingForward,
                CoursePhase::Reversing,
                CoursePhase::Stopped,
            ]
        );
        assert!(course.is_finished());
        assert_eq!(commands.last().unwrap().1, DriveCommand::Stop);

        // Nothing more once stopped
        assert_eq!(course.step(-1000), Step::default());
        assert_eq!(course.step(10_000), Step::default());
    }

    #[test]
    fn test_stop_then_reverse_after_dwell() {
        let mut course = Course::new(config());
        let (_, commands) = run(&mut course, &[0, 0, 0, 100, 499, 500, 520, 520, 520, 520]);

        let stop = commands
            .iter()
            .find(|(_, c)| *c == DriveCommand::Stop)
            .unwrap();
        let reverse = commands
            .iter()
            .find(|(_, c)| matches!(c, DriveCommand::Reverse(_)))
            .unwrap();
        assert_eq!(stop.0, 5);
        assert_eq!(reverse.0 - stop.0, 3);
        assert_eq!(reverse.1, DriveCommand::Reverse(40));
    }

    #[test]
    fn test_integration_suspended_during_dwell() {
        let mut course = Course::new(config());
        run(&mut course, &[0, 0, 0, 600]);
        assert_eq!(course.phase(), CoursePhase::Reversing);
        assert!(!course.integrating());

        course.step(600);
        course.step(600);
        let step = course.step(600);
        assert!(step.reset_velocity);
        assert!(course.integrating());
    }

    #[test]
    fn test_zero_dwell_reverses_with_the_stop() {
        let mut course = Course::new(CourseConfig {
            dwell_ticks: 0,
            ..config()
        });
        run(&mut course, &[0, 0, 0]);
        let step = course.step(500);
        assert_eq!(
            step.commands,
            vec![DriveCommand::Stop, DriveCommand::Reverse(40)]
        );
    }

    #[test]
    fn test_phase_never_decreases_on_noisy_trace() {
        let mut course = Course::new(config());
        // Deterministic zig-zag around both thresholds
        let distances: Vec<i32> = (0..300)
            .map(|i: i32| ((i * 37) % 1100) - 300)
            .collect();
        let (phases, _) = run(&mut course, &distances);
        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
    }
}
