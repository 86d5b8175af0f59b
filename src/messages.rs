// Records reported by the runtime

use serde::Serialize;

use crate::control::CoursePhase;
use crate::motion::MotionState;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Running,
    Completed,
    Aborted,
    Faulted { reason: String },
}

/// Final state published when the runtime exits
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub phase: CoursePhase,
    pub ticks: u64,
    pub motion: MotionState,
    pub commands_sent: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_json() {
        let summary = RunSummary {
            outcome: RunOutcome::Faulted {
                reason: "bus".to_string(),
            },
            phase: CoursePhase::CruisingForward,
            ticks: 12,
            motion: MotionState {
                velocity: 250,
                distance: 900,
            },
            commands_sent: 4,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["outcome"]["faulted"]["reason"], "bus");
        assert_eq!(json["phase"], "cruising_forward");
        assert_eq!(json["motion"]["distance"], 900);
    }
}
