//! Run states and the final report

use std::fmt;

use super::RunError;

/// Orchestrator state machine
///
/// `Resolving -> [TunnelSetup] -> Probing -> Ready -> Running -> Cleanup -> Done | Failed`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Resolving,
    TunnelSetup,
    Probing,
    Ready,
    Running,
    Cleanup,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Resolving => "Resolving",
            RunState::TunnelSetup => "TunnelSetup",
            RunState::Probing => "Probing",
            RunState::Ready => "Ready",
            RunState::Running => "Running",
            RunState::Cleanup => "Cleanup",
            RunState::Done => "Done",
            RunState::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a run
#[derive(Debug)]
pub struct RunReport {
    /// Every state entered, in order
    pub states: Vec<RunState>,
    /// go-ftw's exit code, or the orchestration failure
    pub outcome: Result<i32, RunError>,
}

impl RunReport {
    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            Ok(code) => *code,
            Err(e) => e.exit_code(),
        }
    }

    pub fn final_state(&self) -> Option<RunState> {
        self.states.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::ResolutionError;

    #[test]
    fn test_exit_code_mirrors_downstream() {
        let report = RunReport {
            states: vec![RunState::Running, RunState::Cleanup, RunState::Done],
            outcome: Ok(7),
        };
        assert_eq!(report.exit_code(), 7);
        assert_eq!(report.final_state(), Some(RunState::Done));
    }

    #[test]
    fn test_exit_code_for_failure() {
        let report = RunReport {
            states: vec![RunState::Resolving, RunState::Failed],
            outcome: Err(RunError::Resolution(ResolutionError::NotFound {
                selector: "app=gw".to_string(),
            })),
        };
        assert_ne!(report.exit_code(), 0);
        assert!(!report.states.contains(&RunState::Cleanup));
    }
}
