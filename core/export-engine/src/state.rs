//! FILENAME: core/export-engine/src/state.rs

use std::fmt;

/// VALIDATING -> RUNNING -> DRAINING -> FINISHED, or FAILED from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportState {
    Validating,
    Running,
    Draining,
    Finished,
    Failed,
}

impl ExportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Finished | ExportState::Failed)
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_move_to(&self, next: ExportState) -> bool {
        use ExportState::*;
        matches!(
            (self, next),
            (Validating, Running)
                | (Running, Draining)
                | (Draining, Finished)
                | (Validating | Running | Draining, Failed)
        )
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportState::Validating => "VALIDATING",
            ExportState::Running => "RUNNING",
            ExportState::Draining => "DRAINING",
            ExportState::Finished => "FINISHED",
            ExportState::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(ExportState::Validating.can_move_to(ExportState::Running));
        assert!(ExportState::Draining.can_move_to(ExportState::Failed));
        assert!(!ExportState::Finished.can_move_to(ExportState::Failed));
        assert!(!ExportState::Validating.can_move_to(ExportState::Draining));
        assert!(ExportState::Failed.is_terminal());
    }
}
