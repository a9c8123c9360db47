//! Status icons for CLI output

use crate::domain::server::LifecycleState;

/// Status icons for different states
pub struct StatusIcon;

impl StatusIcon {
    /// Serving players
    pub const SUCCESS: &'static str = "✓";

    /// Transition in progress
    pub const PENDING: &'static str = "⏳";

    /// Paused, save data in the store
    pub const PAUSED: &'static str = "⏸";

    /// Needs an operator
    pub const ERROR: &'static str = "✗";

    pub const ABSENT: &'static str = "-";

    pub fn for_state(state: LifecycleState) -> &'static str {
        match state {
            LifecycleState::Running => Self::SUCCESS,
            LifecycleState::Paused => Self::PAUSED,
            LifecycleState::Failed => Self::ERROR,
            LifecycleState::Absent => Self::ABSENT,
            LifecycleState::Deploying
            | LifecycleState::Pausing
            | LifecycleState::Resuming
            | LifecycleState::Stopping => Self::PENDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_state() {
        assert_eq!(StatusIcon::for_state(LifecycleState::Running), StatusIcon::SUCCESS);
        assert_eq!(StatusIcon::for_state(LifecycleState::Paused), StatusIcon::PAUSED);
        assert_eq!(StatusIcon::for_state(LifecycleState::Resuming), StatusIcon::PENDING);
        assert_eq!(StatusIcon::for_state(LifecycleState::Failed), StatusIcon::ERROR);
    }
}
