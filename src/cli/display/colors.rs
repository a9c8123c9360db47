//! Color theme for CLI output

use crate::domain::server::LifecycleState;
use comfy_table::Color as TableColor;

/// Color theme for terminal output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    /// Get color based on replica status
    pub fn get_replica_color(&self, ready: i32, desired: i32) -> TableColor {
        if desired == 0 {
            self.muted
        } else if ready >= desired {
            self.success
        } else {
            self.warning
        }
    }

    pub fn get_state_color(&self, state: LifecycleState) -> TableColor {
        match state {
            LifecycleState::Running => self.success,
            LifecycleState::Paused | LifecycleState::Absent => self.muted,
            LifecycleState::Failed => self.error,
            LifecycleState::Deploying
            | LifecycleState::Pausing
            | LifecycleState::Resuming
            | LifecycleState::Stopping => self.warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_replica_color() {
        let theme = ColorTheme::default();
        assert_eq!(theme.get_replica_color(1, 1), TableColor::Green);
        assert_eq!(theme.get_replica_color(0, 1), TableColor::Yellow);
        assert_eq!(theme.get_replica_color(0, 0), TableColor::DarkGrey);
    }

    #[test]
    fn test_get_state_color() {
        let theme = ColorTheme::default();
        assert_eq!(theme.get_state_color(LifecycleState::Running), TableColor::Green);
        assert_eq!(theme.get_state_color(LifecycleState::Failed), TableColor::Red);
        assert_eq!(theme.get_state_color(LifecycleState::Pausing), TableColor::Yellow);
    }
}
