//! Migration progress tracking

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};

/// Where a migration run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    NotStarted,
    BackedUp,
    Merged,
    Validated,
    Written,
    Failed,
    RolledBack,
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MigrationState::NotStarted => "not_started",
            MigrationState::BackedUp => "backed_up",
            MigrationState::Merged => "merged",
            MigrationState::Validated => "validated",
            MigrationState::Written => "written",
            MigrationState::Failed => "failed",
            MigrationState::RolledBack => "rolled_back",
        };
        write!(f, "{}", name)
    }
}

impl MigrationState {
    /// Whether `next` may follow `self`
    pub fn can_transition_to(self, next: MigrationState) -> bool {
        use MigrationState::*;
        matches!(
            (self, next),
            (NotStarted, BackedUp)
                | (BackedUp, Merged)
                | (Merged, Validated)
                | (Validated, Written)
                | (NotStarted | BackedUp | Merged | Validated, Failed)
                | (Written | Failed, RolledBack)
        )
    }
}

/// Current state plus the last step that completed before a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationTracker {
    state: MigrationState,
    last_completed: MigrationState,
}

impl Default for MigrationTracker {
    fn default() -> Self {
        Self::starting_at(MigrationState::NotStarted)
    }
}

impl MigrationTracker {
    /// Tracker resuming from a state observed on disk
    pub fn starting_at(state: MigrationState) -> Self {
        Self {
            state,
            last_completed: state,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Last successful step; differs from `state` only after a failure
    pub fn last_completed(&self) -> MigrationState {
        self.last_completed
    }

    /// Move to `next`, refusing skipped or backward steps
    pub fn advance(&mut self, next: MigrationState) -> ConfigResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ConfigError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if next != MigrationState::Failed {
            self.last_completed = next;
        }
        self.state = next;
        Ok(())
    }

    /// Record a failure; a no-op when already failed or finished
    pub fn fail(&mut self) {
        if self.state.can_transition_to(MigrationState::Failed) {
            self.state = MigrationState::Failed;
        }
    }
}
