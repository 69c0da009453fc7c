// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lifecycle of a single script execution

use std::fmt;
use std::path::PathBuf;
use tracing::trace;

/// Phase of a single `execute` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Created, nothing evaluated yet
    Pending,
    /// Envelope is being evaluated
    Compiling,
    /// Module body is running
    Running,
    /// Waiting for exported promises to settle
    AwaitingResult,
    /// Finished with a value
    Succeeded,
    /// Finished with an error
    Failed,
}

impl ExecutionState {
    /// Whether `next` may follow `self`
    pub fn can_transition(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Pending, Compiling)
                | (Pending, Failed)
                | (Compiling, Running)
                | (Compiling, Failed)
                | (Running, AwaitingResult)
                | (Running, Succeeded)
                | (Running, Failed)
                | (AwaitingResult, Succeeded)
                | (AwaitingResult, Failed)
        )
    }

    /// Whether the execution has finished
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Succeeded | ExecutionState::Failed)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Compiling => "compiling",
            ExecutionState::Running => "running",
            ExecutionState::AwaitingResult => "awaiting-result",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and traces the state of one execution
#[derive(Debug)]
pub struct ExecutionTracker {
    script: PathBuf,
    state: ExecutionState,
}

impl ExecutionTracker {
    /// Start tracking an execution of `script`
    pub fn new(script: PathBuf) -> Self {
        Self {
            script,
            state: ExecutionState::Pending,
        }
    }

    /// Current state
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Move to `next`; returns false and stays put if the move is not allowed
    pub fn advance(&mut self, next: ExecutionState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition(next) {
            tracing::warn!(
                "Ignoring execution transition {} -> {} for {}",
                self.state,
                next,
                self.script.display()
            );
            return false;
        }
        trace!("{}: {} -> {}", self.script.display(), self.state, next);
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_paths() {
        let mut tracker = ExecutionTracker::new(PathBuf::from("hook.js"));
        assert!(tracker.advance(ExecutionState::Compiling));
        assert!(tracker.advance(ExecutionState::Running));
        assert!(tracker.advance(ExecutionState::AwaitingResult));
        assert!(tracker.advance(ExecutionState::Succeeded));
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn test_no_backward_transitions() {
        let mut tracker = ExecutionTracker::new(PathBuf::from("hook.js"));
        tracker.advance(ExecutionState::Compiling);
        tracker.advance(ExecutionState::Running);
        assert!(!tracker.advance(ExecutionState::Compiling));
        assert_eq!(tracker.state(), ExecutionState::Running);

        tracker.advance(ExecutionState::Failed);
        assert!(!tracker.advance(ExecutionState::Succeeded));
        assert_eq!(tracker.state(), ExecutionState::Failed);
    }

    #[test]
    fn test_cannot_skip_compilation() {
        assert!(!ExecutionState::Pending.can_transition(ExecutionState::Running));
        assert!(!ExecutionState::Pending.can_transition(ExecutionState::Succeeded));
        assert!(ExecutionState::Compiling.can_transition(ExecutionState::Failed));
    }
}
