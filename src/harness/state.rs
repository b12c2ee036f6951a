// src/harness/state.rs - Lifecycle states of a single backend run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RunState {
    Init,
    Connecting,
    Connected,
    SchemaReady,
    Seeded,
    Verified,
    Failed,
    Closed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::Connecting => "connecting",
            RunState::Connected => "connected",
            RunState::SchemaReady => "schema_ready",
            RunState::Seeded => "seeded",
            RunState::Verified => "verified",
            RunState::Failed => "failed",
            RunState::Closed => "closed",
        }
    }

    /// Whether `next` may follow this state. Failure is reachable from every
    /// state that still has a step ahead of it (cancellation can land between
    /// any two steps); only verified and failed runs may close.
    pub fn can_advance_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Init, Connecting)
                | (Connecting, Connected)
                | (Connected, SchemaReady)
                | (SchemaReady, Seeded)
                | (Seeded, Verified)
                | (Verified, Closed)
                | (Init | Connecting | Connected | SchemaReady | Seeded, Failed)
                | (Failed, Closed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == RunState::Closed
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enforces legal transitions and remembers when each state was entered
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    state: RunState,
    history: Vec<(RunState, DateTime<Utc>)>,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Init,
            history: vec![(RunState::Init, Utc::now())],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(HarnessError::IllegalTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        self.state = next;
        self.history.push((next, Utc::now()));
        Ok(())
    }

    /// Move to `Failed` unless the run already failed or closed
    pub fn fail(&mut self) {
        if self.state.can_advance_to(RunState::Failed) {
            self.state = RunState::Failed;
            self.history.push((RunState::Failed, Utc::now()));
        }
    }

    /// Close from whatever state the run ended in
    pub fn close(&mut self) {
        if !self.state.can_advance_to(RunState::Closed) {
            self.fail();
        }
        if self.state.can_advance_to(RunState::Closed) {
            self.state = RunState::Closed;
            self.history.push((RunState::Closed, Utc::now()));
        }
    }

    pub fn visited(&self) -> Vec<RunState> {
        self.history.iter().map(|(state, _)| *state).collect()
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
