//! Per-request state machine
//!
//! `Received → Classified → Normalized → { ClassifyOnlyDone | Executing → Done }`,
//! with `Failed` reachable from any non-terminal state. Nothing re-enters
//! `Classified` or `Normalized`.

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Classified,
    Normalized,
    ClassifyOnlyDone,
    Executing,
    Done,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::ClassifyOnlyDone | RequestState::Done | RequestState::Failed
        )
    }

    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, Classified)
            | (Classified, Normalized)
            | (Normalized, ClassifyOnlyDone)
            | (Normalized, Executing)
            | (Executing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Received => "received",
            RequestState::Classified => "classified",
            RequestState::Normalized => "normalized",
            RequestState::ClassifyOnlyDone => "classify_only_done",
            RequestState::Executing => "executing",
            RequestState::Done => "done",
            RequestState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the state of one request
#[derive(Debug)]
pub struct RequestLifecycle {
    request_id: Uuid,
    state: RequestState,
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            state: RequestState::Received,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Move to `next`; illegal transitions are refused and leave the state as is
    pub fn advance(&mut self, next: RequestState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                request_id = %self.request_id,
                from = %self.state,
                to = %next,
                "Refused illegal request state transition"
            );
            return false;
        }
        debug!(request_id = %self.request_id, from = %self.state, to = %next, "Request state");
        self.state = next;
        true
    }
}
