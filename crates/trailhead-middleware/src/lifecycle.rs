//! Per-request state machine.
//!
//! Every request moves through a fixed set of phases:
//!
//! ```text
//! Received → Normalized → PolicyChecked → Dispatched → HandlerCompleted
//!     │           │             │              │
//!     └───────────┴─────────────┴──────────────┴──→ Faulted → Classified → Responded
//!     │           │
//!     └───────────┴──→ PolicyAnswered
//! ```
//!
//! `PolicyAnswered` is entered when a policy stage answers the request
//! itself, as CORS does for a preflight. `HandlerCompleted`,
//! `PolicyAnswered` and `Responded` are terminal. The pipeline records each
//! step in the request's [`RequestLifecycle`]; an out-of-order step is
//! rejected with a [`LifecycleError`] instead of silently overwriting the
//! current phase.

use thiserror::Error;

/// A phase in the life of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPhase {
    /// The request entered the pipeline.
    Received,
    /// All ingress normalizers ran.
    Normalized,
    /// All access policy filters passed.
    PolicyChecked,
    /// The request was handed to the dispatcher.
    Dispatched,
    /// The dispatcher produced a response.
    HandlerCompleted,
    /// A policy stage produced the response without dispatching.
    PolicyAnswered,
    /// A stage raised an error.
    Faulted,
    /// The error classifier enriched the error.
    Classified,
    /// The error responder sent the error response.
    Responded,
}

impl RequestPhase {
    /// Returns the phase name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Normalized => "normalized",
            Self::PolicyChecked => "policy_checked",
            Self::Dispatched => "dispatched",
            Self::HandlerCompleted => "handler_completed",
            Self::PolicyAnswered => "policy_answered",
            Self::Faulted => "faulted",
            Self::Classified => "classified",
            Self::Responded => "responded",
        }
    }

    /// Returns `true` if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::HandlerCompleted | Self::PolicyAnswered | Self::Responded
        )
    }

    /// Returns `true` if `next` may directly follow `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Normalized)
                | (Self::Normalized, Self::PolicyChecked)
                | (Self::PolicyChecked, Self::Dispatched)
                | (Self::Dispatched, Self::HandlerCompleted)
                | (Self::Received | Self::Normalized, Self::PolicyAnswered)
                | (
                    Self::Received | Self::Normalized | Self::PolicyChecked | Self::Dispatched,
                    Self::Faulted
                )
                | (Self::Faulted, Self::Classified)
                | (Self::Classified, Self::Responded)
        )
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An attempted transition that the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal request phase transition: {from} -> {to}")]
pub struct LifecycleError {
    /// The phase the request was in.
    pub from: RequestPhase,
    /// The phase that was requested.
    pub to: RequestPhase,
}

/// Tracks the phases a request has passed through.
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    history: Vec<RequestPhase>,
}

impl RequestLifecycle {
    /// Creates a lifecycle in the [`RequestPhase::Received`] phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: vec![RequestPhase::Received],
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> RequestPhase {
        self.history
            .last()
            .copied()
            .unwrap_or(RequestPhase::Received)
    }

    /// Returns every phase visited so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[RequestPhase] {
        &self.history
    }

    /// Moves to `next`, or reports why that is not allowed.
    pub fn advance(&mut self, next: RequestPhase) -> Result<(), LifecycleError> {
        let from = self.phase();
        if !from.can_advance_to(next) {
            return Err(LifecycleError { from, to: next });
        }
        self.history.push(next);
        Ok(())
    }

    /// Returns `true` if the request reached a terminal phase.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Returns `true` if the request took the error path.
    #[must_use]
    pub fn faulted(&self) -> bool {
        self.history.contains(&RequestPhase::Faulted)
    }
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
