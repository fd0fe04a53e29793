//! Application layer for Chorus.
//!
//! Hosts the [`TurnOrchestrator`], which ties speaker selection, eligibility,
//! persona responders and the session store together round by round.

pub mod turn_orchestrator;

pub use turn_orchestrator::{
    CompletedTurn, ImportMode, ROUND_EVENT_TARGET, RoundOutcome, SessionSummary, TurnOrchestrator,
};
