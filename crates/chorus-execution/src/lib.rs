//! Runtime wiring for Chorus front-ends.
//!
//! - `logging`: global subscriber setup (`init_tracing`)
//! - `round_events`: a layer that forwards round lifecycle events to a channel

pub mod logging;
pub mod round_events;

pub use logging::{LogFormat, LoggingOptions, init_tracing};
pub use round_events::{RoundEvent, RoundEventLayer, is_round_event};
