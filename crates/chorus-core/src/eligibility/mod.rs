//! Speech eligibility: persistent mute, single-round exclusion and self-opt-out.

mod repository;
mod tracker;

pub use repository::MuteListRepository;
pub use tracker::{ConsumedExclusions, EligibilityMode, EligibilityTracker};
