//! Speaker selection.
//!
//! # Module Structure
//!
//! - `mode`: the chat mode enum
//! - `rng`: injectable randomness
//! - `scanner`: tokens, mentions, tags and the quit marker in round text
//! - `selector`: the five selection strategies

mod mode;
mod rng;
mod scanner;
mod selector;

pub use mode::ChatMode;
pub use rng::SelectionRng;
pub use scanner::{ALL_CALL_TOKEN, ALL_CALL_TOKENS, QUIT_GROUP_MARKER, QuitScan, RoundTextScanner};
pub use selector::{
    SelectedSpeaker, SelectionInput, SelectionReason, SpeakerSelector, round_window,
};
