//! Chat mode: how speakers are chosen each round.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Speaker selection strategy for a group chat.
///
/// Accepts the historical identifiers (`sequentialQueue`, `NatureRandom`, ...)
/// as well as snake_case aliases in config files and on the command line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum ChatMode {
    /// Every eligible persona, in registry order.
    #[serde(rename = "sequentialQueue", alias = "sequential")]
    #[strum(to_string = "sequentialQueue", serialize = "sequential")]
    Sequential,
    /// Every eligible persona, in a fresh random order each round.
    #[serde(rename = "shuffledQueue", alias = "shuffled")]
    #[strum(to_string = "shuffledQueue", serialize = "shuffled")]
    Shuffled,
    /// A random non-empty subset of the eligible personas.
    #[serde(rename = "randomSubsetQueue", alias = "random_subset")]
    #[strum(to_string = "randomSubsetQueue", serialize = "random_subset")]
    RandomSubset,
    /// No automatic rounds; personas speak only when invited.
    #[serde(rename = "ButtonSend", alias = "button_invite")]
    #[strum(to_string = "ButtonSend", serialize = "button_invite")]
    ButtonInvite,
    /// Mentions, tags and chance decide who speaks, never nobody.
    #[default]
    #[serde(rename = "NatureRandom", alias = "natural_random")]
    #[strum(to_string = "NatureRandom", serialize = "natural_random")]
    NaturalRandom,
}

impl ChatMode {
    /// Whether a user message starts an automatic round in this mode.
    pub fn runs_automatic_rounds(self) -> bool {
        self != ChatMode::ButtonInvite
    }
}
