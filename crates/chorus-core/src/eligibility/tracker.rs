//! Speech eligibility state.

use std::collections::BTreeSet;

/// Which rule set an eligibility check applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityMode {
    /// Mute, single-round exclusion and self-opt-out all apply.
    Normal,
    /// All-call or explicit invitation: a persona's own opt-out is ignored,
    /// user mute and exclusion still apply.
    Forced,
}

/// The single-round sets cleared by [`EligibilityTracker::consume_round_exclusions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumedExclusions {
    pub excluded: BTreeSet<String>,
    pub opted_out: BTreeSet<String>,
}

/// Tracks the three name sets that gate who may speak.
///
/// - `muted`: user-controlled, durable across rounds and sessions
/// - `excluded_next_round`: user-controlled, cleared every round
/// - `opted_out`: set by a persona's own quit marker, cleared every round
#[derive(Debug, Clone, Default)]
pub struct EligibilityTracker {
    muted: BTreeSet<String>,
    excluded_next_round: BTreeSet<String>,
    opted_out: BTreeSet<String>,
}

impl EligibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a previously persisted mute list.
    pub fn with_muted<I, S>(muted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            muted: muted.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn is_eligible(&self, name: &str, mode: EligibilityMode) -> bool {
        if self.muted.contains(name) || self.excluded_next_round.contains(name) {
            return false;
        }
        match mode {
            EligibilityMode::Normal => !self.opted_out.contains(name),
            EligibilityMode::Forced => true,
        }
    }

    pub fn is_muted(&self, name: &str) -> bool {
        self.muted.contains(name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_next_round.contains(name)
    }

    pub fn is_opted_out(&self, name: &str) -> bool {
        self.opted_out.contains(name)
    }

    /// Clears the single-round sets and returns what they held.
    ///
    /// Called once per round, after speakers are selected and before the
    /// first persona is invoked.
    pub fn consume_round_exclusions(&mut self) -> ConsumedExclusions {
        ConsumedExclusions {
            excluded: std::mem::take(&mut self.excluded_next_round),
            opted_out: std::mem::take(&mut self.opted_out),
        }
    }

    /// Records a persona's self-opt-out for the next round.
    pub fn mark_opted_out(&mut self, name: impl Into<String>) {
        self.opted_out.insert(name.into());
    }

    /// Flips the persistent mute for `name`. Returns true if now muted.
    pub fn toggle_mute(&mut self, name: &str) -> bool {
        toggle(&mut self.muted, name)
    }

    /// Flips the next-round exclusion for `name`. Returns true if now excluded.
    pub fn toggle_exclude(&mut self, name: &str) -> bool {
        toggle(&mut self.excluded_next_round, name)
    }

    /// The muted names in sorted order, as persisted.
    pub fn muted_names(&self) -> Vec<String> {
        self.muted.iter().cloned().collect()
    }
}

fn toggle(set: &mut BTreeSet<String>, name: &str) -> bool {
    if set.remove(name) {
        false
    } else {
        set.insert(name.to_string());
        true
    }
}
