//! Speaker selection strategies.

use super::mode::ChatMode;
use super::rng::SelectionRng;
use super::scanner::RoundTextScanner;
use crate::eligibility::{EligibilityMode, EligibilityTracker};
use crate::persona::Persona;
use crate::session::{ChatMessage, MessageRole};
use std::collections::{BTreeSet, HashSet};

/// Why a persona was put on the speaker list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Sequential mode, registry order.
    Registry,
    /// Shuffled mode.
    Shuffled,
    /// Random-subset mode.
    RandomSubset,
    /// All-call override.
    AllCall,
    /// Explicit `@name` / `@tag` mention.
    Mention,
    /// A tag occurred in a user message.
    UserTag,
    /// A tag occurred in another persona's message.
    PersonaTag,
    /// Won the per-persona probability draw.
    Chance,
    /// Forced pick because nobody else was selected.
    Fallback,
    /// Explicit invitation.
    Invited,
}

/// One entry of a round's speaker list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedSpeaker {
    pub persona: Persona,
    pub reason: SelectionReason,
}

/// Everything a strategy reads to pick a round's speakers.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub mode: ChatMode,
    /// Active personas in registry order.
    pub personas: &'a [Persona],
    /// Full history of the session; the round window is derived from it.
    pub history: &'a [ChatMessage],
    pub eligibility: &'a EligibilityTracker,
    /// Set when the triggering user message contained an all-call token.
    pub all_call: bool,
    /// Configured active persona count, used for the chance tier.
    pub active_limit: usize,
}

/// The messages that make up the current round.
///
/// With at most one message this is the whole history. Otherwise the window
/// opens at the latest user message before the newest entry, so that a fresh
/// user message is read together with the replies to the previous one. If
/// no such user message exists the whole history is used.
pub fn round_window(history: &[ChatMessage]) -> &[ChatMessage] {
    if history.len() <= 1 {
        return history;
    }

    history[..history.len() - 1]
        .iter()
        .rposition(|message| message.role == MessageRole::User)
        .map_or(history, |start| &history[start..])
}

/// Maps a round's inputs to an ordered, duplicate-free speaker list.
#[derive(Debug, Clone)]
pub struct SpeakerSelector {
    scanner: RoundTextScanner,
}

impl SpeakerSelector {
    /// Builds a selector for the given active personas.
    pub fn new(personas: &[Persona]) -> Self {
        Self {
            scanner: RoundTextScanner::new(personas),
        }
    }

    /// The scanner shared with highlighting front-ends.
    pub fn scanner(&self) -> &RoundTextScanner {
        &self.scanner
    }

    /// Picks the speakers for one automatic round.
    ///
    /// Button-invite mode never selects anyone here; see [`Self::select_invited`].
    pub fn select<R>(&self, input: &SelectionInput<'_>, rng: &mut R) -> Vec<SelectedSpeaker>
    where
        R: SelectionRng + ?Sized,
    {
        if input.mode == ChatMode::ButtonInvite {
            return Vec::new();
        }

        if input.all_call {
            return all_call(input);
        }

        let eligible: Vec<&Persona> = input
            .personas
            .iter()
            .filter(|p| input.eligibility.is_eligible(&p.name, EligibilityMode::Normal))
            .collect();

        match input.mode {
            ChatMode::Sequential => tag(eligible, SelectionReason::Registry),
            ChatMode::Shuffled => {
                let order = rng.permutation(eligible.len());
                tag(order.into_iter().map(|i| eligible[i]), SelectionReason::Shuffled)
            }
            ChatMode::RandomSubset => {
                if eligible.is_empty() {
                    return Vec::new();
                }
                let size = rng.pick(eligible.len()) + 1;
                let order = rng.permutation(eligible.len());
                tag(
                    order.into_iter().take(size).map(|i| eligible[i]),
                    SelectionReason::RandomSubset,
                )
            }
            ChatMode::NaturalRandom => self.natural_random(input, &eligible, rng),
            ChatMode::ButtonInvite => Vec::new(),
        }
    }

    /// Resolves an explicit invitation of one active persona.
    ///
    /// Mute and next-round exclusion still apply; a self-opt-out does not.
    pub fn select_invited(
        &self,
        name: &str,
        personas: &[Persona],
        eligibility: &EligibilityTracker,
    ) -> Vec<SelectedSpeaker> {
        personas
            .iter()
            .find(|p| p.name == name)
            .filter(|p| eligibility.is_eligible(&p.name, EligibilityMode::Forced))
            .map(|p| SelectedSpeaker {
                persona: p.clone(),
                reason: SelectionReason::Invited,
            })
            .into_iter()
            .collect()
    }

    fn natural_random<R>(
        &self,
        input: &SelectionInput<'_>,
        eligible: &[&Persona],
        rng: &mut R,
    ) -> Vec<SelectedSpeaker>
    where
        R: SelectionRng + ?Sized,
    {
        if eligible.is_empty() {
            return Vec::new();
        }

        let window = round_window(input.history);
        let called_all = window
            .last()
            .is_some_and(|m| m.is_user() && RoundTextScanner::contains_all_call(m.text()));
        if called_all {
            return all_call(input);
        }

        let mut mentioned = BTreeSet::new();
        let mut user_tags = BTreeSet::new();
        let mut persona_tags = BTreeSet::new();
        for message in window {
            let text = message.text();
            if text.is_empty() {
                continue;
            }
            mentioned.extend(self.scanner.mentioned_personas(text));
            let tags = self.scanner.tag_matches(text);
            if message.is_user() {
                user_tags.extend(tags);
            } else {
                persona_tags.extend(tags);
            }
        }

        let mut chosen: Vec<SelectedSpeaker> = Vec::new();
        let mut taken: HashSet<&str> = HashSet::new();
        let mut add_tier = |hits: &BTreeSet<String>, reason: SelectionReason| {
            for persona in eligible {
                if hits.contains(&persona.name) && taken.insert(persona.name.as_str()) {
                    chosen.push(SelectedSpeaker {
                        persona: (*persona).clone(),
                        reason,
                    });
                }
            }
        };
        add_tier(&mentioned, SelectionReason::Mention);
        add_tier(&user_tags, SelectionReason::UserTag);
        add_tier(&persona_tags, SelectionReason::PersonaTag);

        let probability = 1.0 / input.active_limit.max(1) as f64;
        for persona in eligible {
            if !taken.contains(persona.name.as_str()) && rng.chance(probability) {
                taken.insert(persona.name.as_str());
                chosen.push(SelectedSpeaker {
                    persona: (*persona).clone(),
                    reason: SelectionReason::Chance,
                });
            }
        }

        if chosen.is_empty() {
            let persona = eligible[rng.pick(eligible.len())];
            tracing::debug!("[Selector] No speaker selected, falling back to {}", persona.name);
            chosen.push(SelectedSpeaker {
                persona: persona.clone(),
                reason: SelectionReason::Fallback,
            });
        }

        chosen
    }
}

/// Active personas minus muted and excluded ones, in registry order.
fn all_call(input: &SelectionInput<'_>) -> Vec<SelectedSpeaker> {
    tag(
        input
            .personas
            .iter()
            .filter(|p| input.eligibility.is_eligible(&p.name, EligibilityMode::Forced)),
        SelectionReason::AllCall,
    )
}

fn tag<'p>(
    personas: impl IntoIterator<Item = &'p Persona>,
    reason: SelectionReason,
) -> Vec<SelectedSpeaker> {
    personas
        .into_iter()
        .map(|persona| SelectedSpeaker {
            persona: persona.clone(),
            reason,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MessageContent;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::VecDeque;

    /// Scripted draws: fixed chance outcome, queued picks, identity permutations
    /// unless one is queued.
    struct ScriptedRng {
        chance: bool,
        picks: VecDeque<usize>,
        permutations: VecDeque<Vec<usize>>,
        chance_calls: usize,
    }

    impl ScriptedRng {
        fn never() -> Self {
            Self {
                chance: false,
                picks: VecDeque::new(),
                permutations: VecDeque::new(),
                chance_calls: 0,
            }
        }
    }

    impl SelectionRng for ScriptedRng {
        fn chance(&mut self, _probability: f64) -> bool {
            self.chance_calls += 1;
            self.chance
        }

        fn pick(&mut self, upper: usize) -> usize {
            self.picks.pop_front().unwrap_or(0) % upper
        }

        fn permutation(&mut self, len: usize) -> Vec<usize> {
            self.permutations
                .pop_front()
                .unwrap_or_else(|| (0..len).collect())
        }
    }

    fn cast() -> Vec<Persona> {
        vec![
            Persona::new("A", "m").with_tags("astronomy,physics"),
            Persona::new("B", "m").with_tags("games"),
            Persona::new("C", "m").with_tags("poetry"),
        ]
    }

    fn user(text: &str) -> ChatMessage {
        ChatMessage::user("Ryan", MessageContent::text(text))
    }

    fn names(speakers: &[SelectedSpeaker]) -> Vec<&str> {
        speakers.iter().map(|s| s.persona.name.as_str()).collect()
    }

    fn input<'a>(
        mode: ChatMode,
        personas: &'a [Persona],
        history: &'a [ChatMessage],
        eligibility: &'a EligibilityTracker,
    ) -> SelectionInput<'a> {
        SelectionInput {
            mode,
            personas,
            history,
            eligibility,
            all_call: false,
            active_limit: personas.len(),
        }
    }

    #[test]
    fn test_round_window() {
        let first = vec![user("hello")];
        assert_eq!(round_window(&first).len(), 1);

        let history = vec![
            user("one"),
            ChatMessage::assistant("A", "r1"),
            user("two"),
            ChatMessage::assistant("B", "r2"),
            ChatMessage::assistant("C", "r3"),
            user("three"),
        ];
        let window = round_window(&history);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].text(), "two");

        let no_user = vec![ChatMessage::assistant("A", "x"), ChatMessage::assistant("B", "y")];
        assert_eq!(round_window(&no_user).len(), 2);
    }

    #[test]
    fn test_sequential_registry_order() {
        let personas = cast();
        let eligibility = EligibilityTracker::new();
        let history = vec![user("hi")];
        let selector = SpeakerSelector::new(&personas);

        let speakers = selector.select(
            &input(ChatMode::Sequential, &personas, &history, &eligibility),
            &mut ScriptedRng::never(),
        );
        assert_eq!(names(&speakers), vec!["A", "B", "C"]);
        assert!(speakers.iter().all(|s| s.reason == SelectionReason::Registry));
    }

    #[test]
    fn test_shuffled_uses_one_permutation_of_eligible() {
        let personas = cast();
        let mut eligibility = EligibilityTracker::new();
        eligibility.toggle_exclude("B");
        let history = vec![user("hi")];
        let selector = SpeakerSelector::new(&personas);
        let mut rng = ScriptedRng::never();
        rng.permutations.push_back(vec![1, 0]);

        let speakers = selector.select(
            &input(ChatMode::Shuffled, &personas, &history, &eligibility),
            &mut rng,
        );
        assert_eq!(names(&speakers), vec!["C", "A"]);
    }

    #[test]
    fn test_random_subset_is_non_empty_and_unique() {
        let personas = cast();
        let eligibility = EligibilityTracker::new();
        let history = vec![user("hi")];
        let selector = SpeakerSelector::new(&personas);
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..50 {
            let speakers = selector.select(
                &input(ChatMode::RandomSubset, &personas, &history, &eligibility),
                &mut rng,
            );
            let unique: HashSet<_> = names(&speakers).into_iter().collect();
            assert!(!speakers.is_empty() && speakers.len() <= 3);
            assert_eq!(unique.len(), speakers.len());
        }
    }

    #[test]
    fn test_button_invite_has_no_automatic_round() {
        let personas = cast();
        let eligibility = EligibilityTracker::new();
        let history = vec![user("@所有人 hi")];
        let selector = SpeakerSelector::new(&personas);
        let mut all = input(ChatMode::ButtonInvite, &personas, &history, &eligibility);
        all.all_call = true;

        assert!(selector.select(&all, &mut ScriptedRng::never()).is_empty());
    }

    #[test]
    fn test_invited_respects_mute_and_exclusion_not_opt_out() {
        let personas = cast();
        let mut eligibility = EligibilityTracker::with_muted(["A"]);
        eligibility.toggle_exclude("B");
        eligibility.mark_opted_out("C");
        let selector = SpeakerSelector::new(&personas);

        assert!(selector.select_invited("A", &personas, &eligibility).is_empty());
        assert!(selector.select_invited("B", &personas, &eligibility).is_empty());
        assert!(selector.select_invited("Z", &personas, &eligibility).is_empty());
        let invited = selector.select_invited("C", &personas, &eligibility);
        assert_eq!(names(&invited), vec!["C"]);
        assert_eq!(invited[0].reason, SelectionReason::Invited);
    }

    #[test]
    fn test_all_call_law() {
        let personas = cast();
        let mut eligibility = EligibilityTracker::with_muted(["A"]);
        eligibility.mark_opted_out("C");
        let history = vec![user("@所有人 hello")];
        let selector = SpeakerSelector::new(&personas);

        for mode in [ChatMode::NaturalRandom, ChatMode::Sequential, ChatMode::RandomSubset] {
            let mut round = input(mode, &personas, &history, &eligibility);
            round.all_call = true;
            let speakers = selector.select(&round, &mut ScriptedRng::never());
            assert_eq!(names(&speakers), vec!["B", "C"]);
        }
    }

    #[test]
    fn test_natural_random_detects_all_call_in_window() {
        let personas = cast();
        let eligibility = EligibilityTracker::new();
        let history = vec![user("@everyone wake up")];
        let selector = SpeakerSelector::new(&personas);

        let speakers = selector.select(
            &input(ChatMode::NaturalRandom, &personas, &history, &eligibility),
            &mut ScriptedRng::never(),
        );
        assert_eq!(names(&speakers), vec!["A", "B", "C"]);
        assert!(speakers.iter().all(|s| s.reason == SelectionReason::AllCall));
    }

    #[test]
    fn test_natural_random_tier_order() {
        let personas = cast();
        let eligibility = EligibilityTracker::new();
        let history = vec![
            user("any games tonight?"),
            ChatMessage::assistant("B", "maybe some astronomy first"),
            user("@C write me something"),
        ];
        let selector = SpeakerSelector::new(&personas);

        let speakers = selector.select(
            &input(ChatMode::NaturalRandom, &personas, &history, &eligibility),
            &mut ScriptedRng::never(),
        );
        assert_eq!(names(&speakers), vec!["C", "B", "A"]);
        let reasons: Vec<_> = speakers.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SelectionReason::Mention,
                SelectionReason::UserTag,
                SelectionReason::PersonaTag
            ]
        );
    }

    #[test]
    fn test_natural_random_chance_tier_skips_selected() {
        let personas = cast();
        let eligibility = EligibilityTracker::new();
        let history = vec![user("@A hi")];
        let selector = SpeakerSelector::new(&personas);
        let mut rng = ScriptedRng::never();
        rng.chance = true;

        let speakers = selector.select(
            &input(ChatMode::NaturalRandom, &personas, &history, &eligibility),
            &mut rng,
        );
        assert_eq!(names(&speakers), vec!["A", "B", "C"]);
        assert_eq!(rng.chance_calls, 2);
        assert_eq!(speakers[1].reason, SelectionReason::Chance);
    }

    #[test]
    fn test_natural_random_fallback_picks_exactly_one() {
        let personas = cast();
        let mut eligibility = EligibilityTracker::new();
        eligibility.toggle_exclude("A");
        let history = vec![user("nothing to see here")];
        let selector = SpeakerSelector::new(&personas);
        let mut rng = ScriptedRng::never();
        rng.picks.push_back(1);

        let speakers = selector.select(
            &input(ChatMode::NaturalRandom, &personas, &history, &eligibility),
            &mut rng,
        );
        assert_eq!(names(&speakers), vec!["C"]);
        assert_eq!(speakers[0].reason, SelectionReason::Fallback);
    }

    #[test]
    fn test_natural_random_ignores_ineligible_mentions() {
        let personas = cast();
        let mut eligibility = EligibilityTracker::new();
        eligibility.mark_opted_out("C");
        let history = vec![user("@C are you there? poetry please")];
        let selector = SpeakerSelector::new(&personas);

        let speakers = selector.select(
            &input(ChatMode::NaturalRandom, &personas, &history, &eligibility),
            &mut ScriptedRng::never(),
        );
        assert_eq!(speakers.len(), 1);
        assert_eq!(speakers[0].reason, SelectionReason::Fallback);
        assert_ne!(speakers[0].persona.name, "C");
    }

    #[test]
    fn test_nobody_eligible_yields_empty_round() {
        let personas = cast();
        let eligibility = EligibilityTracker::with_muted(["A", "B", "C"]);
        let history = vec![user("hello?")];
        let selector = SpeakerSelector::new(&personas);

        for mode in [
            ChatMode::Sequential,
            ChatMode::Shuffled,
            ChatMode::RandomSubset,
            ChatMode::NaturalRandom,
        ] {
            let speakers = selector.select(
                &input(mode, &personas, &history, &eligibility),
                &mut ScriptedRng::never(),
            );
            assert!(speakers.is_empty());
        }
    }

    #[test]
    fn test_muted_never_selected_in_any_mode() {
        let personas = cast();
        let eligibility = EligibilityTracker::with_muted(["B"]);
        let history = vec![user("@B @所有人 games games")];
        let selector = SpeakerSelector::new(&personas);
        let mut rng = StdRng::seed_from_u64(5);

        for mode in [
            ChatMode::Sequential,
            ChatMode::Shuffled,
            ChatMode::RandomSubset,
            ChatMode::NaturalRandom,
        ] {
            for all_call in [false, true] {
                for _ in 0..20 {
                    let mut round = input(mode, &personas, &history, &eligibility);
                    round.all_call = all_call;
                    let speakers = selector.select(&round, &mut rng);
                    assert!(!names(&speakers).contains(&"B"));
                }
            }
        }
        assert!(selector.select_invited("B", &personas, &eligibility).is_empty());
    }
}
