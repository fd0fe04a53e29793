//! Round-text scanner.
//!
//! All string conventions embedded in free chat text live here: the all-call
//! token, `@` mentions of persona names and tags, keyword tags, and the
//! self-opt-out marker. The selector and any highlighting front-end share the
//! one compiled mention pattern.

use crate::persona::Persona;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

/// Literal all-call token.
pub const ALL_CALL_TOKEN: &str = "@所有人";

/// Every spelling accepted as an all-call.
pub const ALL_CALL_TOKENS: [&str; 2] = [ALL_CALL_TOKEN, "@everyone"];

/// Trailing marker a persona writes to sit out the next round.
pub const QUIT_GROUP_MARKER: &str = "[[QuitGroup]]";

/// Outcome of checking a completion for the quit marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuitScan {
    /// Text with the marker removed and trimmed.
    pub text: String,
    pub opted_out: bool,
}

/// Scans round text for mentions, tags and markers.
#[derive(Debug, Clone)]
pub struct RoundTextScanner {
    /// `@label` alternation, longest labels first. `None` when there is
    /// nothing to match.
    mention_pattern: Option<Regex>,
    /// Mention label (without `@`) to the persona names it addresses.
    label_targets: HashMap<String, Vec<String>>,
    /// Persona name to its tag list, in registry order.
    tags: Vec<(String, Vec<String>)>,
}

impl RoundTextScanner {
    pub fn new(personas: &[Persona]) -> Self {
        let mut label_targets: HashMap<String, Vec<String>> = HashMap::new();
        let mut tags = Vec::with_capacity(personas.len());

        for persona in personas {
            let persona_tags: Vec<String> =
                persona.tag_list().into_iter().map(str::to_string).collect();

            let mut labels = vec![persona.name.clone()];
            labels.extend(persona_tags.iter().cloned());
            for label in labels {
                let targets = label_targets.entry(label).or_default();
                if !targets.contains(&persona.name) {
                    targets.push(persona.name.clone());
                }
            }

            tags.push((persona.name.clone(), persona_tags));
        }

        let mut alternatives: Vec<String> = label_targets.keys().cloned().collect();
        alternatives.extend(
            ALL_CALL_TOKENS
                .iter()
                .map(|token| token.trim_start_matches('@').to_string()),
        );
        alternatives.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        alternatives.dedup();

        let mention_pattern = if alternatives.is_empty() {
            None
        } else {
            let body = alternatives
                .iter()
                .map(|label| regex::escape(label))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&format!("@(?:{body})")) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    tracing::warn!("[Scanner] Mention pattern rejected, mentions disabled: {}", err);
                    None
                }
            }
        };

        Self {
            mention_pattern,
            label_targets,
            tags,
        }
    }

    /// True if `text` contains any all-call token.
    pub fn contains_all_call(text: &str) -> bool {
        ALL_CALL_TOKENS.iter().any(|token| text.contains(token))
    }

    /// Whole-token `@` mentions in `text`, without the leading `@`, in order
    /// of appearance.
    ///
    /// A mention counts only when it is not directly followed by an ASCII
    /// word character or `-`, so `@Ann` does not fire inside `@Anna`.
    pub fn mention_labels<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let Some(pattern) = &self.mention_pattern else {
            return Vec::new();
        };

        pattern
            .find_iter(text)
            .filter(|found| is_token_boundary(&text[found.end()..]))
            .map(|found| &found.as_str()[1..])
            .collect()
    }

    /// Names of personas addressed by an `@name` or `@tag` mention in `text`.
    pub fn mentioned_personas(&self, text: &str) -> BTreeSet<String> {
        self.mention_labels(text)
            .into_iter()
            .filter_map(|label| self.label_targets.get(label))
            .flatten()
            .cloned()
            .collect()
    }

    /// Names of personas with at least one tag occurring anywhere in `text`.
    pub fn tag_matches(&self, text: &str) -> BTreeSet<String> {
        self.tags
            .iter()
            .filter(|(_, tags)| tags.iter().any(|tag| text.contains(tag.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Wraps every whole-token mention (all-call included) in `open`/`close`.
    pub fn highlight(&self, text: &str, open: &str, close: &str) -> String {
        let Some(pattern) = &self.mention_pattern else {
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for found in pattern.find_iter(text) {
            if !is_token_boundary(&text[found.end()..]) {
                continue;
            }
            out.push_str(&text[cursor..found.start()]);
            out.push_str(open);
            out.push_str(found.as_str());
            out.push_str(close);
            cursor = found.end();
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Detects and strips a trailing quit marker.
    pub fn scan_quit_marker(text: &str) -> QuitScan {
        let trimmed = text.trim_end();
        match trimmed.strip_suffix(QUIT_GROUP_MARKER) {
            Some(rest) => QuitScan {
                text: rest.trim().to_string(),
                opted_out: true,
            },
            None => QuitScan {
                text: text.to_string(),
                opted_out: false,
            },
        }
    }
}

fn is_token_boundary(rest: &str) -> bool {
    match rest.chars().next() {
        None => true,
        Some(c) => !(c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    }
}
