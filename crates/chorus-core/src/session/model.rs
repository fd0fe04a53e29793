//! Session domain model.
//!
//! `ChatData` is the whole persisted chat store: every session keyed by id in
//! creation order, plus the active session pointer.

use super::message::ChatMessage;
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

const SESSION_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SESSION_ID_SUFFIX_LEN: usize = 5;

/// One conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Human-readable session name
    #[serde(default)]
    pub name: String,
    /// Ordered message history
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: Vec::new(),
        }
    }
}

/// The persisted chat store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatData {
    pub sessions: IndexMap<String, Session>,
    #[serde(default)]
    pub active_session_id: Option<String>,
}

impl ChatData {
    /// The id of the first session in creation order.
    pub fn first_session_id(&self) -> Option<&str> {
        self.sessions.keys().next().map(String::as_str)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Points the active id at an existing session.
    ///
    /// A missing or dangling id becomes the first session id, or `None`
    /// when there are no sessions. Returns true if the id changed.
    pub fn repair_active(&mut self) -> bool {
        let valid = self
            .active_session_id
            .as_deref()
            .is_some_and(|id| self.sessions.contains_key(id));
        if valid {
            return false;
        }

        let repaired = self.first_session_id().map(str::to_string);
        let changed = repaired != self.active_session_id;
        self.active_session_id = repaired;
        changed
    }

    /// Folds several payloads into one, later payloads winning on id conflicts.
    pub fn fold_sessions(payloads: impl IntoIterator<Item = ChatData>) -> ChatData {
        let mut combined = ChatData::default();
        for payload in payloads {
            combined.sessions.extend(payload.sessions);
        }
        combined
    }
}

/// Generates a session id of the form `session_<unix-millis>_<suffix>`.
pub fn generate_session_id<R: Rng>(now: DateTime<Local>, rng: &mut R) -> String {
    let suffix: String = (0..SESSION_ID_SUFFIX_LEN)
        .map(|_| SESSION_ID_ALPHABET[rng.gen_range(0..SESSION_ID_ALPHABET.len())] as char)
        .collect();
    format!("session_{}_{}", now.timestamp_millis(), suffix)
}

/// Default display name for a session created at `now`.
pub fn default_session_name(now: DateTime<Local>) -> String {
    format!("聊天 {}", now.format("%Y-%m-%d %H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn data_with(ids: &[&str], active: Option<&str>) -> ChatData {
        ChatData {
            sessions: ids
                .iter()
                .map(|id| (id.to_string(), Session::new(*id)))
                .collect(),
            active_session_id: active.map(str::to_string),
        }
    }

    #[test]
    fn test_repair_active_dangling_points_to_first() {
        let mut data = data_with(&["b", "a"], Some("zzz"));
        assert!(data.repair_active());
        assert_eq!(data.active_session_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_repair_active_empty_is_none() {
        let mut data = data_with(&[], Some("gone"));
        assert!(data.repair_active());
        assert_eq!(data.active_session_id, None);
        assert!(!data.repair_active());
    }

    #[test]
    fn test_wire_shape_uses_camel_case_active_id() {
        let data = data_with(&["s1"], Some("s1"));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["activeSessionId"], "s1");
        assert_eq!(json["sessions"]["s1"]["name"], "s1");
    }

    #[test]
    fn test_fold_sessions_later_wins() {
        let mut first = data_with(&["a", "b"], None);
        first.sessions.get_mut("b").unwrap().name = "old".into();
        let mut second = data_with(&["b", "c"], None);
        second.sessions.get_mut("b").unwrap().name = "new".into();

        let combined = ChatData::fold_sessions(vec![first, second]);
        let ids: Vec<_> = combined.sessions.keys().cloned().collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(combined.sessions["b"].name, "new");
    }

    #[test]
    fn test_generated_id_format() {
        let now = Local.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate_session_id(now, &mut rng);
        let suffix = id.strip_prefix("session_1700000000123_").unwrap();
        assert_eq!(suffix.len(), 5);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
