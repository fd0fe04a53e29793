//! Session store.
//!
//! Owns the in-memory chat store and writes it through to a
//! [`SessionRepository`] after every mutation.

use super::message::ChatMessage;
use super::model::{ChatData, Session, default_session_name, generate_session_id};
use super::repository::SessionRepository;
use crate::error::{ChorusError, Result};
use chrono::Local;
use std::sync::Arc;

/// Manages the session collection and the active session pointer.
///
/// `SessionStore` is responsible for:
/// - Loading and repairing persisted chat data
/// - Creating, switching and deleting sessions
/// - Appending messages to a session history
/// - Wholesale replace and merge imports, and exports
///
/// Invariant: whenever at least one session exists, the active id names one
/// of them.
pub struct SessionStore {
    data: ChatData,
    repository: Arc<dyn SessionRepository>,
}

impl SessionStore {
    /// Creates an empty store backed by `repository`. Nothing is loaded yet.
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            data: ChatData::default(),
            repository,
        }
    }

    /// Loads the store and makes sure a usable active session exists.
    pub async fn open(repository: Arc<dyn SessionRepository>) -> Result<Self> {
        let mut store = Self::new(repository);
        store.load().await?;
        store.ensure_session().await?;
        Ok(store)
    }

    /// Reloads the chat data from the repository.
    ///
    /// A dangling active id is corrected to the first session (or `None`)
    /// in memory.
    pub async fn load(&mut self) -> Result<&ChatData> {
        let mut data = self.repository.load().await?;
        if data.repair_active() {
            tracing::info!(
                "[SessionStore] Active session corrected to {:?}",
                data.active_session_id
            );
        }
        self.data = data;
        Ok(&self.data)
    }

    /// Creates a first session when the store is empty, otherwise persists
    /// any active-id correction made during load.
    pub async fn ensure_session(&mut self) -> Result<String> {
        if self.data.sessions.is_empty() {
            tracing::info!("[SessionStore] No sessions found, creating initial session");
            return self.create_session(true).await;
        }

        self.data.repair_active();
        self.persist().await?;
        self.data
            .active_session_id
            .clone()
            .ok_or_else(|| ChorusError::internal("active session missing after repair"))
    }

    /// Creates a new empty session and returns its id.
    ///
    /// With `switch_to` the new session becomes active. Without it, the
    /// active pointer is only set if there was no valid one.
    pub async fn create_session(&mut self, switch_to: bool) -> Result<String> {
        let now = Local::now();
        let session_id = {
            let mut rng = rand::thread_rng();
            let mut candidate = generate_session_id(now, &mut rng);
            while self.data.contains(&candidate) {
                candidate = generate_session_id(now, &mut rng);
            }
            candidate
        };

        let name = default_session_name(now);
        tracing::info!("[SessionStore] Creating session {} ({})", name, session_id);
        self.data
            .sessions
            .insert(session_id.clone(), Session::new(name));

        if switch_to {
            self.data.active_session_id = Some(session_id.clone());
        } else {
            self.data.repair_active();
        }

        self.persist().await?;
        Ok(session_id)
    }

    /// Makes `session_id` active and returns the id that actually became active.
    ///
    /// An unknown id falls back to the first session; with no sessions at
    /// all a fresh one is created and activated.
    pub async fn switch_session(&mut self, session_id: &str) -> Result<String> {
        let target = if self.data.contains(session_id) {
            session_id.to_string()
        } else if let Some(first) = self.data.first_session_id() {
            tracing::warn!(
                "[SessionStore] Unknown session '{}', switching to first session '{}'",
                session_id,
                first
            );
            first.to_string()
        } else {
            tracing::warn!(
                "[SessionStore] Unknown session '{}' and no sessions exist, creating one",
                session_id
            );
            return self.create_session(true).await;
        };

        self.data.active_session_id = Some(target.clone());
        self.persist().await?;
        Ok(target)
    }

    /// Appends a message and persists before returning.
    ///
    /// Returns the ordinal position of the new message.
    pub async fn append_message(&mut self, session_id: &str, message: ChatMessage) -> Result<usize> {
        let session = self
            .data
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ChorusError::not_found("session", session_id))?;
        session.history.push(message);
        let ordinal = session.history.len() - 1;

        self.persist().await?;
        Ok(ordinal)
    }

    /// Deletes a session and returns the active id afterwards.
    ///
    /// Deleting the active session moves the pointer to the first remaining
    /// session, or clears it.
    pub async fn delete_session(&mut self, session_id: &str) -> Result<Option<String>> {
        if self.data.sessions.shift_remove(session_id).is_none() {
            return Err(ChorusError::not_found("session", session_id));
        }

        if self.data.active_session_id.as_deref() == Some(session_id) {
            self.data.active_session_id = None;
        }
        self.data.repair_active();
        tracing::info!(
            "[SessionStore] Deleted session {}, active is now {:?}",
            session_id,
            self.data.active_session_id
        );

        self.persist().await?;
        Ok(self.data.active_session_id.clone())
    }

    /// Overwrites the whole store with imported data.
    pub async fn replace_all(&mut self, mut data: ChatData) -> Result<()> {
        data.repair_active();
        tracing::info!(
            "[SessionStore] Replacing store with {} imported sessions",
            data.sessions.len()
        );
        self.data = data;
        self.persist().await
    }

    /// Merges imported sessions into the store.
    ///
    /// Incoming sessions overwrite existing ones with the same id, others
    /// are appended. The current active id is kept while it stays valid.
    pub async fn merge_sessions(&mut self, data: ChatData) -> Result<()> {
        let incoming = data.sessions.len();
        self.data.sessions.extend(data.sessions);
        self.data.repair_active();
        tracing::info!(
            "[SessionStore] Merged {} imported sessions, store now holds {}",
            incoming,
            self.data.sessions.len()
        );
        self.persist().await
    }

    /// Exports only the active session, marked as active.
    pub fn export_current(&self) -> Option<ChatData> {
        let session_id = self.data.active_session_id.as_ref()?;
        let session = self.data.sessions.get(session_id)?;

        let mut export = ChatData::default();
        export
            .sessions
            .insert(session_id.clone(), session.clone());
        export.active_session_id = Some(session_id.clone());
        Some(export)
    }

    /// Exports the whole store.
    pub fn export_all(&self) -> ChatData {
        self.data.clone()
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.data.active_session_id.as_deref()
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.data.sessions.get(session_id)
    }

    /// The ordered history of a session.
    pub fn history(&self, session_id: &str) -> Option<&[ChatMessage]> {
        self.session(session_id).map(|s| s.history.as_slice())
    }

    /// All sessions in creation order.
    pub fn sessions(&self) -> impl Iterator<Item = (&str, &Session)> {
        self.data.sessions.iter().map(|(id, s)| (id.as_str(), s))
    }

    async fn persist(&self) -> Result<()> {
        self.repository.save(&self.data).await
    }
}
