//! Turn orchestrator.
//!
//! One trigger (a user message or an invitation) produces one round: the
//! speakers are selected, the single-round exclusions are consumed, and each
//! speaker is awaited in order. Every reply is committed to the session
//! before the next speaker's prompt is assembled.

use chorus_core::config::GroupChatConfig;
use chorus_core::eligibility::{EligibilityTracker, MuteListRepository};
use chorus_core::persona::PersonaRegistry;
use chorus_core::render::ChatRenderer;
use chorus_core::responder::{PersonaReply, PersonaResponder};
use chorus_core::selection::{
    ChatMode, RoundTextScanner, SelectedSpeaker, SelectionInput, SelectionRng, SpeakerSelector,
};
use chorus_core::session::{
    ChatData, ChatMessage, MessageContent, SessionRepository, SessionStore,
};
use chorus_core::{ChorusError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Tracing target of round lifecycle events.
pub const ROUND_EVENT_TARGET: &str = "chorus::round";

/// One persona invocation of a round.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    pub speaker: SelectedSpeaker,
    pub reply: PersonaReply,
}

/// Result of one trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutcome {
    /// Session the round was committed to
    pub session_id: Option<String>,
    /// Completed turns in invocation order
    pub turns: Vec<CompletedTurn>,
    /// Replies kept in memory whose save failed; the next save retries them
    pub save_failures: usize,
}

impl RoundOutcome {
    fn empty(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            turns: Vec::new(),
            save_failures: 0,
        }
    }

    pub fn speaker_names(&self) -> Vec<&str> {
        self.turns
            .iter()
            .map(|turn| turn.speaker.persona.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Listing entry for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub is_active: bool,
}

/// How imported chat data is applied to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Overwrite the whole store.
    Replace,
    /// Union by session id, imported sessions winning.
    Merge,
}

/// Marks a round (or a session mutation) as in progress until dropped.
struct RoundGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RoundGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChorusError::busy("a round is already in progress"))?;
        Ok(Self { flag })
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives rounds for one group chat.
///
/// `TurnOrchestrator` owns the state that decides who speaks:
/// - the persona registry and the speaker selector built from it
/// - the eligibility tracker (persistent mute list loaded at open)
/// - the session store and the active session
/// - the pending all-call flag and the in-progress guard
///
/// Rounds never overlap. A trigger arriving while a round runs fails with
/// [`ChorusError::Busy`].
pub struct TurnOrchestrator {
    registry: PersonaRegistry,
    selector: SpeakerSelector,
    mode: ChatMode,
    user_name: String,
    store: Mutex<SessionStore>,
    eligibility: Mutex<EligibilityTracker>,
    rng: Mutex<Box<dyn SelectionRng + Send>>,
    pending_all_call: AtomicBool,
    responding: AtomicBool,
    mute_repository: Arc<dyn MuteListRepository>,
    responder: Arc<dyn PersonaResponder>,
    renderer: Arc<dyn ChatRenderer>,
}

impl TurnOrchestrator {
    /// Builds the registry from `config`, opens the session store and loads
    /// the persistent mute list.
    pub async fn open(
        config: &GroupChatConfig,
        session_repository: Arc<dyn SessionRepository>,
        mute_repository: Arc<dyn MuteListRepository>,
        responder: Arc<dyn PersonaResponder>,
        renderer: Arc<dyn ChatRenderer>,
    ) -> Result<Self> {
        let registry = config.registry()?;
        let store = SessionStore::open(session_repository).await?;
        let muted = mute_repository.load().await?;

        tracing::info!(
            "[Orchestrator] Opened with {} active personas, mode {}, {} muted",
            registry.active().len(),
            config.chat.mode,
            muted.len()
        );

        Ok(Self {
            selector: SpeakerSelector::new(registry.active()),
            registry,
            mode: config.chat.mode,
            user_name: config.chat.user_name.clone(),
            store: Mutex::new(store),
            eligibility: Mutex::new(EligibilityTracker::with_muted(muted)),
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
            pending_all_call: AtomicBool::new(false),
            responding: AtomicBool::new(false),
            mute_repository,
            responder,
            renderer,
        })
    }

    /// Replaces the random source used for selection.
    pub fn with_rng(mut self, rng: impl SelectionRng + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Scanner for mention highlighting, shared with selection.
    pub fn scanner(&self) -> &RoundTextScanner {
        self.selector.scanner()
    }

    pub fn is_responding(&self) -> bool {
        self.responding.load(Ordering::Acquire)
    }

    /// Commits a user message to the active session and, unless the mode is
    /// button-invite, runs the round it triggers.
    ///
    /// Empty content is ignored.
    pub async fn send_user_message(&self, content: MessageContent) -> Result<RoundOutcome> {
        if content.is_empty() {
            tracing::debug!("[Orchestrator] Ignoring empty user message");
            return Ok(RoundOutcome::default());
        }
        let _guard = RoundGuard::acquire(&self.responding)?;

        let session_id = {
            let mut store = self.store.lock().await;
            let session_id = active_session(&mut store).await?;
            store
                .append_message(
                    &session_id,
                    ChatMessage::user(&self.user_name, content.clone()),
                )
                .await?;
            session_id
        };
        self.renderer
            .append_message(&self.user_name, &content, true, false);

        if !self.mode.runs_automatic_rounds() {
            return Ok(RoundOutcome::empty(&session_id));
        }

        if content
            .non_empty_text()
            .is_some_and(RoundTextScanner::contains_all_call)
        {
            tracing::info!("[Orchestrator] All-call detected");
            self.pending_all_call.store(true, Ordering::Release);
        }

        self.run_round(&session_id).await
    }

    /// Asks one active persona to speak.
    ///
    /// Mute and next-round exclusion still apply, so the outcome may be
    /// empty. The invitation counts as a round and consumes the single-round
    /// exclusions.
    pub async fn invite(&self, name: &str) -> Result<RoundOutcome> {
        self.ensure_active(name)?;
        let _guard = RoundGuard::acquire(&self.responding)?;

        let session_id = {
            let mut store = self.store.lock().await;
            active_session(&mut store).await?
        };

        let speakers = {
            let mut eligibility = self.eligibility.lock().await;
            let speakers = self
                .selector
                .select_invited(name, self.registry.active(), &eligibility);
            let consumed = eligibility.consume_round_exclusions();
            tracing::debug!("[Orchestrator] Cleared single-round sets: {:?}", consumed);
            speakers
        };
        if speakers.is_empty() {
            tracing::info!("[Orchestrator] {} is muted or excluded, invitation skipped", name);
        }

        self.invoke_speakers(&session_id, "invite", speakers).await
    }

    /// Toggles the persistent mute of an active persona and saves the list.
    ///
    /// Returns whether the persona is muted afterwards.
    pub async fn toggle_mute(&self, name: &str) -> Result<bool> {
        self.ensure_active(name)?;

        let (muted, names) = {
            let mut eligibility = self.eligibility.lock().await;
            let muted = eligibility.toggle_mute(name);
            (muted, eligibility.muted_names())
        };
        self.mute_repository.save(&names).await?;

        tracing::info!(
            "[Orchestrator] {} {}",
            name,
            if muted { "muted" } else { "unmuted" }
        );
        Ok(muted)
    }

    /// Toggles the next-round exclusion of an active persona.
    ///
    /// Returns whether the persona is excluded afterwards.
    pub async fn toggle_exclude(&self, name: &str) -> Result<bool> {
        self.ensure_active(name)?;
        let excluded = self.eligibility.lock().await.toggle_exclude(name);
        tracing::info!(
            "[Orchestrator] {} {} for the next round",
            name,
            if excluded { "excluded" } else { "included" }
        );
        Ok(excluded)
    }

    /// Snapshot of the eligibility state.
    pub async fn eligibility(&self) -> EligibilityTracker {
        self.eligibility.lock().await.clone()
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.store.lock().await.active_session_id().map(str::to_string)
    }

    /// History of the active session.
    pub async fn active_history(&self) -> Vec<ChatMessage> {
        let store = self.store.lock().await;
        store
            .active_session_id()
            .and_then(|id| store.history(id))
            .map(<[ChatMessage]>::to_vec)
            .unwrap_or_default()
    }

    /// All sessions in creation order.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let store = self.store.lock().await;
        let active = store.active_session_id();
        store
            .sessions()
            .map(|(id, session)| SessionSummary {
                id: id.to_string(),
                name: session.name.clone(),
                message_count: session.history.len(),
                is_active: active == Some(id),
            })
            .collect()
    }

    pub async fn create_session(&self, switch_to: bool) -> Result<String> {
        let _guard = RoundGuard::acquire(&self.responding)?;
        self.store.lock().await.create_session(switch_to).await
    }

    /// Switches the active session; unknown ids fall back to the first session.
    pub async fn switch_session(&self, session_id: &str) -> Result<String> {
        let _guard = RoundGuard::acquire(&self.responding)?;
        self.store.lock().await.switch_session(session_id).await
    }

    /// Deletes a session and returns the active id afterwards. Deleting the
    /// last session leaves a fresh empty one.
    pub async fn delete_session(&self, session_id: &str) -> Result<String> {
        let _guard = RoundGuard::acquire(&self.responding)?;
        let mut store = self.store.lock().await;
        match store.delete_session(session_id).await? {
            Some(active) => Ok(active),
            None => store.ensure_session().await,
        }
    }

    pub async fn export_current(&self) -> Option<ChatData> {
        self.store.lock().await.export_current()
    }

    pub async fn export_all(&self) -> ChatData {
        self.store.lock().await.export_all()
    }

    /// Applies imported payloads in order.
    ///
    /// Later payloads win on id conflicts. A replace keeps the active id of
    /// the last payload that names an imported session.
    pub async fn import(&self, mode: ImportMode, payloads: Vec<ChatData>) -> Result<()> {
        let _guard = RoundGuard::acquire(&self.responding)?;

        let imported_active: Vec<String> = payloads
            .iter()
            .filter_map(|payload| payload.active_session_id.clone())
            .collect();
        let mut combined = ChatData::fold_sessions(payloads);
        tracing::info!(
            "[Orchestrator] Importing {} sessions ({:?})",
            combined.sessions.len(),
            mode
        );

        let mut store = self.store.lock().await;
        match mode {
            ImportMode::Replace => {
                combined.active_session_id = imported_active
                    .into_iter()
                    .rev()
                    .find(|id| combined.contains(id));
                store.replace_all(combined).await?;
            }
            ImportMode::Merge => store.merge_sessions(combined).await?,
        }
        store.ensure_session().await?;
        Ok(())
    }

    fn ensure_active(&self, name: &str) -> Result<()> {
        match self.registry.find_active(name) {
            Some(_) => Ok(()),
            None => Err(ChorusError::not_found("persona", name)),
        }
    }

    async fn run_round(&self, session_id: &str) -> Result<RoundOutcome> {
        let all_call = self.pending_all_call.swap(false, Ordering::AcqRel);

        let speakers = {
            let store = self.store.lock().await;
            let history = store
                .history(session_id)
                .ok_or_else(|| ChorusError::not_found("session", session_id))?;
            let mut eligibility = self.eligibility.lock().await;
            let mut rng = self.rng.lock().await;

            let input = SelectionInput {
                mode: self.mode,
                personas: self.registry.active(),
                history,
                eligibility: &eligibility,
                all_call,
                active_limit: self.registry.active_limit(),
            };
            let speakers = self.selector.select(&input, &mut **rng);
            let consumed = eligibility.consume_round_exclusions();
            tracing::debug!("[Orchestrator] Cleared single-round sets: {:?}", consumed);
            speakers
        };

        let trigger = if all_call { "all_call" } else { "message" };
        self.invoke_speakers(session_id, trigger, speakers).await
    }

    async fn invoke_speakers(
        &self,
        session_id: &str,
        trigger: &'static str,
        speakers: Vec<SelectedSpeaker>,
    ) -> Result<RoundOutcome> {
        if speakers.is_empty() {
            tracing::info!(
                target: ROUND_EVENT_TARGET,
                event = "round_empty",
                session = session_id,
                trigger,
                "[Orchestrator] No eligible speakers this round"
            );
            return Ok(RoundOutcome::empty(session_id));
        }

        let names = speakers
            .iter()
            .map(|speaker| speaker.persona.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(
            target: ROUND_EVENT_TARGET,
            event = "round_started",
            session = session_id,
            trigger,
            speakers = %names,
            "[Orchestrator] Round started: {}",
            names
        );

        let mut turns = Vec::with_capacity(speakers.len());
        let mut save_failures = 0;
        for speaker in speakers {
            let history = {
                let store = self.store.lock().await;
                store
                    .history(session_id)
                    .map(<[ChatMessage]>::to_vec)
                    .ok_or_else(|| ChorusError::not_found("session", session_id))?
            };

            tracing::info!(
                target: ROUND_EVENT_TARGET,
                event = "speaker_started",
                session = session_id,
                persona = %speaker.persona.name,
                reason = ?speaker.reason,
                "[Orchestrator] {} is responding",
                speaker.persona.name
            );
            let reply = self
                .responder
                .respond(&speaker.persona, &history, self.renderer.as_ref())
                .await;

            let saved = self
                .store
                .lock()
                .await
                .append_message(session_id, reply.message.clone())
                .await;
            if let Err(e) = saved {
                save_failures += 1;
                tracing::error!(
                    target: ROUND_EVENT_TARGET,
                    event = "save_failed",
                    session = session_id,
                    persona = %speaker.persona.name,
                    error = %e,
                    "[Orchestrator] Failed to save reply from {}: {}",
                    speaker.persona.name,
                    e
                );
            }
            if reply.opted_out {
                self.eligibility
                    .lock()
                    .await
                    .mark_opted_out(speaker.persona.name.clone());
            }

            tracing::info!(
                target: ROUND_EVENT_TARGET,
                event = "speaker_finished",
                session = session_id,
                persona = %speaker.persona.name,
                is_error = reply.is_error,
                opted_out = reply.opted_out,
                "[Orchestrator] {} finished",
                speaker.persona.name
            );
            turns.push(CompletedTurn { speaker, reply });
        }

        tracing::info!(
            target: ROUND_EVENT_TARGET,
            event = "round_finished",
            session = session_id,
            replies = turns.len(),
            save_failures,
            "[Orchestrator] Round finished with {} replies",
            turns.len()
        );
        Ok(RoundOutcome {
            session_id: Some(session_id.to_string()),
            turns,
            save_failures,
        })
    }
}

/// The active session id, creating a session when the store is empty.
async fn active_session(store: &mut SessionStore) -> Result<String> {
    match store.active_session_id() {
        Some(id) => Ok(id.to_string()),
        None => store.ensure_session().await,
    }
}
