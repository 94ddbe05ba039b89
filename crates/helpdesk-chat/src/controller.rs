//! Dialog controller: the per-turn entry point.
//!
//! A turn runs the message through the support state machine first. Only
//! when the session is in normal mode and no handoff was requested does it
//! retrieve context and call the answering model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::types::{ChatMessage, Role};
use helpdesk_vector::embedding::DynEmbeddingService;
use helpdesk_vector::error::EmbeddingError;
use helpdesk_vector::index::EmbeddingIndex;
use tracing::{debug, error, info};

use crate::classifier::IntentClassifier;
use crate::completion::CompletionService;
use crate::error::{CompletionError, TurnFailure};
use crate::history::SessionHistory;
use crate::prompt::{apology, build_context, build_user_prompt, REFUSAL, SYSTEM_PROMPT};
use crate::support::{SupportOutcome, SupportState, SupportStateMachine};

/// Tunables for answering a question.
#[derive(Debug, Clone)]
pub struct DialogSettings {
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Output token cap for answers.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on each external call.
    pub call_timeout: Duration,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            top_k: 2,
            max_tokens: 250,
            temperature: 0.2,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl DialogSettings {
    pub fn from_config(config: &HelpdeskConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            call_timeout: Duration::from_secs(config.llm.request_timeout_secs.max(1)),
        }
    }
}

/// What a turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text shown to the customer. Always present, even on failure.
    pub reply: String,
    /// Support state after the turn.
    pub state: SupportState,
    /// Set when retrieval or the answering model failed.
    pub error: Option<TurnFailure>,
}

/// Coordinates retrieval, the answering model, history and the handoff flow.
///
/// Turns on the same session are serialized; turns on different sessions
/// run concurrently.
pub struct DialogController {
    index: Arc<EmbeddingIndex>,
    embedder: Arc<dyn DynEmbeddingService>,
    completion: Arc<dyn CompletionService>,
    classifier: Arc<dyn IntentClassifier>,
    history: SessionHistory,
    support: SupportStateMachine,
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    settings: DialogSettings,
}

impl DialogController {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        embedder: Arc<dyn DynEmbeddingService>,
        completion: Arc<dyn CompletionService>,
        classifier: Arc<dyn IntentClassifier>,
        history_max_length: usize,
        settings: DialogSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            completion,
            classifier,
            history: SessionHistory::new(history_max_length),
            support: SupportStateMachine::new(settings.call_timeout),
            turn_locks: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn settings(&self) -> &DialogSettings {
        &self.settings
    }

    fn turn_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.turn_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_locks()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Process one customer message and return only the reply text.
    pub async fn handle_turn(&self, session_id: &str, message: &str) -> String {
        self.process_turn(session_id, message).await.reply
    }

    /// Process one customer message.
    ///
    /// Never fails: retrieval and model errors are logged, folded into an
    /// apology reply and reported in [`TurnOutcome::error`].
    pub async fn process_turn(&self, session_id: &str, message: &str) -> TurnOutcome {
        let lock = self.turn_lock(session_id);
        let _turn = lock.lock().await;

        let message = message.trim();
        debug!(session_id = %session_id, chars = message.chars().count(), "Processing turn");

        let outcome = self
            .support
            .handle(session_id, message, self.classifier.as_ref())
            .await;
        if let SupportOutcome::Reply(reply) = outcome {
            self.history.append(session_id, Role::User, message);
            self.history.append(session_id, Role::Assistant, &reply);
            return TurnOutcome {
                reply,
                state: self.support.state(session_id),
                error: None,
            };
        }

        self.history.append(session_id, Role::User, message);
        let (reply, failure) = match self.answer(session_id, message).await {
            Ok(reply) => {
                self.history.append(session_id, Role::Assistant, &reply);
                (reply, None)
            }
            Err(failure) => {
                error!(session_id = %session_id, error = %failure, "Turn failed");
                (apology(&failure), Some(failure))
            }
        };

        TurnOutcome {
            reply,
            state: self.support.state(session_id),
            error: failure,
        }
    }

    /// Retrieve context and ask the answering model.
    async fn answer(&self, session_id: &str, query: &str) -> Result<String, TurnFailure> {
        let chat_history = self.history.format_for_prompt(session_id);
        let timeout = self.settings.call_timeout;

        let results = tokio::time::timeout(
            timeout,
            self.index
                .query(query, self.settings.top_k, self.embedder.as_ref()),
        )
        .await
        .map_err(|_| EmbeddingError::Timeout(timeout.as_secs()))??;

        let context = build_context(&results);
        if context.trim().is_empty() {
            info!(session_id = %session_id, "No context retrieved, refusing");
            return Ok(REFUSAL.to_string());
        }
        debug!(session_id = %session_id, chunks = results.len(), "Context retrieved");

        let user_prompt = build_user_prompt(&context, &chat_history, query);
        let reply = tokio::time::timeout(
            timeout,
            self.completion.complete(
                SYSTEM_PROMPT,
                &user_prompt,
                self.settings.max_tokens,
                self.settings.temperature,
            ),
        )
        .await
        .map_err(|_| CompletionError::Timeout(timeout.as_secs()))??;

        Ok(reply)
    }

    // =========================================================================
    // Session administration
    // =========================================================================

    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.history.get(session_id)
    }

    pub fn support_state(&self, session_id: &str) -> SupportState {
        self.support.state(session_id)
    }

    /// Sessions with at least one message.
    pub fn active_sessions(&self) -> usize {
        self.history.session_ids().len()
    }

    /// Forget a session's history and return it to normal mode. Waits for any
    /// in-flight turn on that session.
    pub async fn clear_session(&self, session_id: &str) {
        {
            let lock = self.turn_lock(session_id);
            let _turn = lock.lock().await;
            self.history.clear(session_id);
            self.support.reset(session_id);
        }
        self.release_turn_lock(session_id);
        info!(session_id = %session_id, "Session cleared");
    }

    /// Drop a session's turn lock unless a turn holds or awaits it.
    fn release_turn_lock(&self, session_id: &str) {
        let mut locks = self.turn_locks();
        if locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
        }
    }

    /// Drop every session idle for longer than `ttl`. Returns how many were
    /// removed.
    pub fn prune_idle(&self, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.prune_idle_before(cutoff)
    }

    /// Drop every session whose newest message is older than `cutoff`.
    ///
    /// Sessions with a turn in flight or waiting are skipped. The lock map is
    /// held for the whole sweep, so no turn can start on a session while it
    /// is being removed.
    pub fn prune_idle_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut locks = self.turn_locks();
        let removed = self.history.remove_idle(cutoff, |session_id| {
            locks
                .get(session_id)
                .is_some_and(|lock| Arc::strong_count(lock) > 1)
        });
        for session_id in &removed {
            self.support.remove(session_id);
            locks.remove(session_id);
        }

        // Locks left behind by sessions that no longer hold any history.
        locks.retain(|session_id, lock| {
            Arc::strong_count(lock) > 1 || self.history.len(session_id) > 0
        });

        if !removed.is_empty() {
            info!(sessions = removed.len(), "Pruned idle sessions");
        }
        removed.len()
    }
}
