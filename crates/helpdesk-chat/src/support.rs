//! Human-handoff state machine.
//!
//! Each session is in one of three states:
//! Normal -> AwaitingEmail -> Escalated -> Normal
//! AwaitingEmail -> Normal (customer types "leave")
//!
//! While a session is not `Normal`, every message is answered here with a
//! fixed reply and never reaches retrieval or the answering model.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::IntentClassifier;
use crate::error::ClassificationError;

pub const ASK_EMAIL: &str =
    "Please provide your email address so we can connect you with a human agent:";
pub const EMAIL_RECORDED: &str = "Thank you. Your email has been recorded and a human agent will contact you soon. Type 'stop' to resume normal chat mode.";
pub const INVALID_EMAIL: &str = "Please provide a valid email address to continue:";
pub const LEFT_HANDOFF: &str = "Continuing with AI assistance.";
pub const RESUMED: &str = "Resuming normal chat mode.";
pub const WAITING: &str = "Waiting for human support. Type 'stop' to resume normal chat.";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("Invalid email regex")
});

/// Whether `candidate` (after trimming) looks like an email address.
pub fn validate_email(candidate: &str) -> bool {
    EMAIL_RE.is_match(candidate.trim())
}

// =============================================================================
// Types
// =============================================================================

/// Where a session stands in the handoff flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SupportState {
    #[default]
    Normal,
    AwaitingEmail,
    Escalated { email: String },
}

impl SupportState {
    pub fn name(&self) -> &'static str {
        match self {
            SupportState::Normal => "normal",
            SupportState::AwaitingEmail => "awaiting_email",
            SupportState::Escalated { .. } => "escalated",
        }
    }

    /// Recorded email, present only while escalated.
    pub fn email(&self) -> Option<&str> {
        match self {
            SupportState::Escalated { email } => Some(email),
            _ => None,
        }
    }
}

impl std::fmt::Display for SupportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of running a message through the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupportOutcome {
    /// Answer with this text; skip retrieval and the answering model.
    Reply(String),
    /// Session is in normal mode and the message is a question.
    Proceed,
}

// =============================================================================
// State machine
// =============================================================================

/// Per-session support states. Sessions without an entry are `Normal`.
pub struct SupportStateMachine {
    states: Mutex<HashMap<String, SupportState>>,
    classify_timeout: Duration,
}

impl SupportStateMachine {
    pub fn new(classify_timeout: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            classify_timeout,
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, SupportState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self, session_id: &str) -> SupportState {
        self.states().get(session_id).cloned().unwrap_or_default()
    }

    /// Force a session back to `Normal`.
    pub fn reset(&self, session_id: &str) {
        self.states().remove(session_id);
    }

    pub fn remove(&self, session_id: &str) {
        self.reset(session_id);
    }

    fn set(&self, session_id: &str, state: SupportState) {
        let mut states = self.states();
        if state == SupportState::Normal {
            states.remove(session_id);
        } else {
            states.insert(session_id.to_string(), state);
        }
    }

    /// Advance the session's state for one (already trimmed) message.
    ///
    /// The classifier is only consulted in `Normal`. Its failures count as
    /// "no handoff requested".
    pub async fn handle(
        &self,
        session_id: &str,
        message: &str,
        classifier: &dyn IntentClassifier,
    ) -> SupportOutcome {
        let current = self.state(session_id);
        let from = current.name();
        let (next, reply) = match current {
            SupportState::Escalated { .. } => {
                if message.trim().eq_ignore_ascii_case("stop") {
                    (SupportState::Normal, RESUMED)
                } else {
                    return SupportOutcome::Reply(WAITING.to_string());
                }
            }
            SupportState::AwaitingEmail => {
                let lowered = message.trim().to_lowercase();
                if lowered == "leave" {
                    (SupportState::Normal, LEFT_HANDOFF)
                } else if validate_email(&lowered) {
                    (SupportState::Escalated { email: lowered }, EMAIL_RECORDED)
                } else {
                    return SupportOutcome::Reply(INVALID_EMAIL.to_string());
                }
            }
            SupportState::Normal => {
                if !self.wants_human(session_id, message, classifier).await {
                    return SupportOutcome::Proceed;
                }
                (SupportState::AwaitingEmail, ASK_EMAIL)
            }
        };

        info!(session_id = %session_id, from, to = next.name(), "Support state changed");
        self.set(session_id, next);
        SupportOutcome::Reply(reply.to_string())
    }

    async fn wants_human(
        &self,
        session_id: &str,
        message: &str,
        classifier: &dyn IntentClassifier,
    ) -> bool {
        if message.is_empty() {
            return false;
        }
        let verdict = match tokio::time::timeout(
            self.classify_timeout,
            classifier.classify_intent(message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ClassificationError::Timeout(self.classify_timeout.as_secs())),
        };
        match verdict {
            Ok(wants) => {
                debug!(session_id = %session_id, wants_human = wants, "Intent classified");
                wants
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Intent classification failed, continuing with AI answer");
                false
            }
        }
    }
}
