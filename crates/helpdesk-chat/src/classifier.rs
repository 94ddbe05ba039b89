//! Detectors for "this customer wants a human agent".

use std::sync::Arc;

use async_trait::async_trait;

use crate::completion::CompletionService;
use crate::error::ClassificationError;

/// Decides whether a message asks for human support.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify_intent(&self, message: &str) -> Result<bool, ClassificationError>;
}

// ---------------------------------------------------------------------------
// LlmIntentClassifier
// ---------------------------------------------------------------------------

const CLASSIFIER_PROMPT: &str = "You decide whether a customer support message is asking to \
speak with a human agent or a real person instead of an automated assistant. \
Reply with exactly one word: yes or no.";

const CLASSIFIER_MAX_TOKENS: u32 = 3;

/// Asks a completion model a constrained yes/no question.
pub struct LlmIntentClassifier {
    completion: Arc<dyn CompletionService>,
}

impl LlmIntentClassifier {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify_intent(&self, message: &str) -> Result<bool, ClassificationError> {
        let reply = self
            .completion
            .complete(CLASSIFIER_PROMPT, message, CLASSIFIER_MAX_TOKENS, 0.0)
            .await?;
        parse_verdict(&reply)
    }
}

/// Read the first word of a classifier reply as yes/no.
fn parse_verdict(reply: &str) -> Result<bool, ClassificationError> {
    let first_word = reply
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())
        .map(str::to_lowercase);
    match first_word.as_deref() {
        Some("yes") => Ok(true),
        Some("no") => Ok(false),
        _ => Err(ClassificationError::Unparseable(reply.to_string())),
    }
}

// ---------------------------------------------------------------------------
// KeywordIntentClassifier
// ---------------------------------------------------------------------------

const HANDOFF_PHRASES: &[&str] = &[
    "talk to human",
    "speak to human",
    "connect to human",
    "human support",
    "real person",
    "human agent",
];

/// Matches a fixed list of handoff phrases. Needs no network.
#[derive(Debug, Clone, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn matches(message: &str) -> bool {
        let lowered = message.to_lowercase();
        HANDOFF_PHRASES.iter().any(|p| lowered.contains(p))
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify_intent(&self, message: &str) -> Result<bool, ClassificationError> {
        Ok(Self::matches(message))
    }
}
