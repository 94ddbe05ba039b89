//! Helpdesk chat crate - the retrieval-augmented dialog controller.
//!
//! Provides:
//! - **SessionHistory**: bounded per-session message logs rendered into prompts
//! - **SupportStateMachine**: the human-handoff flow (normal, awaiting email, escalated)
//! - **IntentClassifier**: LLM-backed and keyword detectors for handoff requests
//! - **CompletionService**: the chat-completion capability and its OpenAI client
//! - **DialogController**: the per-turn entry point tying everything together

pub mod classifier;
pub mod completion;
pub mod controller;
pub mod error;
pub mod history;
pub mod prompt;
pub mod support;

pub use classifier::{IntentClassifier, KeywordIntentClassifier, LlmIntentClassifier};
pub use completion::{CompletionService, OpenAiCompletion};
pub use controller::{DialogController, DialogSettings, TurnOutcome};
pub use error::{ClassificationError, CompletionError, TurnFailure};
pub use history::SessionHistory;
pub use support::{validate_email, SupportOutcome, SupportState, SupportStateMachine};
