use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HelpdeskError, Result};

/// Top-level configuration for the helpdesk service.
///
/// Loaded from `~/.helpdesk/config.toml` by default. Every section falls back
/// to its defaults, so a partial (or empty) file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

impl HelpdeskConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HelpdeskConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Reject values that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        if self.llm.request_timeout_secs == 0 {
            return Err(HelpdeskError::Config(
                "llm.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HelpdeskError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Extra CORS origins allowed in addition to the server's own address.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            allowed_origins: Vec::new(),
        }
    }
}

/// Knowledge corpus and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Markdown file holding the knowledge corpus.
    pub corpus_path: String,
    /// Number of chunks placed into the prompt context.
    pub top_k: usize,
    /// Embedding model name sent to the provider.
    pub embedding_model: String,
    /// Optional output dimensionality requested from the provider.
    pub embedding_dimensions: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_path: "knowledge/faq.md".to_string(),
            top_k: 2,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: None,
        }
    }
}

/// Model provider settings shared by the embedding and completion clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Model used to answer questions.
    pub model: String,
    /// Model used for the human-handoff intent check.
    pub classifier_model: String,
    /// Output token cap for answers.
    pub max_tokens: u32,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Upper bound on any single provider call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4".to_string(),
            classifier_model: "gpt-4o-mini".to_string(),
            max_tokens: 250,
            temperature: 0.2,
            request_timeout_secs: 30,
        }
    }
}

/// Which detector decides that a customer wants a human agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Ask the completion model a constrained yes/no question.
    #[default]
    Llm,
    /// Match a fixed list of handoff phrases. Works offline.
    Keywords,
}

/// Dialog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages kept per session (oldest evicted first).
    pub history_max_length: usize,
    /// Longest accepted inbound message, in characters.
    pub max_message_chars: usize,
    /// Human-handoff detector.
    pub classifier: ClassifierKind,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_max_length: 10,
            max_message_chars: 2000,
            classifier: ClassifierKind::Llm,
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle minutes before a session is dropped. `0` keeps sessions forever.
    pub idle_timeout_minutes: u32,
    /// Seconds between idle-session sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 0,
            sweep_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = HelpdeskConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.retrieval.corpus_path, "knowledge/faq.md");
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.retrieval.embedding_model, "text-embedding-3-small");
        assert!(config.retrieval.embedding_dimensions.is_none());
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.max_tokens, 250);
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.chat.history_max_length, 10);
        assert_eq!(config.chat.max_message_chars, 2000);
        assert_eq!(config.chat.classifier, ClassifierKind::Llm);
        assert_eq!(config.sessions.idle_timeout_minutes, 0);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080
allowed_origins = ["https://support.example.com"]

[retrieval]
corpus_path = "/srv/faq.md"
top_k = 3
embedding_dimensions = 512

[llm]
base_url = "http://localhost:11434/v1"
model = "llama3"
max_tokens = 400
temperature = 0.0
request_timeout_secs = 10

[chat]
history_max_length = 6
classifier = "keywords"

[sessions]
idle_timeout_minutes = 30
sweep_interval_secs = 15
"#;
        let file = create_temp_config(content);
        let config = HelpdeskConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.server.allowed_origins,
            vec!["https://support.example.com"]
        );
        assert_eq!(config.retrieval.corpus_path, "/srv/faq.md");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.embedding_dimensions, Some(512));
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.max_tokens, 400);
        assert_eq!(config.llm.request_timeout_secs, 10);
        assert_eq!(config.chat.history_max_length, 6);
        assert_eq!(config.chat.classifier, ClassifierKind::Keywords);
        assert_eq!(config.sessions.idle_timeout_minutes, 30);
        assert_eq!(config.sessions.sweep_interval_secs, 15);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[llm]
model = "gpt-4o"
"#;
        let file = create_temp_config(content);
        let config = HelpdeskConfig::load(file.path()).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_tokens, 250);
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.chat.history_max_length, 10);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = HelpdeskConfig::load(file.path()).unwrap();
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = HelpdeskConfig::load(file.path());
        assert!(matches!(result, Err(HelpdeskError::Config(_))));
    }

    #[test]
    fn test_load_unknown_classifier_is_error() {
        let file = create_temp_config("[chat]\nclassifier = \"telepathy\"\n");
        assert!(HelpdeskConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_zero_request_timeout() {
        let file = create_temp_config("[llm]\nrequest_timeout_secs = 0\n");
        let result = HelpdeskConfig::load(file.path());
        assert!(matches!(result, Err(HelpdeskError::Config(_))));
        assert!(HelpdeskConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = HelpdeskConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.retrieval.corpus_path, "knowledge/faq.md");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = HelpdeskConfig::default();
        config.server.port = 9000;
        config.chat.classifier = ClassifierKind::Keywords;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = HelpdeskConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 9000);
        assert_eq!(reloaded.chat.classifier, ClassifierKind::Keywords);
        assert_eq!(reloaded.llm.model, config.llm.model);
    }
}
