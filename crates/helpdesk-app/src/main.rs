//! Helpdesk application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI / env overrides
//! 2. Build the provider clients (embeddings, completion, intent classifier)
//! 3. Split and embed the knowledge corpus (must finish before serving)
//! 4. Run the HTTP API or the terminal chat loop

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use helpdesk_api::routes;
use helpdesk_api::state::AppState;
use helpdesk_chat::{
    CompletionService, DialogController, DialogSettings, IntentClassifier,
    KeywordIntentClassifier, LlmIntentClassifier, OpenAiCompletion,
};
use helpdesk_core::config::{ClassifierKind, HelpdeskConfig};
use helpdesk_core::error::HelpdeskError;
use helpdesk_vector::embedding::DynEmbeddingService;
use helpdesk_vector::error::EmbeddingError;
use helpdesk_vector::{load_corpus, EmbeddingIndex, OpenAiEmbedder};

use cli::{CliArgs, Command};

/// Upper bound on embedding the whole corpus at startup.
const STARTUP_EMBED_TIMEOUT: Duration = Duration::from_secs(120);

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn read_api_key(config: &HelpdeskConfig) -> Result<String, HelpdeskError> {
    match std::env::var(&config.llm.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(HelpdeskError::Config(format!(
            "environment variable {} is not set",
            config.llm.api_key_env
        ))),
    }
}

/// Build every collaborator and embed the corpus.
async fn build_controller(config: &HelpdeskConfig) -> Result<DialogController, HelpdeskError> {
    let api_key = read_api_key(config)?;
    let timeout = Duration::from_secs(config.llm.request_timeout_secs.max(1));

    let embedder: Arc<dyn DynEmbeddingService> = Arc::new(OpenAiEmbedder::new(
        &api_key,
        &config.llm.base_url,
        &config.retrieval.embedding_model,
        config.retrieval.embedding_dimensions,
        timeout,
    )?);
    let completion: Arc<dyn CompletionService> = Arc::new(OpenAiCompletion::new(
        &api_key,
        &config.llm.base_url,
        &config.llm.model,
        timeout,
    )?);
    let classifier: Arc<dyn IntentClassifier> = match config.chat.classifier {
        ClassifierKind::Llm => Arc::new(LlmIntentClassifier::new(Arc::new(
            OpenAiCompletion::new(
                &api_key,
                &config.llm.base_url,
                &config.llm.classifier_model,
                timeout,
            )?,
        ))),
        ClassifierKind::Keywords => Arc::new(KeywordIntentClassifier::new()),
    };
    tracing::info!(
        model = %config.llm.model,
        embedding_model = %config.retrieval.embedding_model,
        classifier = ?config.chat.classifier,
        "Provider clients ready"
    );

    let chunks = load_corpus(Path::new(&config.retrieval.corpus_path))?;
    let index = tokio::time::timeout(
        STARTUP_EMBED_TIMEOUT,
        EmbeddingIndex::build(chunks, embedder.as_ref()),
    )
    .await
    .map_err(|_| EmbeddingError::Timeout(STARTUP_EMBED_TIMEOUT.as_secs()))??;

    Ok(DialogController::new(
        Arc::new(index),
        embedder,
        completion,
        classifier,
        config.chat.history_max_length,
        DialogSettings::from_config(config),
    ))
}

/// Periodically drop sessions idle for longer than the configured TTL.
fn spawn_idle_sweep(controller: Arc<DialogController>, config: &HelpdeskConfig) {
    let minutes = config.sessions.idle_timeout_minutes;
    if minutes == 0 {
        tracing::info!("Session expiry disabled");
        return;
    }
    let ttl = Duration::from_secs(u64::from(minutes) * 60);
    let every = Duration::from_secs(config.sessions.sweep_interval_secs.max(1));
    tracing::info!(idle_timeout_minutes = minutes, sweep_secs = every.as_secs(), "Session expiry enabled");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = controller.prune_idle(ttl);
            if removed > 0 {
                tracing::debug!(removed, "Idle sweep finished");
            }
        }
    });
}

/// Read customer messages from stdin until EOF or `/quit`.
async fn run_chat(controller: &DialogController, session: Option<String>) -> std::io::Result<()> {
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("Session {}. Type /quit to exit.\n> ", session_id).as_bytes())
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        let reply = controller.handle_turn(&session_id, &line).await;
        stdout.write_all(format!("{}\n> ", reply).as_bytes()).await?;
        stdout.flush().await?;
    }
    stdout.write_all(b"\n").await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can apply.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match HelpdeskConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (HelpdeskConfig::default(), Some(e)),
    };

    init_tracing(&args.resolve_log_level(&config.general.log_level));
    tracing::info!("Starting Helpdesk v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    config.retrieval.corpus_path = args.resolve_corpus(&config.retrieval.corpus_path);

    let command = args.command();
    if let Command::Serve { host, port } = &command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        config.server.port = cli::resolve_port(*port, config.server.port);
    }

    let controller = match build_controller(&config).await {
        Ok(controller) => Arc::new(controller),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    match command {
        Command::Serve { .. } => {
            spawn_idle_sweep(Arc::clone(&controller), &config);
            let state = AppState::new(config, controller);
            routes::start_server(state).await?;
        }
        Command::Chat { session } => {
            run_chat(&controller, session).await?;
        }
    }

    Ok(())
}
