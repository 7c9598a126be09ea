//! Session wiring shared by the commands.

use colloquy_agent::{
    ContextStore, EventSink, GenerationOrchestrator, GenerationReport, GenerationSettings,
    SystemMessageAssembler,
};
use colloquy_config::AppConfig;
use colloquy_core::error::{GenerationError, ProviderError};
use colloquy_core::persona::Persona;
use colloquy_core::provider::Attachment;
use colloquy_store::JsonFileStore;
use std::sync::Arc;
use tracing::debug;

use crate::render::{self, Follow};

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The conversation log and facts, loaded from and saved to the session dir.
pub fn open_store(config: &AppConfig) -> ContextStore {
    let dir = config.session_dir();
    debug!(dir = %dir.display(), "Opening session");
    ContextStore::attached(Arc::new(JsonFileStore::new(dir)))
}

pub fn assembler(config: &AppConfig) -> SystemMessageAssembler {
    let persona = Persona::load(
        &config.persona_path(),
        config.session.persona_override.as_deref(),
    );
    SystemMessageAssembler::new(persona)
}

/// Build and initialize the orchestrator for the configured provider.
pub async fn orchestrator(
    config: &AppConfig,
) -> Result<GenerationOrchestrator, Box<dyn std::error::Error>> {
    let resolved = match colloquy_providers::build_from_config(config) {
        Ok(resolved) => resolved,
        Err(ProviderError::NotConfigured(reason)) => {
            print_key_help();
            return Err(format!("Provider not configured: {reason}").into());
        }
        Err(e) => return Err(e.into()),
    };

    let orchestrator = GenerationOrchestrator::new(
        resolved.provider,
        Arc::new(colloquy_tools::default_registry()),
        assembler(config),
        GenerationSettings::from_config(config, resolved.model),
    );
    orchestrator.initialize().await?;
    Ok(orchestrator)
}

/// Run one `generate` call while rendering its events.
pub async fn run_turn(
    orchestrator: &GenerationOrchestrator,
    store: &mut ContextStore,
    attachment: Option<Attachment>,
    follow: Follow,
) -> Result<GenerationReport, GenerationError> {
    let (events, rx) = EventSink::channel();
    let printer = tokio::spawn(render::follow(rx, follow));

    let result = orchestrator
        .generate_with_attachment(store, attachment, &events)
        .await;

    drop(events);
    let _ = printer.await;
    result
}

fn print_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
    eprintln!("    OPENAI_API_KEY=sk-...             (for OpenAI direct)");
    eprintln!("    COLLOQUY_API_KEY=sk-...           (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}
