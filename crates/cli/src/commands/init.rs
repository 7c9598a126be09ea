//! `colloquy init` - write a default config and prepare the session directory.

use colloquy_config::AppConfig;
use colloquy_core::persona::Persona;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("colloquy — setup");
    println!("================\n");

    std::fs::create_dir_all(&config_dir)?;

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created config.toml at: {}", config_path.display());
    }

    let config = crate::session::load_config()?;
    let session_dir = config.session_dir();
    std::fs::create_dir_all(&session_dir)?;
    println!("  Session directory: {}", session_dir.display());

    // Writes the default persona file when it is missing.
    let persona = Persona::load(&config.persona_path(), None);
    println!("  Persona file: {}", config.persona_path().display());
    println!("  Persona: {}", persona.text.trim());

    if !config.has_api_key() {
        println!("\n  Next: set OPENROUTER_API_KEY (or COLLOQUY_API_KEY) and run `colloquy chat`.");
    }

    Ok(())
}
