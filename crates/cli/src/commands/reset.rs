//! `colloquy reset` - clear the conversation log. Facts survive.

use crate::session;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = session::load_config()?;
    let mut store = session::open_store(&config);
    let cleared = store.len();
    store.reset();
    println!(
        "  Cleared {cleared} turns ({} facts kept) in {}",
        store.facts().len(),
        config.session_dir().display()
    );
    Ok(())
}
