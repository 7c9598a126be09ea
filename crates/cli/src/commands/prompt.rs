//! `colloquy prompt` - show the system message the next answer pass would use.

use crate::{render, session};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = session::load_config()?;
    let store = session::open_store(&config);
    let assembled = session::assembler(&config).assemble_with_tokens(&store);
    render::system_prompt(&assembled);
    Ok(())
}
