//! `colloquy send` - run one turn and print the final answer.

use colloquy_core::provider::Attachment;
use colloquy_core::turn::{ConversationTurn, Role};
use std::path::{Path, PathBuf};

use crate::render::{self, Follow};
use crate::session;

pub async fn run(message: String, attach: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = session::load_config()?;
    let orchestrator = session::orchestrator(&config).await?;
    let mut store = session::open_store(&config);

    let attachment = match attach {
        Some(path) => Some(load_attachment(&path)?),
        None => None,
    };

    store.append(ConversationTurn::user(message));
    let report = session::run_turn(&orchestrator, &mut store, attachment, Follow::Quiet).await?;

    if let Some(answer) = store
        .list_turns()
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant && report.appended.contains(&t.id))
    {
        println!("{}", answer.content);
    }
    render::debug_info(&report.debug);
    Ok(())
}

fn load_attachment(path: &Path) -> Result<Attachment, Box<dyn std::error::Error>> {
    let media_type = media_type_for(path)
        .ok_or_else(|| format!("Unsupported attachment type: {}", path.display()))?;
    let data = std::fs::read(path)
        .map_err(|e| format!("Failed to read attachment {}: {e}", path.display()))?;
    Ok(Attachment::new(media_type, data))
}

/// Image MIME type from the file extension.
fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
