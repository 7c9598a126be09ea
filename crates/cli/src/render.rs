//! Plain-text rendering of session state and generation events.

use colloquy_agent::context::assembler::TIME_FORMAT;
use colloquy_agent::{AssembledPrompt, DebugInfo, GenerationEvent};
use colloquy_core::turn::ConversationTurn;
use std::io::Write;
use tokio::sync::mpsc::UnboundedReceiver;

/// How much of a running generation to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Follow {
    /// Progress dots plus every finalized or amended turn
    Turns,
    /// Progress dots only
    Quiet,
}

pub fn system_prompt(prompt: &AssembledPrompt) {
    println!("  ── System Prompt ({} Tokens) ──", prompt.token_count);
    for line in prompt.text.lines() {
        println!("  │ {line}");
    }
    println!();
}

pub fn turns(turns: &[ConversationTurn]) {
    println!("  ── Conversation ({} turns) ──", turns.len());
    for turn in turns {
        println!(
            "  {}  {:<9} {}  {}",
            turn.id,
            turn.role.as_str(),
            turn.local_timestamp().format(TIME_FORMAT),
            turn.content
        );
    }
    println!();
}

pub fn debug_info(debug: &DebugInfo) {
    for (key, value) in debug.iter() {
        println!("  {key}: {value}");
    }
}

/// Drain generation events until the sender is dropped.
pub async fn follow(mut rx: UnboundedReceiver<GenerationEvent>, mode: Follow) {
    let mut dots = false;
    while let Some(event) = rx.recv().await {
        match event {
            GenerationEvent::Progress { .. } => {
                eprint!(".");
                let _ = std::io::stderr().flush();
                dots = true;
            }
            GenerationEvent::TurnCompleted { turn, .. } if mode == Follow::Turns => {
                end_dots(&mut dots);
                println!("  {} > {}", turn.role, turn.content);
            }
            GenerationEvent::TurnAmended { turn } if mode == Follow::Turns => {
                end_dots(&mut dots);
                println!("  {} > {}", turn.role, turn.content);
            }
            _ => {}
        }
    }
    end_dots(&mut dots);
}

fn end_dots(dots: &mut bool) {
    if std::mem::take(dots) {
        eprintln!();
    }
}
