//! `colloquy chat` - interactive session loop.
//!
//! Each round prints the system message with its token count, the
//! conversation so far and the last self-evaluation score, then reads one
//! line. `exit` quits. A failed generation is reported and the loop goes on.

use colloquy_core::turn::ConversationTurn;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::render::{self, Follow};
use crate::session;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = session::load_config()?;
    let orchestrator = session::orchestrator(&config).await?;
    let mut store = session::open_store(&config);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut last_score: Option<String> = None;

    loop {
        render::system_prompt(&orchestrator.assembler().assemble_with_tokens(&store));
        render::turns(store.list_turns());
        if let Some(score) = &last_score {
            println!("  Self-Evaluation Score: {score}\n");
        }

        print!("You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }

        store.append(ConversationTurn::user(input));
        match session::run_turn(&orchestrator, &mut store, None, Follow::Turns).await {
            Ok(report) => {
                last_score = report.debug.self_evaluation_score().map(str::to_string);
            }
            Err(e) => {
                warn!(error = %e, "Generation failed");
                eprintln!("  Error: {e}\n");
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}
