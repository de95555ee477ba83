//! The `ask` command — one-shot question or interactive chat.

use std::io::{self, BufRead, Write};

use tabletalk_core::turn::SessionId;

use super::build_runtime;

pub async fn run(message: Option<String>) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;

    if let Some(message) = message {
        let outcome = runtime.runner.handle_message("cli", None, &message).await?;
        for msg in outcome.messages {
            println!("{}", msg.content);
        }
        return Ok(());
    }

    // Interactive mode: one session across the whole conversation.
    println!("tabletalk — ask about your data (Ctrl-D to exit)");
    let mut session_id: Option<SessionId> = None;
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match runtime
            .runner
            .handle_message("cli", session_id.as_ref(), line)
            .await
        {
            Ok(outcome) => {
                session_id = Some(outcome.session_id.clone());
                for msg in outcome.messages {
                    println!("{}", msg.content);
                }
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
            }
        }
    }

    Ok(())
}
