//! Interactive chat relay.
//!
//! A read-post-wait-print loop over [`AgentClient`]: reads a line from
//! stdin, forwards it to the conversation thread, and prints the agent's
//! reply. One round trip is in flight at a time, so the loop is a plain
//! sequential cycle.
//!
//! A failed round trip is non-fatal: the error is printed and the loop
//! continues. End-of-input or an explicit `quit`/`exit` terminates cleanly.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};

use crate::agent::AgentClient;
use crate::config::ChatSettings;

pub async fn run_chat(settings: &ChatSettings) -> Result<()> {
    let client = AgentClient::new(settings)?;
    let thread_id = client
        .create_thread()
        .await
        .context("could not create a conversation thread")?;

    println!(
        "Interactive mode. Thread: {}. Type your question, or 'quit' to exit.",
        thread_id
    );

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        line.clear();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            // End of input.
            println!();
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            println!("Exiting.");
            break;
        }

        match client.ask(&thread_id, query).await {
            Ok(reply) => println!("Agent: {}", reply),
            Err(e) => eprintln!("error: {:#}", e),
        }
    }

    Ok(())
}
