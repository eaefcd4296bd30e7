//! `folio history`: print a session's turns, oldest first.

use super::{build_engine, load_config};

pub async fn run(session: String, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;
    let limit = limit.unwrap_or(config.history.list_limit);

    let turns = engine.history(&session, limit).await?;
    if turns.is_empty() {
        println!("  No messages in session {session}");
        return Ok(());
    }

    for turn in turns {
        println!("[{}]", turn.timestamp.format("%Y-%m-%d %H:%M:%S"));
        println!("  Q: {}", turn.message);
        println!("  A: {}", turn.response);
        println!();
    }
    Ok(())
}
