//! `folio stats`: history analytics over a time window.

use folio_core::message::StatsRange;

use super::{build_engine, load_config};

pub async fn run(range: StatsRange, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;
    let stats = engine.stats(range).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("📊 Folio Stats ({range:?})");
    println!("==================\n");
    println!("  Messages:     {}", stats.total_messages);
    println!("  Sessions:     {}", stats.total_sessions);
    println!("  Active users: {}", stats.active_users);

    if !stats.top_questions.is_empty() {
        println!("\n  Top questions:");
        for q in &stats.top_questions {
            println!("    {:>4}  {}", q.count, q.message);
        }
    }

    if !stats.messages_over_time.is_empty() {
        println!("\n  Messages per day:");
        for day in &stats.messages_over_time {
            println!("    {}  {}", day.date, day.count);
        }
    }
    Ok(())
}
