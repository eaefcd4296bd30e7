//! `folio starters`: print the knowledge base's conversation starters.

use super::{build_engine, load_config};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;

    println!("{}", engine.welcome_message());
    println!();
    for starter in engine.starters() {
        println!("  • {starter}");
    }
    Ok(())
}
