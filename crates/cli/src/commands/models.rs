//! `folio models`: list models served by the backend.

use super::{build_engine, load_config};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;
    let models = engine.models().await;

    if models.is_empty() {
        println!("  No models found at {}", config.backend.base_url);
        return Ok(());
    }

    for model in models {
        let marker = if model == config.backend.model { "*" } else { " " };
        println!("  {marker} {model}");
    }
    Ok(())
}
