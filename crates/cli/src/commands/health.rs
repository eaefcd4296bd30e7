//! `folio health`: probe the backend and the history store.

use super::{build_engine, load_config};

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;
    let report = engine.health().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🩺 Folio Health");
    println!("===============\n");

    if report.backend_healthy {
        println!("  ✅ Backend {} reachable at {}", report.backend, config.backend.base_url);
    } else {
        println!("  ❌ Backend {} unreachable at {}", report.backend, config.backend.base_url);
        println!("     Is `ollama serve` running?");
    }

    if report.models.is_empty() {
        println!("  ⚠️  No models listed");
    } else if report.models.iter().any(|m| m == &config.backend.model) {
        println!("  ✅ Model {} available", config.backend.model);
    } else {
        println!("  ⚠️  Model {} not pulled; try `ollama pull {}`", config.backend.model, config.backend.model);
    }

    if report.history_ok {
        println!("  ✅ History store ({}) ok", report.history);
    } else {
        println!("  ❌ History store ({}) failing", report.history);
    }

    println!();
    println!("  Status: {}", report.status());
    Ok(())
}
