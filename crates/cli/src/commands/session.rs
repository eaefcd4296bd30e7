//! `folio session`: create or inspect sessions.

use folio_core::message::NewSession;

use super::{build_engine, load_config};
use crate::SessionAction;

pub async fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;

    match action {
        SessionAction::New { id, user } => {
            let session = engine
                .create_session(NewSession {
                    id,
                    user_id: user,
                    metadata: None,
                })
                .await?;
            println!("{}", session.id);
        }
        SessionAction::Show { id } => match engine.session(&id).await? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => return Err(format!("Session not found: {id}").into()),
        },
    }
    Ok(())
}
