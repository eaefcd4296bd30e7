//! `folio chat`: single-message or interactive chat.

use std::io::Write;

use folio_core::message::GenerationRequest;
use folio_engine::{ChatStreamEvent, ContextEngine};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::{build_engine, load_config};

/// Flags shared by both chat modes.
pub struct ChatOptions {
    pub session: Option<String>,
    pub model: Option<String>,
    pub user: Option<String>,
    pub stream: bool,
    pub json: bool,
}

impl ChatOptions {
    fn request(&self, message: &str, session: Option<&str>) -> GenerationRequest {
        let mut request = GenerationRequest::new(message);
        request.session_id = session.map(str::to_string);
        request.model = self.model.clone();
        request.user_id = self.user.clone();
        request
    }
}

pub async fn run(message: Option<String>, options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let engine = build_engine(&config).await?;

    if let Some(msg) = message {
        let request = options.request(&msg, options.session.as_deref());

        if options.stream {
            let mut out = std::io::stdout();
            stream_answer(&engine, request, &mut out).await?;
        } else {
            let response = engine.chat(request).await?;
            if !response.success {
                warn!(
                    error = response.error.as_deref().unwrap_or("unknown"),
                    "Backend unavailable, answered with a fallback"
                );
            }
            if options.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.response);
            }
        }
        return Ok(());
    }

    // Interactive mode
    let name = engine.knowledge().personal_info.name.clone();
    println!();
    println!("  Folio: chatting with {name}'s portfolio");
    println!("  Model:   {}", options.model.as_deref().unwrap_or(&config.backend.model));
    println!();
    println!("  {}", engine.welcome_message());
    println!();
    for starter in engine.starters() {
        println!("    • {starter}");
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut session = options.session.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = std::io::stdout();

    loop {
        print!("  You > ");
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let request = options.request(line, session.as_deref());
        println!();

        if options.stream {
            print!("  Folio > ");
            match stream_answer(&engine, request, &mut out).await {
                Ok(id) => session = Some(id),
                Err(e) => eprintln!("  [Error] {e}"),
            }
        } else {
            match engine.chat(request).await {
                Ok(response) => {
                    for text in response.response.lines() {
                        println!("  Folio > {text}");
                    }
                    session = Some(response.session_id);
                }
                Err(e) => eprintln!("  [Error] {e}"),
            }
        }
        println!();
    }

    if let Some(id) = session {
        println!("  Session: {id}");
    }
    Ok(())
}

/// Print streamed text as it arrives. Returns the session id.
async fn stream_answer(
    engine: &ContextEngine,
    request: GenerationRequest,
    out: &mut impl Write,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut events = engine.chat_stream(request).await?;
    let mut session_id = String::new();

    while let Some(event) = events.next().await {
        match event {
            ChatStreamEvent::Chunk { content } => {
                write!(out, "{content}")?;
                out.flush()?;
            }
            ChatStreamEvent::Fallback { content, error } => {
                warn!(%error, "Backend unavailable, answered with a fallback");
                write!(out, "{content}")?;
            }
            ChatStreamEvent::Error { message } => {
                writeln!(out)?;
                eprintln!("  [Stream interrupted] {message}");
            }
            ChatStreamEvent::Done { session_id: id, .. } => session_id = id,
        }
    }
    writeln!(out)?;
    Ok(session_id)
}
