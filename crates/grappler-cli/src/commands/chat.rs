//! Interactive chat. One session per run; history is kept in memory only.

use anyhow::Result;
use colored::Colorize;
use grappler::prelude::*;
use std::io::{BufRead, Write};

use crate::backends;
use crate::config::Config;

pub async fn run(corpus: &str) -> Result<()> {
    let config = Config::load()?;
    let coach = backends::coach(&config, Path::new(corpus)).await?;

    println!("{} Ask about positions, escapes, submissions. {} to leave.", "→".blue(), "exit".cyan());
    println!();

    let stdin = std::io::stdin();
    let mut session: Option<SessionId> = None;
    let mut line = String::new();

    loop {
        print!("{} ", "you>".green().bold());
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let mut request = QueryRequest::new(question);
        if let Some(id) = &session {
            request = request.with_session(id.to_string());
        }
        let reply = coach.process_query(request).await;
        session = Some(reply.session_id);

        println!("{} {}", "coach>".blue().bold(), reply.response_text);
        println!();
    }

    if let Some(id) = session {
        println!("{} {}", "session:".dimmed(), id.to_string().dimmed());
    }
    Ok(())
}
