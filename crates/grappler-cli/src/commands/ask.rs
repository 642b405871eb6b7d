//! Ask the coach a single question.

use anyhow::Result;
use colored::Colorize;
use grappler::prelude::*;

use crate::backends;
use crate::config::Config;

pub async fn run(question: &str, session: Option<String>, corpus: &str) -> Result<()> {
    let config = Config::load()?;
    let coach = backends::coach(&config, Path::new(corpus)).await?;

    let mut request = QueryRequest::new(question);
    if let Some(id) = session {
        request = request.with_session(id);
    }

    let reply = coach.process_query(request).await;

    println!("{}", reply.response_text);
    println!();
    println!("{} {}", "session:".dimmed(), reply.session_id.to_string().dimmed());

    Ok(())
}
