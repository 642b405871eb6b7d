//! Chunk, embed and persist a transcript corpus.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use grappler::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::backends;
use crate::config::Config;

pub async fn run(path: &str, rebuild: bool) -> Result<()> {
    let path = Path::new(path);
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }

    let config = Config::load()?;
    let pipeline = IngestPipeline::new(config.pipeline.clone(), backends::embedder(&config)?);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .context("Invalid progress template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    // Counts come from the outcome; a loaded index never touches the corpus.
    spinner.set_message(if rebuild { "Embedding passages..." } else { "Loading index..." });

    let result = if rebuild {
        pipeline.build(path).await.map(|(_, outcome)| outcome)
    } else {
        pipeline.load_or_build(path).await.map(|(_, outcome)| outcome)
    };
    spinner.finish_and_clear();
    let outcome = result?;

    let index = &config.pipeline.index;
    println!();
    match &outcome {
        IngestOutcome::Built { documents, passages } => {
            println!("{} Index built!", "✓".green().bold());
            println!("  Documents: {}", documents.to_string().cyan());
            println!("  Passages:  {}", passages.to_string().cyan());
        }
        IngestOutcome::Loaded { passages } => {
            println!("{} Index already up to date", "•".yellow());
            println!("  Passages:  {}", passages.to_string().cyan());
            println!("  Use {} to re-embed the corpus", "--rebuild".cyan());
        }
    }
    println!(
        "  Stored at: {}",
        grappler::index::collection_path(&index.dir, &index.collection)
            .display()
            .to_string()
            .dimmed()
    );
    tracing::debug!(?outcome, "ingest finished");

    Ok(())
}
