//! Show index statistics.

use anyhow::{bail, Result};
use colored::Colorize;
use grappler::index::{IndexManifest, IndexSnapshot};
use std::collections::BTreeSet;

use crate::config::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let index = &config.pipeline.index;

    if !IndexSnapshot::exists(&index.dir, &index.collection) {
        bail!("No index found. Run {} first.", "grappler ingest".cyan());
    }

    let manifest = IndexManifest::read(&index.dir, &index.collection)?;
    let snapshot = IndexSnapshot::load(&index.dir, &index.collection)?;

    let passages: Vec<_> = snapshot.passages().collect();
    let sources: BTreeSet<&str> = passages.iter().filter_map(|p| p.source()).collect();
    let total_chars: usize = passages.iter().map(|p| p.text.chars().count()).sum();
    let avg_chars = if passages.is_empty() {
        0.0
    } else {
        total_chars as f64 / passages.len() as f64
    };

    println!("{}", "Grappler Index Statistics".white().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!();

    println!("{}", "Collection".blue().bold());
    println!("  Name:              {}", manifest.collection.cyan());
    println!("  Built:             {}", manifest.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Format version:    {}", manifest.format_version);
    println!();

    println!("{}", "Embeddings".blue().bold());
    println!("  Model:             {}", manifest.model.cyan());
    println!("  Dimension:         {}", manifest.dimension.to_string().cyan());
    println!("  Metric:            {}", manifest.metric);
    println!();

    println!("{}", "Corpus".blue().bold());
    println!("  Sources:           {}", sources.len().to_string().cyan());
    println!("  Passages:          {}", passages.len().to_string().cyan());
    println!("  Avg passage chars: {:.1}", avg_chars);
    println!();

    let pipeline = &config.pipeline;
    println!("{}", "Retrieval".blue().bold());
    println!("  Top-k:             {}", pipeline.index.effective_top_k());
    println!("  Chunk size:        {}", pipeline.chunking.chunk_size);
    println!("  Chunk overlap:     {}", pipeline.chunking.overlap);
    println!();
    println!("{}", "═".repeat(40).dimmed());

    Ok(())
}
