//! Initialize a new Grappler project.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILE};

pub fn run(path: Option<String>) -> Result<()> {
    let base_path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir()?,
    };

    println!("{} Initializing Grappler project...", "→".blue());

    let data_dir = base_path.join(".grappler");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    println!("  {} Created {}", "✓".green(), data_dir.display());

    let config = Config::default();
    let corpus_dir = base_path.join(&config.pipeline.index.collection);
    if !corpus_dir.exists() {
        std::fs::create_dir_all(&corpus_dir)
            .with_context(|| format!("Failed to create {}", corpus_dir.display()))?;
        println!("  {} Created {}", "✓".green(), corpus_dir.display());
    }

    let config_path = base_path.join(CONFIG_FILE);
    if !config_path.exists() {
        config.save(&config_path)?;
        println!("  {} Created {}", "✓".green(), config_path.display());
    } else {
        println!("  {} {} already exists", "•".yellow(), config_path.display());
    }

    let gitignore_path = data_dir.join(".gitignore");
    if !gitignore_path.exists() {
        std::fs::write(&gitignore_path, "index/\n")?;
        println!("  {} Created {}", "✓".green(), gitignore_path.display());
    }

    println!();
    println!("{} Grappler project initialized!", "✓".green().bold());
    println!();
    println!("Next steps:");
    println!("  {} put transcripts (.txt or .json) in {}", "1.".blue(), corpus_dir.display());
    println!("  {} grappler ingest {}", "2.".blue(), config.pipeline.index.collection);
    println!("  {} grappler ask \"How do I escape mount?\"", "3.".blue());
    println!("  {} grappler chat", "4.".blue());

    Ok(())
}
