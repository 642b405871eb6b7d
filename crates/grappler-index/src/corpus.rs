//! Transcript corpus loading.
//!
//! A corpus is a single file or a directory of files:
//! - `.txt` files are one document each, named after the file.
//! - `.json` files map video ids to transcript text and yield one document
//!   per entry, in key order.
//!
//! Directory entries are read in file-name order so ingestion is repeatable.

use crate::{IndexError, IndexResult, Passage};
use grappler_embeddings::Chunker;
use std::collections::BTreeMap;
use std::path::Path;

/// A single source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the text came from: a file name or a video id.
    pub source: String,
    /// Raw document text.
    pub text: String,
}

impl Document {
    /// Create a document.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Load every document under `path`.
pub fn load_corpus(path: &Path) -> IndexResult<Vec<Document>> {
    if path.is_file() {
        return load_file(path);
    }

    if !path.is_dir() {
        return Err(IndexError::Corpus {
            path: path.to_path_buf(),
            reason: "no such file or directory".to_string(),
        });
    }

    let mut entries: Vec<_> = std::fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "txt" || ext == "json")
        })
        .collect();

    entries.sort_by_key(|e| e.file_name());

    let mut documents = Vec::new();
    for entry in entries {
        documents.extend(load_file(&entry.path())?);
    }

    tracing::info!(path = %path.display(), documents = documents.len(), "corpus loaded");
    Ok(documents)
}

fn load_file(path: &Path) -> IndexResult<Vec<Document>> {
    let content = std::fs::read_to_string(path).map_err(|e| IndexError::Corpus {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let is_json = path.extension().map_or(false, |ext| ext == "json");
    if !is_json {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "corpus".to_string());
        return Ok(vec![Document::new(source, content)]);
    }

    let transcripts: BTreeMap<String, String> =
        serde_json::from_str(&content).map_err(|e| IndexError::Corpus {
            path: path.to_path_buf(),
            reason: format!("expected a {{video id: transcript}} object: {}", e),
        })?;

    Ok(transcripts
        .into_iter()
        .map(|(video_id, text)| Document::new(video_id, text))
        .collect())
}

/// Chunk documents into passages, in document order.
///
/// Each passage records its `source` and its `chunk_index` within that
/// source. Empty documents contribute nothing.
pub fn chunk_documents(documents: &[Document], chunker: &Chunker) -> Vec<Passage> {
    documents
        .iter()
        .flat_map(|doc| {
            chunker.chunk(&doc.text).into_iter().map(move |chunk| {
                Passage::new(chunk.text, chunk.start)
                    .with_metadata("source", doc.source.as_str())
                    .with_metadata("chunk_index", chunk.index)
            })
        })
        .collect()
}
