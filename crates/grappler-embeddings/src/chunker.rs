//! Recursive text chunking for embedding.
//!
//! Transcripts are split on a hierarchy of separators, coarsest first
//! (paragraph, line, sentence, word, character). A piece that is still too
//! large is split again with the next finer separator. The resulting pieces
//! are packed greedily into passages, and each passage after the first starts
//! with the last `overlap` characters of its predecessor.
//!
//! Lengths are counted in `char`s, never bytes, so the overlap never lands in
//! the middle of a UTF-8 sequence.

use thiserror::Error;

/// Chunking configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Separator hierarchy used when none is configured.
///
/// The empty string stands for "split between characters".
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Chunking configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum passage size in characters.
    pub chunk_size: usize,
    /// Characters shared between the tail of one passage and the head of the next.
    pub overlap: usize,
    /// Separators, coarsest first.
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::transcripts()
    }
}

impl ChunkConfig {
    /// Create a config with the default separator hierarchy.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Settings used for the coaching transcript corpus.
    pub fn transcripts() -> Self {
        Self::new(1500, 500)
    }

    /// Replace the separator hierarchy.
    pub fn with_separators<S: Into<String>>(mut self, separators: impl IntoIterator<Item = S>) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Stop at word boundaries: a word longer than the chunk size is kept whole.
    pub fn without_character_split(mut self) -> Self {
        self.separators.retain(|s| !s.is_empty());
        self
    }

    /// Check the size/overlap relation.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Fresh characters each passage contributes beyond its overlap.
    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A chunk of text with position info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// Character offset of the first character in the source text.
    pub start: usize,
    /// Position of this chunk in the output sequence.
    pub index: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Recursive text chunker.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    /// Create a new chunker, rejecting an inconsistent config.
    pub fn new(config: ChunkConfig) -> Result<Self, ChunkError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split text into overlapping chunks.
    ///
    /// Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut atoms = Vec::new();
        split_recursive(text, &self.config.separators, self.config.stride(), &mut atoms);
        let pieces = merge_pieces(&atoms, self.config.stride());
        self.pack(&pieces)
    }

    /// Greedily pack pieces into chunks, seeding each chunk after the first
    /// with the tail of the previous one.
    fn pack(&self, pieces: &[String]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        let mut current_start = 0usize;
        let mut has_fresh = false;

        for piece in pieces {
            let piece_len = char_len(piece);
            if has_fresh && current_len + piece_len > self.config.chunk_size {
                // Shrink the seeded tail so a piece that fits alone still fits.
                let room = if piece_len <= self.config.chunk_size {
                    self.config.overlap.min(self.config.chunk_size - piece_len)
                } else {
                    self.config.overlap
                };
                let tail = last_chars(&current, room).to_string();
                let tail_len = char_len(&tail);
                chunks.push(Chunk {
                    text: std::mem::take(&mut current),
                    start: current_start,
                    index: chunks.len(),
                });
                current_start += current_len - tail_len;
                current = tail;
                current_len = tail_len;
                has_fresh = false;
            }
            current.push_str(piece);
            current_len += piece_len;
            has_fresh = true;
        }

        if has_fresh {
            chunks.push(Chunk {
                text: current,
                start: current_start,
                index: chunks.len(),
            });
        }

        chunks
    }
}

/// Split `text` into contiguous slices of at most `limit` characters.
///
/// A slice that no remaining separator can split is emitted whole.
fn split_recursive<'a>(text: &'a str, separators: &[String], limit: usize, out: &mut Vec<&'a str>) {
    if text.is_empty() {
        return;
    }
    if char_len(text) <= limit {
        out.push(text);
        return;
    }

    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            out.extend(text.char_indices().map(|(idx, ch)| &text[idx..idx + ch.len_utf8()]));
            return;
        }
        if text.contains(separator.as_str()) {
            for segment in split_keep(text, separator) {
                split_recursive(segment, &separators[i + 1..], limit, out);
            }
            return;
        }
    }

    out.push(text);
}

/// Split on `separator`, keeping it attached to the end of each segment so
/// that the segments concatenate back to `text`.
fn split_keep<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for (idx, matched) in text.match_indices(separator) {
        let end = idx + matched.len();
        parts.push(&text[last..end]);
        last = end;
    }
    if last < text.len() {
        parts.push(&text[last..]);
    }
    parts
}

/// Merge adjacent atoms while they fit in `limit` characters.
fn merge_pieces(atoms: &[&str], limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0usize;

    for atom in atoms {
        let atom_len = char_len(atom);
        if !buffer.is_empty() && buffer_len + atom_len > limit {
            pieces.push(std::mem::take(&mut buffer));
            buffer_len = 0;
        }
        buffer.push_str(atom);
        buffer_len += atom_len;
    }
    if !buffer.is_empty() {
        pieces.push(buffer);
    }
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it when shorter).
fn last_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
