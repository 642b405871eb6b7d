//! Chunking properties over a realistic transcript corpus.

use grappler_embeddings::{ChunkConfig, Chunker};

const CORPUS: &str = include_str!("data/closed_guard_transcript.txt");

fn tail(text: &str, n: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars[chars.len().saturating_sub(n)..].iter().collect()
}

fn head(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[test]
fn chunking_is_deterministic() {
    for (size, overlap) in [(80, 20), (200, 50), (1500, 500), (33, 7)] {
        let chunker = Chunker::new(ChunkConfig::new(size, overlap)).unwrap();
        assert_eq!(chunker.chunk(CORPUS), chunker.chunk(CORPUS));
    }
}

#[test]
fn every_chunk_respects_the_bound() {
    for (size, overlap) in [(80, 20), (200, 50), (33, 7), (12, 11)] {
        let chunker = Chunker::new(ChunkConfig::new(size, overlap)).unwrap();
        for chunk in chunker.chunk(CORPUS) {
            assert!(
                chunk.len() <= size,
                "size={} overlap={} produced {} chars",
                size,
                overlap,
                chunk.len()
            );
        }
    }
}

#[test]
fn adjacent_chunks_share_exact_overlap() {
    for (size, overlap) in [(80, 20), (200, 50), (33, 7), (12, 11)] {
        let chunker = Chunker::new(ChunkConfig::new(size, overlap)).unwrap();
        let chunks = chunker.chunk(CORPUS);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert_eq!(tail(&pair[0].text, overlap), head(&pair[1].text, overlap));
        }
    }
}

#[test]
fn chunks_cover_the_whole_source() {
    let chunker = Chunker::new(ChunkConfig::new(120, 30)).unwrap();
    let chunks = chunker.chunk(CORPUS);

    let mut rebuilt = chunks[0].text.clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.text.chars().skip(30));
    }
    assert_eq!(rebuilt, CORPUS);
    assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
}

#[test]
fn whole_words_mode_keeps_words_intact() {
    let config = ChunkConfig::new(40, 10).without_character_split();
    let chunker = Chunker::new(config).unwrap();
    for chunk in chunker.chunk(CORPUS) {
        // Every chunk still fits, the corpus has no 30+ character words
        assert!(chunk.len() <= 40);
    }
}
