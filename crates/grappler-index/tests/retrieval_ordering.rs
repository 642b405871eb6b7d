//! Retrieval ordering over a realistic transcript corpus.

use grappler_embeddings::{ChunkConfig, Chunker, SimpleEmbedder};
use grappler_index::{
    chunk_documents, Document, IndexSnapshot, Retriever, SharedIndex, SimilarityMetric,
};
use std::sync::Arc;

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "mount_escapes",
            "When you are stuck under mount, keep your elbows tight. \
             Bridge hard toward the trapped arm and roll. \
             If they post, switch to the elbow-knee escape and recover half guard.",
        ),
        Document::new(
            "closed_guard",
            "From closed guard, break their posture by pulling the collar. \
             Climb your legs high and look for the armbar or the triangle. \
             When they posture up, hip bump sweep.",
        ),
        Document::new(
            "back_takes",
            "Seatbelt grip first, then hooks. Keep your chest glued to their back. \
             Fight the hands before going for the choke.",
        ),
    ]
}

async fn build_index(metric: SimilarityMetric) -> SharedIndex {
    let chunker = Chunker::new(ChunkConfig::new(80, 20)).unwrap();
    let passages = chunk_documents(&corpus(), &chunker);
    let embedder = Arc::new(SimpleEmbedder::new(128));
    let snapshot = IndexSnapshot::build(passages, embedder.as_ref(), metric)
        .await
        .unwrap();
    SharedIndex::new(snapshot, embedder)
}

#[tokio::test]
async fn scores_are_non_increasing_and_bounded_by_k() {
    for metric in [
        SimilarityMetric::Cosine,
        SimilarityMetric::DotProduct,
        SimilarityMetric::Euclidean,
    ] {
        let index = build_index(metric).await;
        let total = index.snapshot().unwrap().len();

        for k in [1, 3, 6, total + 10] {
            let results = index
                .retrieve("how do I escape mount with a bridge", k)
                .await
                .unwrap();
            assert!(results.len() <= k);
            assert_eq!(results.len(), k.min(total));

            let scores: Vec<f32> = results.iter().map(|h| h.score).collect();
            assert!(
                scores.windows(2).all(|w| w[0] >= w[1]),
                "{metric}: scores not sorted: {scores:?}"
            );
        }
    }
}

#[tokio::test]
async fn best_match_comes_from_the_relevant_transcript() {
    let index = build_index(SimilarityMetric::Cosine).await;
    let results = index.retrieve("seatbelt grip hooks", 3).await.unwrap();

    let top = results.iter().next().unwrap();
    assert_eq!(top.passage.source(), Some("back_takes"));
}

#[tokio::test]
async fn equal_scores_keep_ingestion_order() {
    let index = build_index(SimilarityMetric::Cosine).await;
    // Single-letter tokens are dropped, so the query vector is zero and
    // every passage scores the same.
    let results = index.retrieve("a b", 5).await.unwrap();

    let ordinals: Vec<usize> = results.iter().map(|h| h.ordinal).collect();
    let mut sorted = ordinals.clone();
    sorted.sort_unstable();
    assert_eq!(ordinals, sorted);
    assert_eq!(ordinals.first(), Some(&0));
}
