//! Full pipeline over a small on-disk corpus, fully offline: feature-hash
//! embeddings and a scripted LLM.

use grappler::prelude::*;
use tempfile::TempDir;

const MOUNT: &str = "Escaping mount starts with defence. Keep your elbows tight to your ribs \
and your hands high. When they reach, trap the arm and the foot on the same side. \
Bridge hard over your shoulder and roll into their guard.";

const GUARD: &str = "Closed guard is a control position. Break their posture by pulling \
the collar down. Once they are bent forward, climb your legs high and hunt for the armbar, \
the triangle or the omoplata.";

fn corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("mount.txt"), MOUNT).unwrap();
    std::fs::write(
        dir.path().join("videos.json"),
        serde_json::json!({ "abc123": GUARD }).to_string(),
    )
    .unwrap();
    dir
}

fn config(index_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.chunking.chunk_size = 120;
    config.chunking.overlap = 30;
    config.index.dir = index_dir.to_path_buf();
    config.index.top_k = 10;
    config
}

#[tokio::test]
async fn ingest_then_answer_then_refuse() {
    let corpus = corpus();
    let index_dir = TempDir::new().unwrap();
    let config = config(index_dir.path());

    let embedder = Arc::new(SimpleEmbedder::new(256));
    let (index, outcome) = IngestPipeline::new(config.clone(), embedder)
        .load_or_build(corpus.path())
        .await
        .unwrap();
    assert!(matches!(outcome, IngestOutcome::Built { documents: 2, .. }));

    let llm = Arc::new(
        MockBackend::new()
            .with_response("Question: What is the capital of France?", "No")
            .with_response("Is this question relevant", "Yes")
            .with_default_response("Trap and roll."),
    );
    let coach = QueryOrchestrator::new(&config, Arc::new(index), llm.clone()).unwrap();

    let reply = coach
        .process_query(QueryRequest::new("How do I escape the mount?"))
        .await;
    assert_eq!(reply.response_text, "Trap and roll.");

    // Classifier call, then generation; the answer prompt carries the passages.
    assert_eq!(llm.calls(), 2);
    let generation_prompt = &llm.prompts()[1];
    assert!(generation_prompt.contains("Escaping mount"));
    assert!(generation_prompt.contains("Question: How do I escape the mount?"));

    let calls_before = llm.calls();
    let refusal = coach
        .process_query(
            QueryRequest::new("What is the capital of France?")
                .with_session(reply.session_id.to_string()),
        )
        .await;
    assert_eq!(refusal.response_text, grappler::rag::DEFAULT_REFUSAL);
    assert_eq!(refusal.session_id, reply.session_id);
    assert_eq!(llm.calls(), calls_before + 1);

    let history = coach.sessions().history(&reply.session_id).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn persisted_index_survives_restart() {
    let corpus = corpus();
    let index_dir = TempDir::new().unwrap();
    let config = config(index_dir.path());

    let (first, _) = IngestPipeline::new(config.clone(), Arc::new(SimpleEmbedder::new(128)))
        .load_or_build(corpus.path())
        .await
        .unwrap();
    let before = first.search("triangle from closed guard", 3).await.unwrap();

    // Corpus removed: a second start must come from disk.
    drop(corpus);
    let missing = index_dir.path().join("no-corpus-here");
    let (second, outcome) = IngestPipeline::new(config, Arc::new(SimpleEmbedder::new(128)))
        .load_or_build(&missing)
        .await
        .unwrap();
    assert!(matches!(outcome, IngestOutcome::Loaded { .. }));

    let after = second.search("triangle from closed guard", 3).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(
        after.iter().next().unwrap().passage.source(),
        Some("abc123")
    );
}
