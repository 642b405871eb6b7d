//! Construct embedders, LLM backends and the orchestrator from `grappler.toml`.

use anyhow::{Context, Result};
use grappler::prelude::*;

use crate::config::{Config, EmbeddingProvider, LlmProvider};

const MOCK_ANSWER: &str =
    "This is the offline mock coach. Set [llm] provider in grappler.toml for real answers.";

pub fn embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let settings = &config.embedding;
    match settings.provider {
        EmbeddingProvider::Simple => Ok(Arc::new(SimpleEmbedder::new(settings.dimension))),
        EmbeddingProvider::OpenAi => openai_embedder(config),
    }
}

#[cfg(feature = "api")]
fn openai_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let settings = &config.embedding;
    let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;

    let mut api = ApiConfig::openai(&api_key)
        .with_timeout(config.pipeline.timeouts.embedding_secs);
    if let Some(model) = &settings.model {
        api = api.with_model(model).with_dimensions(settings.dimension);
    }
    Ok(Arc::new(ApiEmbedder::new(api)?))
}

#[cfg(not(feature = "api"))]
fn openai_embedder(_config: &Config) -> Result<Arc<dyn Embedder>> {
    anyhow::bail!("OpenAI embeddings need the `api` feature")
}

pub fn llm(config: &Config) -> Result<Arc<dyn LlmBackend>> {
    let settings = &config.llm;
    let generation = &config.pipeline.generation;
    let apply = |base: LlmConfig| {
        let base = base
            .with_max_tokens(generation.max_tokens)
            .with_temperature(generation.temperature)
            .with_timeout(config.pipeline.timeouts.generation_secs);
        match &settings.model {
            Some(model) => base.with_model(model.as_str()),
            None => base,
        }
    };

    match settings.provider {
        LlmProvider::Mock => Ok(Arc::new(MockBackend::new().with_default_response(MOCK_ANSWER))),
        LlmProvider::OpenAi => openai_llm(apply(LlmConfig::openai()), settings.endpoint.as_deref()),
        LlmProvider::Ollama => ollama_llm(apply(LlmConfig::ollama()), settings.endpoint.as_deref()),
    }
}

#[cfg(feature = "api")]
fn openai_llm(llm: LlmConfig, endpoint: Option<&str>) -> Result<Arc<dyn LlmBackend>> {
    let backend = OpenAiBackend::from_env(llm)?;
    Ok(match endpoint {
        Some(endpoint) => Arc::new(backend.with_endpoint(endpoint)),
        None => Arc::new(backend),
    })
}

#[cfg(not(feature = "api"))]
fn openai_llm(_llm: LlmConfig, _endpoint: Option<&str>) -> Result<Arc<dyn LlmBackend>> {
    anyhow::bail!("the OpenAI backend needs the `api` feature")
}

#[cfg(feature = "local")]
fn ollama_llm(llm: LlmConfig, endpoint: Option<&str>) -> Result<Arc<dyn LlmBackend>> {
    let endpoint = endpoint.unwrap_or("http://localhost:11434");
    Ok(Arc::new(OllamaBackend::with_config(endpoint, llm)?))
}

#[cfg(not(feature = "local"))]
fn ollama_llm(_llm: LlmConfig, _endpoint: Option<&str>) -> Result<Arc<dyn LlmBackend>> {
    anyhow::bail!("the Ollama backend needs the `local` feature")
}

/// Load (or build) the index and wire up a coach around it.
pub async fn coach(config: &Config, corpus: &Path) -> Result<QueryOrchestrator> {
    let pipeline = IngestPipeline::new(config.pipeline.clone(), embedder(config)?);
    let (index, outcome) = pipeline
        .load_or_build(corpus)
        .await
        .with_context(|| format!("Failed to prepare the index from {}", corpus.display()))?;
    tracing::debug!(?outcome, "index ready");

    let coach = QueryOrchestrator::new(&config.pipeline, Arc::new(index), llm(config)?)
        .context("Invalid persona template")?;
    Ok(coach)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_embedder_is_offline() {
        let embedder = embedder(&Config::default()).unwrap();
        assert_eq!(embedder.dimension(), 256);
    }

    #[test]
    fn test_mock_llm() {
        let mut config = Config::default();
        config.llm.provider = LlmProvider::Mock;
        config.llm.model = Some("scripted".to_string());
        assert_eq!(llm(&config).unwrap().name(), "mock");
    }
}
