//! Prompt templates for the auxiliary LLM calls: relevance classification and
//! conversation summarisation.

use crate::types::{GenerationRequest, ModelParams};

/// A prompt template for LLM requests.
pub trait PromptTemplate {
    /// Generate the prompt text.
    fn generate(&self) -> String;

    /// Get the system prompt (if any).
    fn system_prompt(&self) -> Option<String> {
        None
    }

    /// Sampling parameters suited to this prompt.
    fn params(&self) -> ModelParams {
        ModelParams::default()
    }

    /// Build the full request.
    fn to_request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.generate()).with_params(self.params());
        if let Some(system) = self.system_prompt() {
            request = request.with_system(system);
        }
        request
    }
}

/// Yes/No classifier prompt: is `query` about `topic`?
#[derive(Debug, Clone)]
pub struct RelevancePrompt {
    /// The user's question.
    pub query: String,
    /// Description of the domain the assistant serves.
    pub topic: String,
}

impl RelevancePrompt {
    /// Create a new relevance prompt.
    pub fn new(query: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            topic: topic.into(),
        }
    }
}

impl PromptTemplate for RelevancePrompt {
    fn system_prompt(&self) -> Option<String> {
        Some(
            "You are a strict topic classifier. Decide whether a question belongs to \
             the given topic. Answer with exactly one word: Yes or No."
                .to_string(),
        )
    }

    fn params(&self) -> ModelParams {
        ModelParams::verdict()
    }

    fn generate(&self) -> String {
        format!(
            "Topic: {}\n\nQuestion: {}\n\nIs this question relevant to the topic? Answer Yes or No.",
            self.topic, self.query
        )
    }
}

/// Parse a classifier verdict.
///
/// Case-insensitive after trimming whitespace; anything other than exactly
/// "yes" is a negative verdict.
pub fn parse_verdict(response: &str) -> bool {
    response.trim().eq_ignore_ascii_case("yes")
}

/// Progressive conversation summary prompt.
///
/// Folds new lines of conversation into an existing summary.
#[derive(Debug, Clone)]
pub struct SummaryPrompt {
    /// Summary so far (empty on first compaction).
    pub summary: String,
    /// Rendered conversation lines to fold in.
    pub new_lines: String,
}

impl SummaryPrompt {
    /// Create a new summary prompt.
    pub fn new(summary: impl Into<String>, new_lines: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            new_lines: new_lines.into(),
        }
    }
}

impl PromptTemplate for SummaryPrompt {
    fn params(&self) -> ModelParams {
        ModelParams::default().with_max_tokens(512)
    }

    fn generate(&self) -> String {
        format!(
            r#"Progressively summarize the lines of conversation provided, adding onto the previous summary and returning a new summary. Keep the techniques, positions and goals the student mentioned.

Current summary:
{}

New lines of conversation:
{}

New summary:"#,
            self.summary, self.new_lines
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_prompt() {
        let prompt = RelevancePrompt::new("What is the capital of France?", "martial arts");
        let request = prompt.to_request();

        assert!(request.prompt.contains("capital of France"));
        assert!(request.prompt.contains("Topic: martial arts"));
        assert!(request.system.unwrap().contains("Yes or No"));
        assert_eq!(request.params, ModelParams::verdict());
    }

    #[test]
    fn test_parse_verdict() {
        assert!(parse_verdict("Yes"));
        assert!(parse_verdict("  yes\n"));
        assert!(parse_verdict("YES"));
        assert!(!parse_verdict("No"));
        assert!(!parse_verdict("Yes."));
        assert!(!parse_verdict("yes, it is"));
        assert!(!parse_verdict(""));
    }

    #[test]
    fn test_summary_prompt() {
        let prompt = SummaryPrompt::new("The student asked about mount.", "User: what about side control?");
        let generated = prompt.generate();
        assert!(generated.contains("The student asked about mount."));
        assert!(generated.contains("User: what about side control?"));
        assert!(prompt.system_prompt().is_none());
        assert_eq!(prompt.to_request().params.max_tokens, 512);
    }
}
