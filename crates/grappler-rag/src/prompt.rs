//! Prompt assembly: persona template + history + retrieved context.

use crate::config::PromptConfig;
use crate::error::TemplateError;
use crate::memory::Turn;
use grappler_index::RetrievalResult;
use grappler_llm::{GenerationRequest, ModelParams};

/// The named slots a persona template must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    History,
    Context,
    Question,
}

impl Slot {
    const ALL: [Slot; 3] = [Slot::History, Slot::Context, Slot::Question];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::History => "history",
            Slot::Context => "context",
            Slot::Question => "question",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// A persona template with validated slots.
///
/// The text must contain `{history}`, `{context}` and `{question}` exactly
/// once each. `{{` and `}}` render as literal braces. Any other `{name}` is
/// rejected, so a typo fails at startup rather than after an LLM call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaTemplate {
    segments: Vec<Segment>,
    literal_chars: usize,
}

impl PersonaTemplate {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().enumerate().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, ch)) => name.push(ch),
                            None => return Err(TemplateError::Unclosed(pos)),
                        }
                    }
                    let slot = Slot::parse(name.trim())
                        .ok_or_else(|| TemplateError::UnknownSlot(name.clone()))?;
                    if segments.contains(&Segment::Slot(slot)) {
                        return Err(TemplateError::DuplicateSlot(slot.name()));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                '}' => return Err(TemplateError::Unmatched(pos)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        for slot in Slot::ALL {
            if !segments.contains(&Segment::Slot(slot)) {
                return Err(TemplateError::MissingSlot(slot.name()));
            }
        }

        let literal_chars = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.chars().count(),
                Segment::Slot(_) => 0,
            })
            .sum();

        Ok(Self {
            segments,
            literal_chars,
        })
    }

    /// Fill every slot. Empty values render as empty strings.
    pub fn render(&self, history: &str, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(
            self.literal_chars + history.len() + context.len() + question.len(),
        );
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(Slot::History) => out.push_str(history),
                Segment::Slot(Slot::Context) => out.push_str(context),
                Segment::Slot(Slot::Question) => out.push_str(question),
            }
        }
        out
    }

    /// Characters contributed by the template itself.
    pub fn literal_chars(&self) -> usize {
        self.literal_chars
    }
}

impl std::str::FromStr for PersonaTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Character length of `items` joined with single newlines.
fn joined_len(lengths: &[usize]) -> usize {
    match lengths.len() {
        0 => 0,
        n => lengths.iter().sum::<usize>() + n - 1,
    }
}

/// Builds generation requests from persona, history, passages and question.
///
/// When the rendered prompt would exceed `max_prompt_chars`, the oldest
/// history turns go first, then the lowest-ranked passages. The persona and
/// the question are always kept, even if they alone exceed the budget.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: PersonaTemplate,
    max_prompt_chars: usize,
    params: ModelParams,
}

impl PromptAssembler {
    pub fn new(persona: PersonaTemplate, max_prompt_chars: usize) -> Self {
        Self {
            persona,
            max_prompt_chars,
            params: ModelParams::default(),
        }
    }

    pub fn from_config(config: &PromptConfig) -> Result<Self, TemplateError> {
        Ok(Self::new(
            PersonaTemplate::parse(&config.persona)?,
            config.max_prompt_chars,
        ))
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    pub fn persona(&self) -> &PersonaTemplate {
        &self.persona
    }

    pub fn assemble(
        &self,
        history: &[Turn],
        passages: &RetrievalResult,
        question: &str,
    ) -> GenerationRequest {
        let lines: Vec<String> = history.iter().map(Turn::render).collect();
        let texts = passages.texts();

        let line_lens: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        let text_lens: Vec<usize> = texts.iter().map(|t| t.chars().count()).collect();
        let fixed = self.persona.literal_chars() + question.chars().count();

        // Oldest history first, then lowest-ranked passages.
        let mut first_line = 0;
        let mut passage_count = texts.len();
        let total = |first_line: usize, passage_count: usize| {
            fixed + joined_len(&line_lens[first_line..]) + joined_len(&text_lens[..passage_count])
        };
        while total(first_line, passage_count) > self.max_prompt_chars {
            if first_line < lines.len() {
                first_line += 1;
            } else if passage_count > 0 {
                passage_count -= 1;
            } else {
                break;
            }
        }

        if first_line > 0 || passage_count < texts.len() {
            tracing::debug!(
                dropped_turns = first_line,
                dropped_passages = texts.len() - passage_count,
                budget = self.max_prompt_chars,
                "prompt truncated"
            );
        }

        let history_block = lines[first_line..].join("\n");
        let context_block = texts[..passage_count].join("\n");
        let prompt = self.persona.render(&history_block, &context_block, question);

        GenerationRequest::new(prompt).with_params(self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grappler_index::{Passage, ScoredPassage};

    const TEMPLATE: &str = "H[{history}] C[{context}] Q[{question}]";

    fn passages(texts: &[&str]) -> RetrievalResult {
        RetrievalResult::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| ScoredPassage {
                    passage: Passage::new(*t, 0),
                    score: 1.0 - i as f32 * 0.1,
                    ordinal: i,
                })
                .collect(),
        )
    }

    #[test]
    fn test_slots_required() {
        assert_eq!(
            PersonaTemplate::parse("{context} {question}").unwrap_err(),
            TemplateError::MissingSlot("history")
        );
        assert_eq!(
            PersonaTemplate::parse("{history} {context} {question} {history}").unwrap_err(),
            TemplateError::DuplicateSlot("history")
        );
        assert_eq!(
            PersonaTemplate::parse("{history} {context} {questoin}").unwrap_err(),
            TemplateError::UnknownSlot("questoin".to_string())
        );
        assert_eq!(
            PersonaTemplate::parse("{history} {context} {question").unwrap_err(),
            TemplateError::Unclosed(20)
        );
        assert_eq!(
            PersonaTemplate::parse("} {history} {context} {question}").unwrap_err(),
            TemplateError::Unmatched(0)
        );
    }

    #[test]
    fn test_escaped_braces() {
        let template = PersonaTemplate::parse("{{json}} {history}{context}{question}").unwrap();
        assert_eq!(template.render("h", "c", "q"), "{json} hcq");
        assert_eq!(template.literal_chars(), 7);
    }

    #[test]
    fn test_default_persona_parses() {
        let assembler = PromptAssembler::from_config(&PromptConfig::default()).unwrap();
        let request = assembler.assemble(&[], &RetrievalResult::default(), "How do I escape mount?");
        assert!(request.prompt.contains("Question: How do I escape mount?"));
        assert!(request.system.is_none());
    }

    #[test]
    fn test_assemble_orders_and_labels() {
        let assembler = PromptAssembler::new(PersonaTemplate::parse(TEMPLATE).unwrap(), 10_000);
        let history = vec![Turn::user("q1"), Turn::assistant("a1")];

        let request = assembler.assemble(&history, &passages(&["best", "second"]), "q2");
        assert_eq!(request.prompt, "H[User: q1\nAssistant: a1] C[best\nsecond] Q[q2]");
    }

    #[test]
    fn test_empty_slots_render_empty() {
        let assembler = PromptAssembler::new(PersonaTemplate::parse(TEMPLATE).unwrap(), 10_000);
        let request = assembler.assemble(&[], &RetrievalResult::default(), "q");
        assert_eq!(request.prompt, "H[] C[] Q[q]");
    }

    #[test]
    fn test_truncates_history_before_passages() {
        let template = PersonaTemplate::parse(TEMPLATE).unwrap();
        let history = vec![Turn::user("old"), Turn::assistant("mid"), Turn::user("new")];
        let ctx = passages(&["p1", "p2"]);

        let full = PromptAssembler::new(template.clone(), 10_000)
            .assemble(&history, &ctx, "q")
            .prompt;
        let full_len = full.chars().count();

        // Dropping "User: old\n" (10 chars) is enough.
        let request = PromptAssembler::new(template.clone(), full_len - 1).assemble(&history, &ctx, "q");
        assert_eq!(request.prompt, "H[Assistant: mid\nUser: new] C[p1\np2] Q[q]");

        // No history fits; then the lowest-ranked passage goes.
        let budget = "H[] C[p1] Q[q]".chars().count();
        let request = PromptAssembler::new(template.clone(), budget).assemble(&history, &ctx, "q");
        assert_eq!(request.prompt, "H[] C[p1] Q[q]");
    }

    #[test]
    fn test_persona_and_question_always_kept() {
        let template = PersonaTemplate::parse(TEMPLATE).unwrap();
        let question = "a very long question that alone blows the budget";
        let request = PromptAssembler::new(template, 5).assemble(
            &[Turn::user("x")],
            &passages(&["p"]),
            question,
        );
        assert_eq!(request.prompt, format!("H[] C[] Q[{}]", question));
    }

    #[test]
    fn test_params_carried() {
        let params = ModelParams::default().with_max_tokens(77);
        let assembler =
            PromptAssembler::new(PersonaTemplate::parse(TEMPLATE).unwrap(), 100).with_params(params);
        let request = assembler.assemble(&[], &RetrievalResult::default(), "q");
        assert_eq!(request.params, params);
    }
}
