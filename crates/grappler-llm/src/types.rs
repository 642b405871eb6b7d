//! Request types shared by every backend.

use serde::{Deserialize, Serialize};

/// Sampling parameters for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    #[serde(default)]
    pub temperature: f32,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

impl ModelParams {
    /// Parameters for short, deterministic answers such as classifier verdicts.
    pub fn verdict() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4,
        }
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A fully assembled generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Optional system instructions.
    pub system: Option<String>,
    /// The user-facing prompt.
    pub prompt: String,
    /// Sampling parameters.
    pub params: ModelParams,
}

impl GenerationRequest {
    /// Create a request with default parameters and no system prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            params: ModelParams::default(),
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the sampling parameters.
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Total characters sent to the model.
    pub fn char_len(&self) -> usize {
        self.prompt.chars().count() + self.system.as_ref().map_or(0, |s| s.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("How do I escape mount?")
            .with_system("You are a coach.")
            .with_params(ModelParams::default().with_temperature(5.0).with_max_tokens(256));

        assert_eq!(request.system.as_deref(), Some("You are a coach."));
        assert_eq!(request.params.temperature, 2.0);
        assert_eq!(request.params.max_tokens, 256);
        assert_eq!(request.char_len(), 22 + 16);
    }

    #[test]
    fn test_params_deserialize_defaults() {
        let params: ModelParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, ModelParams::default());
    }
}
