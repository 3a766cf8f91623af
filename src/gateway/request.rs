use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider to echo the prompt in front of the completion.
    pub return_full_text: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            return_full_text: false,
        }
    }
}

impl GenerationOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_full_text(mut self, return_full_text: bool) -> Self {
        self.return_full_text = return_full_text;
        self
    }
}

/// One validated prompt plus its generation parameters. Built per call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    prompt_text: String,
    options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(prompt_text: impl Into<String>, options: GenerationOptions) -> GatewayResult<Self> {
        let prompt_text = prompt_text.into();
        if prompt_text.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "prompt text must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&options.temperature) {
            return Err(GatewayError::Configuration(format!(
                "temperature {} outside [0, 1]",
                options.temperature
            )));
        }
        if options.max_tokens == 0 {
            return Err(GatewayError::Configuration(
                "max tokens must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            prompt_text,
            options,
        })
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn temperature(&self) -> f32 {
        self.options.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.options.max_tokens
    }

    pub fn return_full_text(&self) -> bool {
        self.options.return_full_text
    }

    pub fn options(&self) -> GenerationOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_prompt() {
        let err = GenerationRequest::new("   ", GenerationOptions::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn rejects_out_of_range_options() {
        let hot = GenerationOptions::default().with_temperature(1.5);
        assert!(GenerationRequest::new("score this", hot).is_err());

        let empty = GenerationOptions::default().with_max_tokens(0);
        assert!(GenerationRequest::new("score this", empty).is_err());
    }

    #[test]
    fn keeps_options() {
        let options = GenerationOptions::default()
            .with_temperature(0.0)
            .with_max_tokens(1000)
            .with_full_text(true);
        let request = GenerationRequest::new("explain", options).unwrap();
        assert_eq!(request.prompt_text(), "explain");
        assert_eq!(request.max_tokens(), 1000);
        assert!(request.return_full_text());
        assert_eq!(request.temperature(), 0.0);
    }
}
