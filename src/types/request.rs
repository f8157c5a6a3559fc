//! A single visualization request

use serde::{Deserialize, Serialize};

use super::OutputFormat;
use crate::{Result, VizgenError};

/// Default upper bound on prompt length, in characters.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 8000;

/// What to visualize, with which model, in which format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationRequest {
    pub prompt: String,
    pub model: String,
    pub format: OutputFormat,
}

impl VisualizationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            format,
        }
    }

    /// Prompt length in characters (not bytes).
    pub fn prompt_chars(&self) -> usize {
        self.prompt.chars().count()
    }

    /// Check the prompt is non-blank and at most `max_chars` characters.
    pub fn validate(&self, max_chars: usize) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(VizgenError::EmptyPrompt);
        }
        let len = self.prompt_chars();
        if len > max_chars {
            return Err(VizgenError::InputTooLong {
                len,
                max: max_chars,
            });
        }
        Ok(())
    }

    /// Copy of this request with the prompt cut to `max_chars` characters.
    pub fn truncated(&self, max_chars: usize) -> Self {
        let prompt = match self.prompt.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => self.prompt[..byte_idx].to_string(),
            None => self.prompt.clone(),
        };
        Self {
            prompt,
            ..self.clone()
        }
    }
}
