//! Public types for the vizgen API.

mod format;
mod message;
mod model;
mod prompt;
mod request;

pub use format::OutputFormat;
pub use message::{ChatRequest, Message, Role};
pub use model::{KnownModel, ModelConfig, ModelTier};
pub use prompt::SystemPromptKind;
pub use request::{DEFAULT_MAX_PROMPT_CHARS, VisualizationRequest};
