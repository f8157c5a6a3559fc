//! Chat-completion providers.
//!
//! [`CompletionProvider`] is the seam between the orchestrator and the
//! network; [`OpenRouterClient`] is the production implementation.
//! [`RetryConfig`] and the shared retry helper live in [`retry`].

pub mod openrouter;
pub mod retry;
pub mod traits;

pub use openrouter::OpenRouterClient;
pub use retry::RetryConfig;
pub use traits::CompletionProvider;
