//! Provider trait for chat-completion backends.
//!
//! The [`Visualizer`](crate::Visualizer) only needs one capability from a
//! backend: turn a [`ChatRequest`] into the assistant's text. Keeping it
//! behind a trait lets tests (and alternative gateways) stand in for
//! OpenRouter.
//!
//! # Error contract
//!
//! Implementations classify failures into the network-class
//! [`VizgenError`](crate::VizgenError) variants (`Authentication`,
//! `InvalidRequest`, `RateLimited`, `Server`, `Timeout`, `Network`,
//! `MalformedResponse`). Retry decisions are made from that classification.

use async_trait::async_trait;

use crate::Result;
use crate::types::ChatRequest;

/// A chat-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// URL recorded in performance samples.
    fn endpoint(&self) -> &str;

    /// Send one completion request and return the assistant message content.
    ///
    /// Called once per attempt; the caller handles retries and the
    /// per-attempt deadline.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}
