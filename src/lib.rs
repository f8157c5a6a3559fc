//! vizgen - text to SVG/HTML visualizations through the OpenRouter chat API
//!
//! A [`Visualizer`] takes a piece of text, a model id and an output format,
//! asks the model for visualization code, and returns the code block from
//! its answer. Around that single call it provides:
//!
//! - a result cache keyed by a stable fingerprint of the request, in memory
//!   and optionally on disk ([`CacheStore`]);
//! - retries with exponential backoff for transient failures, and fast
//!   failure for the rest ([`RetryConfig`]);
//! - per-model sampling settings and timeouts ([`ModelConfig`]);
//! - coalescing of concurrent identical requests;
//! - a rolling record of request latency and errors ([`PerformanceRecorder`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use vizgen::{OutputFormat, Visualizer};
//!
//! #[tokio::main]
//! async fn main() -> vizgen::Result<()> {
//!     let visualizer = Visualizer::builder()
//!         .openrouter("sk-or-your-key")
//!         .build()?;
//!
//!     let svg = visualizer
//!         .generate_visualization(
//!             "Revenue: Q1 120k, Q2 150k, Q3 90k, Q4 210k",
//!             "anthropic/claude-sonnet-4",
//!             OutputFormat::Svg,
//!         )
//!         .await?;
//!
//!     println!("{svg}");
//!     Ok(())
//! }
//! ```
//!
//! # Prompt templates
//!
//! ```rust
//! use vizgen::TemplateLibrary;
//!
//! let templates = TemplateLibrary::new();
//! let prompt = templates.render("timeline", "1969: moon landing\n1990: web");
//! assert!(prompt.contains("1969: moon landing"));
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod history;
pub mod monitor;
pub mod providers;
pub mod telemetry;
pub mod templates;
pub mod types;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheOptions, CacheStats, CacheStore, Storage};
pub use error::{Result, VizgenError};
pub use extract::{Extracted, extract_code};
pub use gateway::{Visualizer, VisualizerBuilder};
pub use history::{HistoryItem, HistoryStore, NewHistoryItem};
pub use monitor::{PerformanceRecorder, PerformanceSample, PerformanceStats};
pub use providers::{CompletionProvider, OpenRouterClient, RetryConfig};
pub use templates::{Template, TemplateLibrary};

// Re-export all types
pub use types::{
    ChatRequest, KnownModel, Message, ModelConfig, ModelTier, OutputFormat, Role,
    SystemPromptKind, VisualizationRequest,
};
