//! Visualization orchestration

mod builder;
mod visualizer;

pub use builder::{
    DEFAULT_BASE_TIMEOUT, DEFAULT_RESULT_TTL, DEFAULT_SWEEP_INTERVAL, VisualizerBuilder,
};
pub use visualizer::Visualizer;
