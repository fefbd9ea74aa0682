//! Tee pipeline orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{TeePipeline, TeePipelineConfig};
pub use stats::TeeStats;
