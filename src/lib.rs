//! Media Processor - a pipeline service for transforming media artifacts
//!
//! This library chains heterogeneous media operations (audio extraction,
//! transcription, summarization, speech synthesis, tempo change, YouTube
//! retrieval) behind a uniform stage contract. Each stage consumes an
//! artifact reference, invokes exactly one adapter, and produces a new
//! immutable artifact; clients compose pipelines by chaining references.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;

pub use adapters::Backends;
pub use config::Config;
pub use error::PipelineError;
pub use pipeline::LanguageMode;
pub use store::{Artifact, ArtifactKind, ArtifactStore};

/// Result type used throughout the binary's setup paths
pub type Result<T> = anyhow::Result<T>;
