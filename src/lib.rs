//! # Ollama Reasoning Engine
//!
//! A bounded iterative reasoning engine that drives streamed generations
//! against an Ollama-compatible endpoint, accumulating a transcript over a
//! depth/width budgeted search and terminating on a solved sentinel.
//!
//! ## Features
//!
//! - **Bounded search loop**: up to `max_width` candidate continuations per
//!   step, at most `max_depth` committed steps per session
//! - **Sentinel termination**: configurable substring policy detecting a
//!   solved declaration in generated text
//! - **Streaming**: generation chunks are pushed to a pluggable
//!   [`sink::ProgressSink`] as they arrive
//! - **Article synthesis**: folds a finished transcript into a narrative
//!   document, continuing across token-budget cutoffs under a safety bound
//! - **Cancellation**: a cloneable handle cancels a session between steps
//!
//! ## Architecture
//!
//! ```text
//! Caller → ReasoningEngine → GenerationClient (Ollama NDJSON stream)
//!               ↓
//!          ProgressSink (stdout / files / memory)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ollama_reasoning::{Config, ReasoningEngine, ReasoningSession, SessionLimits};
//! use ollama_reasoning::ollama::OllamaClient;
//! use ollama_reasoning::sink::StdoutSink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = Arc::new(OllamaClient::new(&config.ollama, config.request.clone())?);
//!     let engine = ReasoningEngine::from_config(client, Arc::new(StdoutSink), &config);
//!     let mut session = ReasoningSession::new("2+2=?", SessionLimits::from(&config.engine));
//!     let status = engine.run(&mut session).await?;
//!     println!("finished: {status}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management loaded from the environment.
pub mod config;
/// Reasoning session orchestration and article synthesis.
pub mod engine;
/// Error types and result aliases.
pub mod error;
/// Generation client trait and the Ollama streaming implementation.
pub mod ollama;
/// Prompt rendering for reasoning steps and article synthesis.
pub mod prompts;
/// Progress sinks receiving streamed output.
pub mod sink;

pub use config::Config;
pub use engine::{
    CancelHandle, ReasoningEngine, ReasoningSession, Role, SentinelPolicy, SessionLimits,
    SessionStatus, Turn,
};
pub use error::{EngineError, EngineResult, GenerateError, SynthesisError};
