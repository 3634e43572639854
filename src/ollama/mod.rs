//! Generation client for Ollama-compatible chat endpoints.
//!
//! The engine talks to the capability only through the [`GenerationClient`]
//! trait, which yields a lazy stream of [`Chunk`]s. [`OllamaClient`] is the
//! concrete implementation speaking the `/api/chat` NDJSON streaming
//! protocol; tests substitute scripted stubs.

mod client;
mod types;

pub use client::OllamaClient;
pub use types::{Chunk, FinishReason, GenerateOptions, GenerateRequest, Message, MessageRole};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::GenerateResult;

/// Lazy sequence of generation chunks.
pub type ChunkStream = BoxStream<'static, GenerateResult<Chunk>>;

/// Abstract text-generation capability.
///
/// `generate` performs no retries; transport and model rejections surface as
/// [`crate::error::GenerateError`] either from the call itself or from
/// items of the returned stream.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Start a generation and return its chunk stream.
    async fn generate(&self, request: GenerateRequest) -> GenerateResult<ChunkStream>;
}
