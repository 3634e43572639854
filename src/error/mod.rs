use thiserror::Error;

/// Engine-level errors surfaced by session orchestration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },

    /// A reasoning step failed because generation failed
    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),

    /// Invariant violation inside the engine
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

/// Generation client errors.
///
/// `Transport` and `Timeout` mean the capability could not be reached;
/// `Model` means it was reached and rejected the request. Callers use the
/// distinction to decide whether retrying with different parameters makes
/// sense. The client itself never retries.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Network-level failure before or during the stream
    #[error("Generation endpoint unreachable: {message}")]
    Transport {
        /// Underlying transport error
        message: String,
    },

    /// The endpoint answered with a non-success status
    #[error("Model rejected request: {status} - {message}")]
    Model {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// A stream line could not be decoded
    #[error("Invalid stream chunk: {message}")]
    InvalidChunk {
        /// Decode error and the offending line
        message: String,
    },

    /// Connection establishment exceeded its budget
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// The configured timeout
        timeout_ms: u64,
    },
}

/// Article synthesis errors.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The continuation safety bound was hit while the capability kept
    /// signalling an incomplete document. Carries the partial draft so the
    /// caller can inspect or keep it.
    #[error("Synthesis continuation bound hit after {rounds} rounds")]
    Runaway {
        /// Rounds performed before giving up
        rounds: u32,
        /// The document accumulated so far
        partial: String,
    },

    /// A synthesis round failed because generation failed
    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for generation client operations
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Result type alias for article synthesis
pub type SynthesisResult<T> = Result<T, SynthesisError>;
