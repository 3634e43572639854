use serde::{Deserialize, Serialize};

/// Message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instruction framing
    System,
    /// Caller input
    User,
    /// Model output
    Assistant,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request for one streamed generation
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "deepseek-v3.1:671b-cloud")
    pub model: String,
    /// Conversation to continue
    pub messages: Vec<Message>,
    /// Sampling and budget options
    pub options: GenerateOptions,
}

/// Sampling and token-budget options for a generation
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerateOptions {
    /// Sampling temperature
    pub temperature: f64,
    /// Token budget for the reply
    pub num_predict: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.01,
            num_predict: 100_000,
        }
    }
}

impl GenerateRequest {
    /// Create a request with default options
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: GenerateOptions::default(),
        }
    }

    /// Override the generation options
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

/// One streamed fragment of a generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Incremental text, possibly empty on the final chunk
    pub content: String,
    /// Set on the final chunk of a stream
    pub finish: Option<FinishReason>,
}

impl Chunk {
    /// A mid-stream text fragment
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish: None,
        }
    }

    /// A final chunk carrying the finish signal
    pub fn done(content: impl Into<String>, finish: FinishReason) -> Self {
        Self {
            content: content.into(),
            finish: Some(finish),
        }
    }
}

/// Why a generation stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model finished its reply
    Stop,
    /// The token budget cut the reply short; the caller may continue it
    Length,
}
