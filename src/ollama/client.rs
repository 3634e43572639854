use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Chunk, FinishReason, GenerateOptions, GenerateRequest, Message};
use super::{ChunkStream, GenerationClient};
use crate::config::{OllamaConfig, RequestConfig};
use crate::error::{GenerateError, GenerateResult};

/// Client for Ollama-compatible `/api/chat` endpoints.
///
/// Requests are always streamed; the response body is NDJSON, one chunk
/// object per line. No whole-request timeout is set because generations can
/// legitimately run for minutes; only connection establishment is bounded.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    api_key: String,
    connect_timeout_ms: u64,
}

/// Wire format of the chat request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: GenerateOptions,
}

/// Wire format of one NDJSON line of the streamed response
#[derive(Debug, Deserialize)]
struct ChatStreamLine {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    /// Create a new client for the configured endpoint
    pub fn new(config: &OllamaConfig, request_config: RequestConfig) -> GenerateResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(request_config.connect_timeout_ms))
            .build()
            .map_err(|e| GenerateError::Transport {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            connect_timeout_ms: request_config.connect_timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> GenerateResult<ChunkStream> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            options: request.options,
        };

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Starting streamed generation"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    GenerateError::Timeout {
                        timeout_ms: self.connect_timeout_ms,
                    }
                } else {
                    GenerateError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Model {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let bytes = response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed();
        Ok(Box::pin(decode_chunks(bytes)))
    }
}

/// Decode an NDJSON byte stream into [`Chunk`]s.
///
/// Network frames align with neither lines nor character boundaries, so raw
/// bytes are buffered until a newline and each complete line is validated as
/// UTF-8 on its own; a multi-byte character split across frames stays
/// intact. A non-empty trailing buffer at end of stream is parsed as a
/// final line.
fn decode_chunks<S>(inner: S) -> impl Stream<Item = GenerateResult<Chunk>> + Send
where
    S: Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send + Unpin + 'static,
{
    struct DecodeState<S> {
        inner: S,
        buf: Vec<u8>,
        queued: VecDeque<GenerateResult<Chunk>>,
        finished: bool,
    }

    let state = DecodeState {
        inner,
        buf: Vec::new(),
        queued: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.queued.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    st.buf.extend_from_slice(&bytes);
                    while let Some(pos) = st.buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = st.buf.drain(..=pos).collect();
                        if let Some(item) = parse_line_bytes(&line) {
                            st.queued.push_back(item);
                        }
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.queued.push_back(Err(GenerateError::Transport {
                        message: e.to_string(),
                    }));
                }
                None => {
                    st.finished = true;
                    let tail = std::mem::take(&mut st.buf);
                    if let Some(item) = parse_line_bytes(&tail) {
                        st.queued.push_back(item);
                    }
                }
            }
        }
    })
}

/// Validate one buffered line as UTF-8 and parse it; blank lines yield `None`.
fn parse_line_bytes(line: &[u8]) -> Option<GenerateResult<Chunk>> {
    match std::str::from_utf8(line) {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(parse_line(text))
            }
        }
        Err(e) => Some(Err(GenerateError::InvalidChunk {
            message: format!("invalid utf-8 in stream line: {e}"),
        })),
    }
}

fn parse_line(line: &str) -> GenerateResult<Chunk> {
    let wire: ChatStreamLine =
        serde_json::from_str(line).map_err(|e| GenerateError::InvalidChunk {
            message: format!("{e}: {line}"),
        })?;

    let finish = if wire.done {
        Some(match wire.done_reason.as_deref() {
            Some("length") => FinishReason::Length,
            _ => FinishReason::Stop,
        })
    } else {
        None
    };

    Ok(Chunk {
        content: wire.message.map(|m| m.content).unwrap_or_default(),
        finish,
    })
}
