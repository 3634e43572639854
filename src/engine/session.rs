use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, EngineConfig, GenerationConfig};
use crate::error::{EngineResult, GenerateError, GenerateResult};
use crate::ollama::{GenerateOptions, GenerateRequest, GenerationClient, Message};
use crate::prompts;
use crate::sink::ProgressSink;

/// Author of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction framing
    System,
    /// Caller input
    User,
    /// Model output
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One committed turn of a session transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn
    pub role: Role,
    /// Full text of the turn
    pub text: String,
    /// When the turn was committed
    pub at: DateTime<Utc>,
}

impl Turn {
    /// Create an assistant turn committed now
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Session lifecycle state.
///
/// Transitions are monotonic: `InProgress` moves to exactly one terminal
/// state and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Further steps may be taken
    InProgress,
    /// A committed turn contained the solved sentinel
    Solved,
    /// The depth budget ran out without a sentinel
    Exhausted,
    /// A step failed for every candidate
    Failed,
    /// Cancellation was observed before a step
    Cancelled,
}

impl SessionStatus {
    /// Whether the session has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Solved => write!(f, "solved"),
            SessionStatus::Exhausted => write!(f, "exhausted"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How solved-sentinel detection is performed on generated text.
///
/// Matching is substring containment; the pattern and case sensitivity are
/// policy, not hard-coded protocol.
#[derive(Debug, Clone)]
pub struct SentinelPolicy {
    pattern: String,
    case_insensitive: bool,
}

impl SentinelPolicy {
    /// Create a case-sensitive policy for `pattern`
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    /// Toggle case-insensitive matching
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// The sentinel pattern, as embedded into continuation prompts
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `text` contains the sentinel
    pub fn matches(&self, text: &str) -> bool {
        if self.case_insensitive {
            text.to_lowercase().contains(&self.pattern.to_lowercase())
        } else {
            text.contains(&self.pattern)
        }
    }
}

impl Default for SentinelPolicy {
    fn default() -> Self {
        Self::new("Solved the problem")
    }
}

impl From<&EngineConfig> for SentinelPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self::new(&config.sentinel).case_insensitive(config.sentinel_case_insensitive)
    }
}

/// Depth and width budgets for one session
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Maximum number of committed reasoning steps
    pub max_depth: u32,
    /// Candidate continuations considered per step
    pub max_width: u32,
}

impl SessionLimits {
    /// Create limits from explicit budgets; both are clamped to at least 1.
    pub fn new(max_depth: u32, max_width: u32) -> Self {
        Self {
            max_depth: max_depth.max(1),
            max_width: max_width.max(1),
        }
    }
}

impl From<&EngineConfig> for SessionLimits {
    fn from(config: &EngineConfig) -> Self {
        Self::new(config.max_depth, config.max_width)
    }
}

/// Cloneable cancellation flag for a session.
///
/// The external owner requests cancellation between steps; the flag is
/// checked at the top of each `advance` call. No in-flight generation is
/// force-aborted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Create an unset handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation before the next step
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State of one bounded reasoning run.
///
/// Exclusively owned by its driving task; all mutation goes through
/// [`ReasoningEngine::advance`]. The transcript is append-only and turns
/// are never edited once committed.
#[derive(Debug)]
pub struct ReasoningSession {
    id: String,
    query: String,
    transcript: Vec<Turn>,
    depth: u32,
    status: SessionStatus,
    limits: SessionLimits,
    cancel: CancelHandle,
}

impl ReasoningSession {
    /// Create a fresh in-progress session for `query`
    pub fn new(query: impl Into<String>, limits: SessionLimits) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            transcript: Vec::new(),
            depth: 0,
            status: SessionStatus::InProgress,
            limits,
            cancel: CancelHandle::new(),
        }
    }

    /// Unique session identifier, used to key Progress Sink output
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The immutable problem statement
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Committed turns, in commit order
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Number of committed reasoning steps
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Current lifecycle state
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Budgets this session runs under
    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Handle the external owner can use to cancel between steps
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Sink key for streamed reasoning output
    pub fn context_key(&self) -> String {
        format!("{}/context", self.id)
    }

    /// Sink key for streamed article output
    pub fn article_key(&self) -> String {
        format!("{}/article", self.id)
    }
}

/// One attempted continuation within a step, before selection.
/// Not persisted beyond the step that produced it.
struct Candidate {
    slot: u32,
    response_text: String,
    /// Buffered chunks, present only when the candidate was not streamed live
    chunks: Vec<String>,
    streamed_live: bool,
}

/// Drives [`ReasoningSession`]s against a generation client and a sink.
///
/// The engine itself is stateless across sessions and may be shared; each
/// session must still be advanced by a single task at a time.
pub struct ReasoningEngine {
    pub(super) client: Arc<dyn GenerationClient>,
    pub(super) sink: Arc<dyn ProgressSink>,
    pub(super) model: String,
    pub(super) options: GenerateOptions,
    pub(super) sentinel: SentinelPolicy,
    pub(super) synthesis_max_rounds: u32,
}

impl ReasoningEngine {
    /// Create an engine with default model, options and policies
    pub fn new(client: Arc<dyn GenerationClient>, sink: Arc<dyn ProgressSink>) -> Self {
        let generation = GenerationConfig::default();
        Self {
            client,
            sink,
            model: generation.model,
            options: GenerateOptions {
                temperature: generation.temperature,
                num_predict: generation.num_predict,
            },
            sentinel: SentinelPolicy::default(),
            synthesis_max_rounds: EngineConfig::default().synthesis_max_rounds,
        }
    }

    /// Create an engine from loaded configuration
    pub fn from_config(
        client: Arc<dyn GenerationClient>,
        sink: Arc<dyn ProgressSink>,
        config: &Config,
    ) -> Self {
        Self {
            client,
            sink,
            model: config.generation.model.clone(),
            options: GenerateOptions {
                temperature: config.generation.temperature,
                num_predict: config.generation.num_predict,
            },
            sentinel: SentinelPolicy::from(&config.engine),
            synthesis_max_rounds: config.engine.synthesis_max_rounds,
        }
    }

    /// Override the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override generation options
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the sentinel detection policy
    pub fn with_sentinel(mut self, sentinel: SentinelPolicy) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Override the article continuation safety bound
    pub fn with_synthesis_max_rounds(mut self, rounds: u32) -> Self {
        self.synthesis_max_rounds = rounds;
        self
    }

    /// Perform one reasoning step.
    ///
    /// Returns the committed turn, or `None` when the session is already
    /// terminal (including freshly observed cancellation) - a no-op that
    /// leaves transcript and depth untouched. On a step where every
    /// candidate fails, the session transitions to `Failed`, nothing is
    /// committed, and the last generation error is returned.
    pub async fn advance(&self, session: &mut ReasoningSession) -> EngineResult<Option<Turn>> {
        if session.status.is_terminal() {
            debug!(session_id = %session.id, status = %session.status, "advance on terminal session is a no-op");
            return Ok(None);
        }
        if session.cancel.is_cancelled() {
            session.status = SessionStatus::Cancelled;
            info!(session_id = %session.id, depth = session.depth, "Session cancelled");
            return Ok(None);
        }

        let start = Instant::now();
        let width = session.limits.max_width.max(1);
        // With a single candidate its chunks go to the sink as they arrive;
        // with several, chunks are buffered and only the selected
        // candidate's are forwarded, preserving per-step stream ordering.
        let live = width == 1;

        let mut selected: Option<Candidate> = None;
        let mut first_success: Option<Candidate> = None;
        let mut last_error: Option<GenerateError> = None;

        for slot in 0..width {
            let prompt = if session.depth == 0 {
                prompts::build_initial_prompt(&session.query, width)
            } else {
                prompts::build_continuation_prompt(
                    &session.transcript,
                    &session.query,
                    width,
                    self.sentinel.pattern(),
                )
            };

            match self.run_candidate(session, slot, prompt, live).await {
                Ok(candidate) => {
                    if self.sentinel.matches(&candidate.response_text) {
                        selected = Some(candidate);
                        break;
                    }
                    if first_success.is_none() {
                        first_success = Some(candidate);
                    }
                }
                Err(e) => {
                    warn!(
                        session_id = %session.id,
                        slot,
                        error = %e,
                        "Candidate generation failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        // First candidate containing the sentinel wins, else first produced
        let candidate = match selected.or(first_success) {
            Some(c) => c,
            None => {
                session.status = SessionStatus::Failed;
                let err = last_error.unwrap_or(GenerateError::Transport {
                    message: "no candidate produced".to_string(),
                });
                error!(
                    session_id = %session.id,
                    depth = session.depth,
                    error = %err,
                    "Reasoning step failed for all candidates"
                );
                return Err(err.into());
            }
        };

        if !candidate.streamed_live {
            let key = session.context_key();
            for chunk in &candidate.chunks {
                self.sink.publish(&key, chunk);
            }
        }

        let turn = Turn::assistant(candidate.response_text);
        session.transcript.push(turn.clone());
        session.depth += 1;

        if self.sentinel.matches(&turn.text) {
            session.status = SessionStatus::Solved;
        } else if session.depth >= session.limits.max_depth {
            session.status = SessionStatus::Exhausted;
        }

        info!(
            session_id = %session.id,
            depth = session.depth,
            slot = candidate.slot,
            status = %session.status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Reasoning step committed"
        );

        Ok(Some(turn))
    }

    /// Repeatedly [`advance`](Self::advance) until a terminal status.
    pub async fn run(&self, session: &mut ReasoningSession) -> EngineResult<SessionStatus> {
        while self.advance(session).await?.is_some() {}
        Ok(session.status())
    }

    /// The full loop as a lazy stream of committed turns.
    ///
    /// Each item is produced as its step completes, so a caller can stream
    /// output without waiting for the terminal status. The stream ends when
    /// the session turns terminal; a failed step yields the error as the
    /// final item.
    pub fn turns<'a>(
        &'a self,
        session: &'a mut ReasoningSession,
    ) -> impl Stream<Item = EngineResult<Turn>> + 'a {
        futures::stream::try_unfold((self, session), |(engine, session)| async move {
            match engine.advance(session).await? {
                Some(turn) => Ok(Some((turn, (engine, session)))),
                None => Ok(None),
            }
        })
    }

    /// Run one candidate generation to completion, collecting its text.
    async fn run_candidate(
        &self,
        session: &ReasoningSession,
        slot: u32,
        prompt: String,
        live: bool,
    ) -> GenerateResult<Candidate> {
        debug!(
            session_id = %session.id,
            slot,
            prompt_len = prompt.len(),
            "Running candidate generation"
        );

        let request = GenerateRequest::new(&self.model, vec![Message::user(prompt)])
            .with_options(self.options);
        let mut stream = self.client.generate(request).await?;

        let key = session.context_key();
        let mut response_text = String::new();
        let mut chunks = Vec::new();

        while let Some(item) = stream.next().await {
            let chunk = item?;
            if !chunk.content.is_empty() {
                response_text.push_str(&chunk.content);
                if live {
                    self.sink.publish(&key, &chunk.content);
                } else {
                    chunks.push(chunk.content);
                }
            }
            if chunk.finish.is_some() {
                break;
            }
        }

        Ok(Candidate {
            slot,
            response_text,
            chunks,
            streamed_live: live,
        })
    }
}
