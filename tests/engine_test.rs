//! Integration tests for the reasoning loop and article synthesis,
//! driven by scripted generation stubs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use ollama_reasoning::engine::{
    ReasoningEngine, ReasoningSession, Role, SentinelPolicy, SessionLimits, SessionStatus,
};
use ollama_reasoning::error::{EngineError, GenerateError, GenerateResult, SynthesisError};
use ollama_reasoning::ollama::{Chunk, ChunkStream, FinishReason, GenerateRequest, GenerationClient};
use ollama_reasoning::sink::{MemorySink, NullSink};

/// One item of a scripted chunk stream.
#[derive(Clone)]
enum Item {
    Chunk(Chunk),
    StreamError(&'static str),
}

impl Item {
    fn into_result(self) -> GenerateResult<Chunk> {
        match self {
            Item::Chunk(chunk) => Ok(chunk),
            Item::StreamError(message) => Err(GenerateError::Transport {
                message: message.to_string(),
            }),
        }
    }
}

/// One scripted generation outcome.
#[derive(Clone)]
enum Script {
    /// A stream of items, possibly ending in a mid-stream error
    Reply(Vec<Item>),
    /// The call itself fails before any chunk
    Fail(&'static str),
}

impl Script {
    /// A complete reply delivered as two chunks plus a stop marker
    fn reply(text: &'static str) -> Self {
        let (head, tail) = text.split_at(text.len() / 2);
        Script::Reply(vec![
            Item::Chunk(Chunk::text(head)),
            Item::Chunk(Chunk::text(tail)),
            Item::Chunk(Chunk::done("", FinishReason::Stop)),
        ])
    }

    /// A reply cut short by the token budget
    fn reply_cut(text: &'static str) -> Self {
        Script::Reply(vec![
            Item::Chunk(Chunk::text(text)),
            Item::Chunk(Chunk::done("", FinishReason::Length)),
        ])
    }

    /// A stream that errors out after some text
    fn broken(text: &'static str) -> Self {
        Script::Reply(vec![
            Item::Chunk(Chunk::text(text)),
            Item::StreamError("stream reset"),
        ])
    }
}

/// Generation stub replaying scripts in order; once the queue is empty the
/// last script repeats, which models a capability that keeps answering the
/// same way.
struct ScriptedClient {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Script,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        let queue: VecDeque<Script> = scripts.into();
        let fallback = queue
            .back()
            .cloned()
            .unwrap_or(Script::Fail("script queue empty"));
        Arc::new(Self {
            scripts: Mutex::new(queue),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, _request: GenerateRequest) -> GenerateResult<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match script {
            Script::Reply(items) => Ok(Box::pin(futures::stream::iter(
                items.into_iter().map(Item::into_result),
            ))),
            Script::Fail(message) => Err(GenerateError::Transport {
                message: message.to_string(),
            }),
        }
    }
}

fn engine(client: Arc<ScriptedClient>) -> ReasoningEngine {
    ReasoningEngine::new(client, Arc::new(NullSink))
}

mod reasoning_loop {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_solved_on_first_call() {
        let client = ScriptedClient::new(vec![Script::reply(
            "Let me compute. Solved the problem: 4.",
        )]);
        let engine = engine(client.clone());
        let mut session = ReasoningSession::new("2+2=?", SessionLimits::new(5, 1));

        let turn = engine.advance(&mut session).await.unwrap().unwrap();

        assert_eq!(session.status(), SessionStatus::Solved);
        assert_eq!(session.depth(), 1);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.text, "Let me compute. Solved the problem: 4.");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_after_exactly_max_depth_steps() {
        let client = ScriptedClient::new(vec![Script::reply("still working on it")]);
        let engine = engine(client.clone());
        let mut session = ReasoningSession::new("hard problem", SessionLimits::new(3, 1));

        let status = engine.run(&mut session).await.unwrap();

        assert_eq!(status, SessionStatus::Exhausted);
        assert_eq!(session.depth(), 3);
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_advance_after_terminal_is_noop() {
        let client = ScriptedClient::new(vec![Script::reply("no luck")]);
        let engine = engine(client.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(2, 1));

        engine.run(&mut session).await.unwrap();
        let calls_before = client.calls();
        let transcript_before = session.transcript().len();

        let result = engine.advance(&mut session).await.unwrap();

        assert!(result.is_none());
        assert_eq!(client.calls(), calls_before);
        assert_eq!(session.transcript().len(), transcript_before);
        assert_eq!(session.depth(), 2);
    }

    #[tokio::test]
    async fn test_failed_step_preserves_transcript_and_depth() {
        let client = ScriptedClient::new(vec![
            Script::reply("made some progress"),
            Script::Fail("connection refused"),
        ]);
        let engine = engine(client.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 1));

        engine.advance(&mut session).await.unwrap();
        let err = engine.advance(&mut session).await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::Generate(GenerateError::Transport { .. })
        ));
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.depth(), 1);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].text, "made some progress");
    }

    #[tokio::test]
    async fn test_mid_stream_error_fails_the_step() {
        let client = ScriptedClient::new(vec![Script::broken("partial text then boom")]);
        let engine = engine(client.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 1));

        let err = engine.advance(&mut session).await.unwrap_err();

        assert!(matches!(err, EngineError::Generate(_)));
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.depth(), 0);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_checked_before_generation() {
        let client = ScriptedClient::new(vec![Script::reply("should never run")]);
        let engine = engine(client.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 1));

        session.cancel_handle().cancel();
        let result = engine.advance(&mut session).await.unwrap();

        assert!(result.is_none());
        assert_eq!(session.status(), SessionStatus::Cancelled);
        assert_eq!(client.calls(), 0);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_turns_stream_yields_each_committed_turn() {
        let client = ScriptedClient::new(vec![Script::reply("thinking")]);
        let engine = engine(client);
        let mut session = ReasoningSession::new("q", SessionLimits::new(3, 1));

        let turns: Vec<_> = engine.turns(&mut session).collect().await;

        assert_eq!(turns.len(), 3);
        for turn in &turns {
            assert_eq!(turn.as_ref().unwrap().text, "thinking");
        }
        assert_eq!(session.status(), SessionStatus::Exhausted);
    }

    #[tokio::test]
    async fn test_custom_sentinel_policy() {
        let client = ScriptedClient::new(vec![Script::reply("status: EUREKA, done.")]);
        let engine = ReasoningEngine::new(client, Arc::new(NullSink))
            .with_sentinel(SentinelPolicy::new("eureka").case_insensitive(true));
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 1));

        engine.advance(&mut session).await.unwrap();

        assert_eq!(session.status(), SessionStatus::Solved);
    }
}

mod candidate_selection {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_first_sentinel_candidate_wins_and_stops_fanout() {
        let client = ScriptedClient::new(vec![
            Script::reply("alpha keeps going"),
            Script::reply("beta: Solved the problem."),
            Script::reply("gamma never consulted"),
        ]);
        let sink = Arc::new(MemorySink::new());
        let engine = ReasoningEngine::new(client.clone(), sink.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 3));

        let turn = engine.advance(&mut session).await.unwrap().unwrap();

        assert_eq!(turn.text, "beta: Solved the problem.");
        assert_eq!(session.status(), SessionStatus::Solved);
        // The third candidate is never attempted once the sentinel is found
        assert_eq!(client.calls(), 2);
        // Only the selected candidate's chunks reach the sink
        assert_eq!(
            sink.text_for(&session.context_key()),
            "beta: Solved the problem."
        );
    }

    #[tokio::test]
    async fn test_no_sentinel_falls_back_to_first_candidate() {
        let client = ScriptedClient::new(vec![
            Script::reply("first alternative"),
            Script::reply("second alternative"),
            Script::reply("third alternative"),
        ]);
        let sink = Arc::new(MemorySink::new());
        let engine = ReasoningEngine::new(client.clone(), sink.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 3));

        let turn = engine.advance(&mut session).await.unwrap().unwrap();

        assert_eq!(turn.text, "first alternative");
        assert_eq!(client.calls(), 3);
        assert_eq!(sink.text_for(&session.context_key()), "first alternative");
        assert_eq!(session.status(), SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn test_partial_candidate_failures_are_tolerated() {
        let client = ScriptedClient::new(vec![
            Script::Fail("candidate one down"),
            Script::reply("candidate two delivers"),
            Script::Fail("candidate three down"),
        ]);
        let engine = engine(client);
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 3));

        let turn = engine.advance(&mut session).await.unwrap().unwrap();

        assert_eq!(turn.text, "candidate two delivers");
        assert_eq!(session.depth(), 1);
        assert_eq!(session.status(), SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn test_all_candidates_failing_fails_the_step() {
        let client = ScriptedClient::new(vec![
            Script::Fail("one"),
            Script::Fail("two"),
            Script::Fail("three"),
        ]);
        let engine = engine(client);
        let mut session = ReasoningSession::new("q", SessionLimits::new(5, 3));

        let err = engine.advance(&mut session).await.unwrap_err();

        assert!(matches!(err, EngineError::Generate(_)));
        assert_eq!(session.status(), SessionStatus::Failed);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_single_width_streams_live_to_sink() {
        let client = ScriptedClient::new(vec![Script::reply("streamed as it arrives")]);
        let sink = Arc::new(MemorySink::new());
        let engine = ReasoningEngine::new(client, sink.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(1, 1));

        engine.run(&mut session).await.unwrap();

        assert_eq!(
            sink.text_for(&session.context_key()),
            "streamed as it arrives"
        );
        // Script::reply splits the text, so more than one publish happened
        assert!(sink.events().len() >= 2);
    }
}

mod article_synthesis {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Run a session to exhaustion so there is a transcript to synthesize.
    async fn exhausted_session(
        engine: &ReasoningEngine,
        max_depth: u32,
    ) -> ReasoningSession {
        let mut session = ReasoningSession::new("q", SessionLimits::new(max_depth, 1));
        engine.run(&mut session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_two_round_synthesis_concatenates_both_outputs() {
        let client = ScriptedClient::new(vec![
            Script::reply("turn one"),
            Script::reply("turn two"),
            Script::reply("turn three"),
            Script::reply_cut("Introduction and background. "),
            Script::reply("Methodology, results and conclusion."),
        ]);
        let engine = engine(client.clone());
        let session = exhausted_session(&engine, 3).await;

        let document = engine.synthesize(&session).await.unwrap();

        assert_eq!(
            document,
            "Introduction and background. Methodology, results and conclusion."
        );
        // 3 reasoning calls + exactly 2 synthesis calls, never a third
        assert_eq!(client.calls(), 5);
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_synthesis_completes_in_one_round_on_stop() {
        let client = ScriptedClient::new(vec![
            Script::reply("only turn"),
            Script::reply("The whole article."),
        ]);
        let engine = engine(client.clone());
        let session = exhausted_session(&engine, 1).await;

        let document = engine.synthesize(&session).await.unwrap();

        assert_eq!(document, "The whole article.");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_runaway_synthesis_hits_safety_bound() {
        let client = ScriptedClient::new(vec![
            Script::reply("only turn"),
            Script::reply_cut("never "),
        ]);
        let engine = ReasoningEngine::new(client.clone(), Arc::new(NullSink))
            .with_synthesis_max_rounds(2);
        let session = exhausted_session(&engine, 1).await;

        let err = engine.synthesize(&session).await.unwrap_err();

        match err {
            SynthesisError::Runaway { rounds, partial } => {
                assert_eq!(rounds, 2);
                assert_eq!(partial, "never never ");
            }
            other => panic!("expected Runaway, got {other:?}"),
        }
        // 1 reasoning call + the bounded 2 synthesis rounds
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_synthesis_streams_to_article_key() {
        let client = ScriptedClient::new(vec![
            Script::reply("only turn"),
            Script::reply("Article body."),
        ]);
        let sink = Arc::new(MemorySink::new());
        let engine = ReasoningEngine::new(client, sink.clone());
        let mut session = ReasoningSession::new("q", SessionLimits::new(1, 1));
        engine.run(&mut session).await.unwrap();

        engine.synthesize(&session).await.unwrap();

        assert_eq!(sink.text_for(&session.article_key()), "Article body.");
        // The reasoning output stays under the context key
        assert_eq!(sink.text_for(&session.context_key()), "only turn");
    }

    #[tokio::test]
    async fn test_synthesis_transport_failure_propagates() {
        let client = ScriptedClient::new(vec![
            Script::reply("only turn"),
            Script::Fail("endpoint gone"),
        ]);
        let engine = engine(client);
        let session = exhausted_session(&engine, 1).await;

        let err = engine.synthesize(&session).await.unwrap_err();

        assert!(matches!(err, SynthesisError::Generate(_)));
    }
}
