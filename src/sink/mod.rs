//! Progress sinks: push-style notification of streamed generation output.
//!
//! The engine forwards every committed chunk to a [`ProgressSink`] keyed by
//! session. Delivery is at-least-once, so sinks must tolerate an exactly
//! repeated chunk. Sinks may be shared across concurrent sessions and
//! serialize their own writes; `publish` must stay cheap and must not block
//! the reasoning loop for unbounded time.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

/// Push-style receiver for incremental generation output.
pub trait ProgressSink: Send + Sync {
    /// Deliver one text fragment for the given session key.
    fn publish(&self, session_key: &str, partial_text: &str);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _session_key: &str, _partial_text: &str) {}
}

/// Sink that writes fragments to stdout as they arrive.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn publish(&self, _session_key: &str, partial_text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(partial_text.as_bytes());
        let _ = out.flush();
    }
}

/// In-memory recording sink, used by tests and callers that want to
/// inspect the accumulated output per session key.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every published (key, fragment) pair, in delivery order
    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    /// Concatenation of all fragments delivered for `session_key`
    pub fn text_for(&self, session_key: &str) -> String {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .iter()
            .filter(|(key, _)| key == session_key)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

impl ProgressSink for MemorySink {
    fn publish(&self, session_key: &str, partial_text: &str) {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .push((session_key.to_string(), partial_text.to_string()));
    }
}

/// File-backed sink mirroring each session key to `<root>/<key>.md`.
///
/// The accumulated text for a key is rewritten in full on every publish, so
/// readers always see a consistent document. An exactly repeated last chunk
/// is dropped, which makes at-least-once redelivery harmless. Note this also
/// collapses a model genuinely emitting the same fragment twice in a row;
/// callers that must preserve such repeats should use [`MemorySink`], which
/// records every publish. Write failures are logged and swallowed; the sink
/// never fails the reasoning loop.
pub struct FileSink {
    root: PathBuf,
    states: Mutex<HashMap<String, FileState>>,
}

struct FileState {
    accumulated: String,
    last_chunk: String,
}

impl FileSink {
    /// Create a sink rooted at `root`; directories are created on demand.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Accumulated text for a key, if any has been published
    pub fn text_for(&self, session_key: &str) -> Option<String> {
        self.states
            .lock()
            .expect("sink lock poisoned")
            .get(session_key)
            .map(|s| s.accumulated.clone())
    }
}

impl ProgressSink for FileSink {
    fn publish(&self, session_key: &str, partial_text: &str) {
        let mut states = self.states.lock().expect("sink lock poisoned");
        let state = states.entry(session_key.to_string()).or_insert(FileState {
            accumulated: String::new(),
            last_chunk: String::new(),
        });

        // At-least-once delivery: skip an exact repeat of the last chunk
        if !partial_text.is_empty() && partial_text == state.last_chunk {
            return;
        }
        state.accumulated.push_str(partial_text);
        state.last_chunk = partial_text.to_string();

        let path = self.root.join(format!("{session_key}.md"));
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, path = %parent.display(), "Failed to create sink directory");
                return;
            }
        }
        if let Err(e) = std::fs::write(&path, &state.accumulated) {
            warn!(error = %e, path = %path.display(), "Failed to write sink file");
        }
    }
}

/// Fan-out sink delivering every publish to each inner sink in order.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl TeeSink {
    /// Create an empty fan-out sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a downstream sink
    pub fn with(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ProgressSink for TeeSink {
    fn publish(&self, session_key: &str, partial_text: &str) {
        for sink in &self.sinks {
            sink.publish(session_key, partial_text);
        }
    }
}
