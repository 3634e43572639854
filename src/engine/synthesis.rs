//! Article synthesis: fold a finished transcript into a final document.

use futures::StreamExt;
use tracing::{debug, info};

use super::session::{ReasoningEngine, ReasoningSession};
use crate::error::{SynthesisError, SynthesisResult};
use crate::ollama::{FinishReason, GenerateRequest, Message};
use crate::prompts;

impl ReasoningEngine {
    /// Synthesize a narrative document from the session's transcript.
    ///
    /// Intended for sessions that reached `solved` or `exhausted`; the
    /// session itself is never mutated. The first round uses the article
    /// prompt; while the capability signals a length cutoff, further rounds
    /// continue the draft, up to the configured safety bound. Hitting the
    /// bound without a completion signal surfaces
    /// [`SynthesisError::Runaway`] carrying the partial document. Output
    /// streams to the Progress Sink under the session's article key.
    pub async fn synthesize(&self, session: &ReasoningSession) -> SynthesisResult<String> {
        let key = session.article_key();
        let transcript = session.transcript();
        let mut draft = String::new();
        let mut rounds: u32 = 0;

        loop {
            let prompt = if rounds == 0 {
                prompts::build_article_prompt(transcript, self.options.num_predict)
            } else {
                prompts::build_article_continuation_prompt(
                    transcript,
                    &draft,
                    self.options.num_predict,
                )
            };

            let request = GenerateRequest::new(&self.model, vec![Message::user(prompt)])
                .with_options(self.options);
            let mut stream = self.client.generate(request).await?;

            let mut finish = FinishReason::Stop;
            while let Some(item) = stream.next().await {
                let chunk = item?;
                if !chunk.content.is_empty() {
                    draft.push_str(&chunk.content);
                    self.sink.publish(&key, &chunk.content);
                }
                if let Some(f) = chunk.finish {
                    finish = f;
                    break;
                }
            }

            rounds += 1;
            match finish {
                FinishReason::Stop => {
                    info!(
                        session_id = %session.id(),
                        rounds,
                        document_len = draft.len(),
                        "Article synthesis complete"
                    );
                    return Ok(draft);
                }
                FinishReason::Length if rounds >= self.synthesis_max_rounds => {
                    return Err(SynthesisError::Runaway {
                        rounds,
                        partial: draft,
                    });
                }
                FinishReason::Length => {
                    debug!(
                        session_id = %session.id(),
                        rounds,
                        draft_len = draft.len(),
                        "Draft cut off by token budget, continuing"
                    );
                }
            }
        }
    }
}
