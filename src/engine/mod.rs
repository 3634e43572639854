//! Bounded iterative reasoning engine.
//!
//! [`ReasoningSession`] holds the per-session transcript and budgets;
//! [`ReasoningEngine`] drives the search loop ([`ReasoningEngine::advance`],
//! [`ReasoningEngine::run`], [`ReasoningEngine::turns`]) and folds finished
//! transcripts into documents ([`ReasoningEngine::synthesize`]).

mod session;
mod synthesis;

pub use session::*;
