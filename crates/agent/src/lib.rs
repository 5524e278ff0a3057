//! The answering side of Steward.
//!
//! A finalized batch flows through the [`Pipeline`]:
//!
//! 1. **Gather** the reply chain and thread history for the batch
//! 2. **Route** it to a handler by author, location and reply target
//! 3. **Assemble** a role-tagged conversation (images inlined)
//! 4. **Answer** through the [`AnswerOrchestrator`] stage graph
//! 5. **Post** into a new or existing thread, or capture the exchange
//!
//! Every failure along the way ends in silence rather than a public error.

pub mod capture;
pub mod context;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;

#[cfg(test)]
mod test_helpers;

pub use capture::{CaptureSink, LogCaptureSink};
pub use context::{AssemblyError, ConversationAssembler, HttpImageFetcher};
pub use orchestrator::{AnswerOrchestrator, AnswerPolicy, Stage};
pub use pipeline::{HandleOutcome, Pipeline, PipelineSettings, thread_name};
pub use retry::{Retriable, RetryPolicy};
