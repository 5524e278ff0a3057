//! Conversation assembly.
//!
//! Turns a [`GatheredContext`](steward_core::GatheredContext) into the
//! platform-neutral [`Conversation`](steward_core::Conversation) the
//! orchestrator reads.
//!
//! | Source | Order | Role |
//! |--------|-------|------|
//! | Thread history | by timestamp | author kind |
//! | Reply-chain groups | by timestamp | author kind |
//! | Current batch | by timestamp | author kind |

pub mod assembler;
pub mod image;

pub use assembler::{AssemblyError, ConversationAssembler};
pub use image::HttpImageFetcher;
