//! Conversation intake for Steward.
//!
//! Everything between a raw gateway event and a handler decision:
//!
//! - **classifier**: author kind, reply target and thread owner per message
//! - **batching**: quiet-window coalescing per author and channel
//! - **resolver**: reply-chain walk-up with bidirectional expansion
//! - **router**: the handler table
//! - **memory**: an in-process [`ChatGateway`](steward_core::ChatGateway)

pub mod batching;
pub mod classifier;
pub mod memory;
pub mod resolver;
pub mod router;

pub use batching::{Batch, BatchKey, BatchScheduler, SubmitOutcome};
pub use classifier::MessageClassifier;
pub use memory::{CreatedThread, InMemoryGateway, PostedReply};
pub use resolver::{ReplyChain, ReplyChainResolver, ResolverLimits};
pub use router::{Handler, LocationKind, ReplyKind, Route, RouteInput, route};
