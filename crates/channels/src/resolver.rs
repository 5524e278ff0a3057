//! Reply-chain reconstruction.
//!
//! Starting from a triggering message, follows reply references upward and
//! expands every referenced message into the full same-author run around
//! it. The result is the conversation backbone as a list of groups, oldest
//! first, with the trigger's own group last.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use steward_core::gateway::{ChatGateway, Direction};
use steward_core::message::{Message, MessageGroup};
use tracing::{debug, warn};

/// Resolution limits.
#[derive(Debug, Clone, Copy)]
pub struct ResolverLimits {
    /// Maximum reply hops followed above the trigger.
    pub max_depth: usize,
    /// Maximum neighbours read on each side of an anchor.
    pub scan_limit: usize,
    /// Largest gap between two consecutive messages of one group.
    pub group_gap: Duration,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self {
            max_depth: 5,
            scan_limit: 20,
            group_gap: Duration::from_secs(8),
        }
    }
}

/// Groups in conversation order, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyChain {
    pub groups: Vec<MessageGroup>,
    /// The walk stopped early on a lookup failure.
    pub truncated: bool,
}

impl ReplyChain {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

pub struct ReplyChainResolver {
    gateway: Arc<dyn ChatGateway>,
    limits: ResolverLimits,
}

impl ReplyChainResolver {
    pub fn new(gateway: Arc<dyn ChatGateway>, limits: ResolverLimits) -> Self {
        Self { gateway, limits }
    }

    /// Reconstruct the chain ending at `trigger`.
    ///
    /// A failed lookup of the trigger's direct reference yields an empty
    /// chain. Failures further up truncate the walk and keep what was
    /// already collected.
    pub async fn resolve(&self, trigger: &Message) -> ReplyChain {
        let own_group = self.expand(trigger).await;
        let mut seen: HashSet<String> = own_group.messages.iter().map(|m| m.id.clone()).collect();

        let mut ancestors = Vec::new();
        let mut truncated = false;
        let mut next_ref = outward_reference(&own_group);
        let mut depth = 0;

        while let Some(reference) = next_ref.take() {
            if depth >= self.limits.max_depth {
                debug!(trigger = %trigger.id, depth, "Reply walk reached depth limit");
                break;
            }
            if seen.contains(&reference) {
                warn!(trigger = %trigger.id, reference = %reference, "Reply cycle detected");
                break;
            }

            let referenced = match self.gateway.fetch_message(&trigger.location, &reference).await {
                Ok(message) => message,
                Err(e) if depth == 0 => {
                    warn!(
                        trigger = %trigger.id,
                        reference = %reference,
                        error = %e,
                        "Direct reply reference unresolvable"
                    );
                    return ReplyChain {
                        groups: Vec::new(),
                        truncated: true,
                    };
                }
                Err(e) => {
                    warn!(
                        trigger = %trigger.id,
                        reference = %reference,
                        depth,
                        error = %e,
                        "Reply walk truncated"
                    );
                    truncated = true;
                    break;
                }
            };

            let group = self.expand(&referenced).await;
            seen.extend(group.messages.iter().map(|m| m.id.clone()));
            next_ref = outward_reference(&group);
            ancestors.push(group);
            depth += 1;
        }

        ancestors.reverse();
        ancestors.push(own_group);
        debug!(trigger = %trigger.id, groups = ancestors.len(), truncated, "Reply chain resolved");
        ReplyChain {
            groups: ancestors,
            truncated,
        }
    }

    /// Collect the maximal contiguous same-author run around `anchor`.
    ///
    /// Degrades to the anchor alone when neighbouring history is unavailable.
    pub async fn expand(&self, anchor: &Message) -> MessageGroup {
        let before = self.scan(anchor, Direction::Before).await;
        let after = self.scan(anchor, Direction::After).await;

        let mut messages = before;
        messages.reverse();
        messages.push(anchor.clone());
        messages.extend(after);

        MessageGroup {
            author_id: anchor.author_id.clone(),
            messages,
        }
    }

    /// Walk outward from the anchor while messages stay same-author and
    /// close together. Returned closest first.
    async fn scan(&self, anchor: &Message, direction: Direction) -> Vec<Message> {
        let neighbours = match self
            .gateway
            .fetch_adjacent(&anchor.location, &anchor.id, direction, self.limits.scan_limit)
            .await
        {
            Ok(neighbours) => neighbours,
            Err(e) => {
                warn!(anchor = %anchor.id, ?direction, error = %e, "Adjacent history unavailable");
                return Vec::new();
            }
        };

        let gap = chrono::Duration::from_std(self.limits.group_gap).unwrap_or(chrono::Duration::MAX);
        let mut run = Vec::new();
        let mut edge = anchor.timestamp;
        for message in neighbours {
            let distance = (message.timestamp - edge).abs();
            if message.author_id != anchor.author_id || distance >= gap {
                break;
            }
            edge = message.timestamp;
            run.push(message);
        }
        run
    }
}

/// The earliest reply reference in a group that points outside it.
fn outward_reference(group: &MessageGroup) -> Option<String> {
    group
        .messages
        .iter()
        .filter_map(|m| m.reply_to.as_deref())
        .find(|reference| !group.contains(reference))
        .map(String::from)
}
