//! Action routing.
//!
//! A fixed lookup table from classified context to the handler that should
//! see it. Every combination not listed is ignored.

use serde::Serialize;
use steward_core::message::{AuthorKind, Location, MessageContext};

/// Handlers the pipeline can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    /// Answer a community question posted in a channel, in a new thread.
    AnswerChannel,
    /// Answer a follow-up inside a thread the bot already serves.
    AnswerThread,
    /// A team member answered a community member; hand the exchange to
    /// the capture sink.
    CaptureQa,
}

/// What a message replies to, relative to its own author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    None,
    /// A reply to the author's own earlier message.
    SameAuthor,
    Other(AuthorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Channel,
    Thread,
}

/// Everything the routing table keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteInput {
    pub author: AuthorKind,
    pub location: LocationKind,
    pub reply: ReplyKind,
    pub thread_owner: Option<AuthorKind>,
    pub thread_has_bot_activity: bool,
}

impl RouteInput {
    /// Build the table key from a message's context.
    pub fn from_context(
        author_id: &str,
        context: &MessageContext,
        thread_has_bot_activity: bool,
    ) -> Self {
        let reply = match &context.reply_target {
            None => ReplyKind::None,
            Some(target) if target.author_id == author_id => ReplyKind::SameAuthor,
            Some(target) => ReplyKind::Other(target.author_kind),
        };
        let location = match context.location {
            Location::Channel { .. } => LocationKind::Channel,
            Location::Thread { .. } => LocationKind::Thread,
        };
        Self {
            author: context.author_kind,
            location,
            reply,
            thread_owner: context.thread_owner,
            thread_has_bot_activity,
        }
    }
}

/// Routing decision. Empty means ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    pub handlers: Vec<Handler>,
}

impl Route {
    pub fn ignored() -> Self {
        Self::default()
    }

    fn to(handler: Handler) -> Self {
        Self {
            handlers: vec![handler],
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contains(&self, handler: Handler) -> bool {
        self.handlers.contains(&handler)
    }
}

/// Look up the handlers for one input.
pub fn route(input: &RouteInput) -> Route {
    use AuthorKind::{Bot, CommunityUser, TeamMember};
    use LocationKind::{Channel, Thread};

    match (
        input.author,
        input.location,
        input.reply,
        input.thread_owner,
        input.thread_has_bot_activity,
    ) {
        // Our own messages never trigger anything.
        (Bot, _, _, _, _) => Route::ignored(),

        // Community questions in a channel.
        (CommunityUser, Channel, ReplyKind::None, _, _)
        | (CommunityUser, Channel, ReplyKind::SameAuthor, _, _)
        | (CommunityUser, Channel, ReplyKind::Other(Bot), _, _) => Route::to(Handler::AnswerChannel),

        // Community members talking among themselves.
        (CommunityUser, Channel, ReplyKind::Other(CommunityUser), _, _) => Route::ignored(),

        // Exchanges between a community member and the team.
        (CommunityUser, Channel, ReplyKind::Other(TeamMember), _, _)
        | (TeamMember, Channel, ReplyKind::Other(CommunityUser), _, _) => {
            Route::to(Handler::CaptureQa)
        }

        // Follow-ups in a thread the bot opened and has spoken in. When the
        // platform does not report an owner, prior bot activity decides.
        (CommunityUser, Thread, _, Some(Bot), true) | (CommunityUser, Thread, _, None, true) => {
            Route::to(Handler::AnswerThread)
        }

        // A team member stepping into a bot thread.
        (TeamMember, Thread, _, Some(Bot), _) => Route::to(Handler::CaptureQa),

        _ => Route::ignored(),
    }
}
