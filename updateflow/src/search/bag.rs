//! Search bag contract and entry type.

use crate::context::{ContextId, UpdateContext};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Composite key of a live context: conversation plus bot instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchKey {
    /// Conversation id.
    pub chat_id: i64,
    /// Bot id.
    pub bot_id: i64,
}

impl SearchKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(chat_id: i64, bot_id: i64) -> Self {
        Self { chat_id, bot_id }
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.bot_id)
    }
}

/// An index entry: a non-owning handle to the live context for a key.
#[derive(Debug, Clone)]
pub struct UpdateContextSearchData {
    key: SearchKey,
    context_id: ContextId,
    created_at: Instant,
    context: Weak<UpdateContext>,
}

impl UpdateContextSearchData {
    /// Builds the entry for a context.
    ///
    /// Returns `None` when the update carries no conversation.
    #[must_use]
    pub fn new(context: &Arc<UpdateContext>) -> Option<Self> {
        Some(Self {
            key: context.search_key()?,
            context_id: context.id(),
            created_at: context.created_instant(),
            context: Arc::downgrade(context),
        })
    }

    /// Returns the key.
    #[must_use]
    pub const fn key(&self) -> SearchKey {
        self.key
    }

    /// Returns the id of the tracked context.
    #[must_use]
    pub const fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Returns when the tracked context was created.
    #[must_use]
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns how long the tracked context has existed.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Upgrades to the tracked context.
    ///
    /// Returns `None` if the context was dropped.
    #[must_use]
    pub fn context(&self) -> Option<Arc<UpdateContext>> {
        self.context.upgrade()
    }

    /// Returns true if the tracked context was dropped or disposed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.context().map_or(true, |ctx| ctx.is_disposed())
    }
}

/// Concurrency-safe directory of live contexts.
///
/// Lookups for absent keys return `None`; none of these operations fail.
pub trait UpdateContextSearchBag: Send + Sync {
    /// Installs an entry.
    ///
    /// An existing entry for the same key is retired first: its context is
    /// cancelled before the new entry becomes visible, then disposed. The
    /// retired entry is returned.
    fn add(&self, data: UpdateContextSearchData) -> Option<UpdateContextSearchData>;

    /// Looks up the entry for a key.
    fn try_find(&self, chat_id: i64, bot_id: i64) -> Option<UpdateContextSearchData>;

    /// Checks whether a key has an entry.
    fn contains(&self, chat_id: i64, bot_id: i64) -> bool;

    /// Removes and returns the entry for a key.
    fn try_remove(&self, chat_id: i64, bot_id: i64) -> Option<UpdateContextSearchData>;

    /// Removes the entry for `key` only if it still tracks `context_id`.
    fn remove_if_same(&self, key: SearchKey, context_id: ContextId) -> Option<UpdateContextSearchData>;

    /// Returns a point-in-time copy of every entry.
    fn snapshot(&self) -> Vec<UpdateContextSearchData>;

    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns true if there are no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
