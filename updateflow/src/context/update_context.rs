//! The request-scoped context of one inbound update.

use super::{BotClientContext, ContextId, PropertyBag, Services, Update};
use crate::cancellation::{CancellationToken, CleanupRegistry};
use crate::errors::UpdateflowError;
use crate::search::SearchKey;
use crate::utils::{now_utc, Timestamp};
use parking_lot::Mutex;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cancellation reason used by plain [`UpdateContext::dispose`].
pub const DISPOSED_REASON: &str = "disposed";
/// Cancellation reason used when a newer update replaces a context.
pub const EVICTED_REASON: &str = "evicted";
/// Cancellation reason used when a context outlives its time budget.
pub const PENDING_EXCEEDED_REASON: &str = "pending time exceeded";

/// Just like an HTTP request context, for one update.
///
/// Handlers read the payload, stash metadata in [`properties`](Self::properties),
/// signal progress with [`mark_processed`](Self::mark_processed) and
/// [`force_exit`](Self::force_exit), and watch
/// [`processing_aborted`](Self::processing_aborted) during long work.
///
/// Processing flags are one-way. Disposal happens once: it cancels the
/// token, forces exit, clears properties and notifies disposal observers.
pub struct UpdateContext {
    id: ContextId,
    update: Update,
    bot_context: BotClientContext,
    services: Services,
    properties: PropertyBag,
    processing_aborted: Arc<CancellationToken>,
    created_at: Timestamp,
    created_instant: Instant,
    last_activity: Mutex<Instant>,
    processed: AtomicBool,
    force_exit_requested: AtomicBool,
    disposed: AtomicBool,
    disposal_observers: CleanupRegistry,
}

impl UpdateContext {
    /// Creates a context for `update` received by `bot_context`.
    ///
    /// The context's cancellation is a child scope of `parent`: cancelling
    /// the parent aborts this context, disposing this context leaves the
    /// parent alone.
    #[must_use]
    pub fn new(
        update: Update,
        bot_context: BotClientContext,
        services: Services,
        parent: &CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            id: ContextId::new(),
            update,
            bot_context,
            services,
            properties: PropertyBag::new(),
            processing_aborted: parent.child_token(),
            created_at: now_utc(),
            created_instant: now,
            last_activity: Mutex::new(now),
            processed: AtomicBool::new(false),
            force_exit_requested: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            disposal_observers: CleanupRegistry::new(),
        }
    }

    /// Returns the unique id.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the raw update.
    #[must_use]
    pub const fn update(&self) -> &Update {
        &self.update
    }

    /// Returns the bot connection that received the update.
    #[must_use]
    pub const fn bot_context(&self) -> &BotClientContext {
        &self.bot_context
    }

    /// Returns the scoped services.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Returns the conversation id.
    #[must_use]
    pub fn chat_id(&self) -> Option<i64> {
        self.update.chat_id()
    }

    /// Returns the bot id.
    #[must_use]
    pub const fn bot_id(&self) -> i64 {
        self.bot_context.bot_id()
    }

    /// Returns the search key, if the update belongs to a conversation.
    #[must_use]
    pub fn search_key(&self) -> Option<SearchKey> {
        self.chat_id().map(|chat_id| SearchKey::new(chat_id, self.bot_id()))
    }

    /// Arbitrary metadata attached to this update.
    #[must_use]
    pub const fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Cancellation signal for work done on behalf of this update.
    #[must_use]
    pub fn processing_aborted(&self) -> &Arc<CancellationToken> {
        &self.processing_aborted
    }

    /// Returns true once processing was aborted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.processing_aborted.is_cancelled()
    }

    /// Returns why processing was aborted.
    #[must_use]
    pub fn cancellation_reason(&self) -> Option<String> {
        self.processing_aborted.reason()
    }

    /// Wall-clock creation time.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Monotonic creation time.
    #[must_use]
    pub const fn created_instant(&self) -> Instant {
        self.created_instant
    }

    /// Time since creation.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_instant.elapsed()
    }

    /// Records activity on this context.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Last time [`touch`](Self::touch) was called, or creation time.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Marks the update as processed so later handlers can skip it.
    pub fn mark_processed(&self) {
        self.processed.store(true, Ordering::SeqCst);
    }

    /// Returns true once the update was processed.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.processed.load(Ordering::SeqCst)
    }

    /// Marks the update processed and stops the handler chain.
    ///
    /// No handler after the current one will be invoked.
    pub fn force_exit(&self) {
        self.mark_processed();
        self.force_exit_requested.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`force_exit`](Self::force_exit) was called.
    #[must_use]
    pub fn is_force_exit_requested(&self) -> bool {
        self.force_exit_requested.load(Ordering::SeqCst)
    }

    /// Registers a callback run once when the context is disposed.
    ///
    /// Observers run in reverse registration order. If the context is
    /// already disposed the callback runs immediately.
    pub fn on_dispose<F>(&self, name: impl Into<String>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.disposal_observers.register(name, callback);
        if self.is_disposed() {
            self.disposal_observers.run_all();
        }
    }

    /// Detaches every disposal observer registered under `name`.
    ///
    /// Returns true if an observer was removed.
    pub fn remove_dispose_observer(&self, name: &str) -> bool {
        self.disposal_observers.unregister_by_name(name)
    }

    /// Cancels in-flight work without disposing the context.
    pub fn abort(&self, reason: &str) {
        self.processing_aborted.cancel(reason);
    }

    /// Sends a text reply to this update's conversation.
    pub async fn reply_text(&self, text: &str) -> Result<(), UpdateflowError> {
        let chat_id = self.chat_id().ok_or(UpdateflowError::NoConversation {
            update_id: self.update.update_id,
        })?;
        if let Some(reason) = self.cancellation_reason() {
            return Err(UpdateflowError::cancelled(reason));
        }
        self.touch();
        self.bot_context
            .client()
            .send_text(chat_id, text, &self.processing_aborted)
            .await
    }

    /// Returns true once disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Disposes the context. Second and later calls are no-ops.
    pub fn dispose(&self) {
        self.dispose_with_reason(DISPOSED_REASON);
    }

    /// Disposes the context, cancelling it with `reason`.
    ///
    /// Never panics and never fails: teardown errors are logged and dropped.
    pub fn dispose_with_reason(&self, reason: &str) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.processing_aborted.cancel(reason);
        })) {
            warn!(context_id = %self.id, "Cancelling disposed context failed: {:?}", e);
        }

        self.force_exit();
        self.properties.clear();

        let failures = self.disposal_observers.run_all();
        if !failures.is_empty() {
            warn!(context_id = %self.id, failed = failures.len(), "Disposal observers failed");
        }
        debug!(context_id = %self.id, reason, "Update context disposed");
    }
}

impl Drop for UpdateContext {
    fn drop(&mut self) {
        self.dispose_with_reason(DISPOSED_REASON);
    }
}

impl PartialEq for UpdateContext {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UpdateContext {}

impl Hash for UpdateContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for UpdateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateContext")
            .field("id", &self.id)
            .field("update_id", &self.update.update_id)
            .field("search_key", &self.search_key())
            .field("processed", &self.is_processed())
            .field("force_exit_requested", &self.is_force_exit_requested())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
