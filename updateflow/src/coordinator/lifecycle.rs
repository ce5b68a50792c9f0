//! The lifecycle coordinator.

use super::{ChainOutcome, HandlerChain, StaleContextSweeper, UpdateHandler};
use crate::cancellation::CancellationToken;
use crate::config::LifecycleConfig;
use crate::context::{BotClientContext, Services, Update, UpdateContext, PENDING_EXCEEDED_REASON};
use crate::errors::{ConfigError, UpdateflowError};
use crate::events::{
    get_event_sink, EventSink, CONTEXT_COMPLETED, CONTEXT_CREATED, CONTEXT_DISPOSED,
    CONTEXT_EVICTED, CONTEXT_FORCE_EXIT, CONTEXT_RECLAIMED,
};
use crate::pending::{CreationTimePendingExceededChecker, PendingExceededChecker};
use crate::search::{ConcurrentSearchBag, UpdateContextSearchBag, UpdateContextSearchData};
use crate::utils::iso_timestamp;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

/// Disposes a context when dropped, whether processing finished, failed or
/// the processing future itself was dropped.
struct DisposeGuard<'a>(&'a UpdateContext);

impl Drop for DisposeGuard<'_> {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

/// Creates update contexts, tracks them in the search bag, runs the handler
/// chain and reclaims contexts that outlive their time budget.
pub struct UpdateCoordinator {
    config: LifecycleConfig,
    search_bag: Arc<dyn UpdateContextSearchBag>,
    pending_checker: Arc<dyn PendingExceededChecker>,
    handlers: HandlerChain,
    services: Services,
    root: Arc<CancellationToken>,
    event_sink: Arc<dyn EventSink>,
}

impl UpdateCoordinator {
    /// Starts building a coordinator.
    #[must_use]
    pub fn builder(config: LifecycleConfig) -> UpdateCoordinatorBuilder {
        UpdateCoordinatorBuilder::new(config)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Returns the search bag.
    #[must_use]
    pub fn search_bag(&self) -> &Arc<dyn UpdateContextSearchBag> {
        &self.search_bag
    }

    /// Returns the root cancellation scope. Every context is a child of it.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.root
    }

    /// Creates a context for `update` and registers it in the search bag.
    ///
    /// Any live context for the same conversation and bot is cancelled and
    /// disposed. The context deregisters itself when disposed.
    pub fn create_context(&self, update: Update, bot_context: BotClientContext) -> Arc<UpdateContext> {
        let ctx = Arc::new(UpdateContext::new(
            update,
            bot_context,
            self.services.clone(),
            &self.root,
        ));

        self.event_sink.try_emit(
            CONTEXT_CREATED,
            Some(json!({
                "context_id": ctx.id(),
                "update_id": ctx.update().update_id,
                "chat_id": ctx.chat_id(),
                "bot_id": ctx.bot_id(),
                "created_at": iso_timestamp(&ctx.created_at()),
            })),
        );

        {
            let sink = Arc::clone(&self.event_sink);
            let token = Arc::clone(ctx.processing_aborted());
            let context_id = ctx.id();
            ctx.on_dispose("events", move || {
                sink.try_emit(
                    CONTEXT_DISPOSED,
                    Some(json!({ "context_id": context_id, "reason": token.reason() })),
                );
            });
        }

        if self.config.reclaim_on_add {
            self.reclaim_stale();
        }

        let Some(data) = UpdateContextSearchData::new(&ctx) else {
            debug!(context_id = %ctx.id(), update_id = ctx.update().update_id, "Update has no conversation, not indexed");
            return ctx;
        };

        // Registered last so it runs first on disposal.
        {
            let bag = Arc::clone(&self.search_bag);
            let key = data.key();
            let context_id = ctx.id();
            ctx.on_dispose("search_bag", move || {
                bag.remove_if_same(key, context_id);
            });
        }

        if let Some(evicted) = self.search_bag.add(data) {
            info!(key = %evicted.key(), evicted = %evicted.context_id(), replacement = %ctx.id(), "Evicted pending update context");
            self.event_sink.try_emit(
                CONTEXT_EVICTED,
                Some(json!({
                    "context_id": evicted.context_id(),
                    "replaced_by": ctx.id(),
                    "chat_id": evicted.key().chat_id,
                    "bot_id": evicted.key().bot_id,
                })),
            );
        }

        ctx
    }

    /// Processes one update: create the context, run the chain, dispose.
    ///
    /// Handler errors are returned to the caller. The context is disposed
    /// exactly once however the chain ends.
    pub async fn process(
        &self,
        update: Update,
        bot_context: BotClientContext,
    ) -> Result<ChainOutcome, UpdateflowError> {
        let ctx = self.create_context(update, bot_context);
        let span = info_span!(
            "update",
            context_id = %ctx.id(),
            update_id = ctx.update().update_id,
            chat_id = ?ctx.chat_id(),
            bot_id = ctx.bot_id()
        );

        async {
            let _guard = DisposeGuard(&ctx);
            let outcome = self.handlers.run(&ctx).await?;

            if outcome.force_exited {
                self.event_sink
                    .emit(CONTEXT_FORCE_EXIT, Some(json!({ "context_id": ctx.id() })))
                    .await;
            }
            self.event_sink
                .emit(
                    CONTEXT_COMPLETED,
                    Some(json!({
                        "context_id": ctx.id(),
                        "handlers_invoked": outcome.handlers_invoked,
                        "processed": outcome.processed,
                    })),
                )
                .await;
            Ok::<_, UpdateflowError>(outcome)
        }
        .instrument(span)
        .await
    }

    /// Returns the live context for a conversation and bot.
    #[must_use]
    pub fn find(&self, chat_id: i64, bot_id: i64) -> Option<Arc<UpdateContext>> {
        self.search_bag
            .try_find(chat_id, bot_id)?
            .context()
            .filter(|ctx| !ctx.is_disposed())
    }

    /// Returns true if the context has outlived its time budget.
    #[must_use]
    pub fn is_pending_exceeded(&self, ctx: &UpdateContext) -> bool {
        self.pending_checker.is_pending_exceeded(ctx)
    }

    /// Reclaims stale contexts and returns how many entries were removed.
    ///
    /// Entries whose context exceeded the pending limit are removed and the
    /// context disposed. Entries whose context is gone are dropped.
    pub fn reclaim_stale(&self) -> usize {
        let mut reclaimed = 0;

        for entry in self.search_bag.snapshot() {
            let Some(ctx) = entry.context().filter(|ctx| !ctx.is_disposed()) else {
                if self
                    .search_bag
                    .remove_if_same(entry.key(), entry.context_id())
                    .is_some()
                {
                    debug!(key = %entry.key(), context_id = %entry.context_id(), "Dropped dangling search entry");
                    reclaimed += 1;
                }
                continue;
            };

            if !self.pending_checker.is_pending_exceeded(&ctx) {
                continue;
            }

            if self
                .search_bag
                .remove_if_same(entry.key(), entry.context_id())
                .is_none()
            {
                // Replaced or disposed concurrently.
                continue;
            }
            let age_ms = u64::try_from(ctx.age().as_millis()).unwrap_or(u64::MAX);
            info!(key = %entry.key(), context_id = %ctx.id(), age_ms, "Reclaiming stale update context");
            ctx.dispose_with_reason(PENDING_EXCEEDED_REASON);
            self.event_sink.try_emit(
                CONTEXT_RECLAIMED,
                Some(json!({ "context_id": ctx.id(), "age_ms": age_ms })),
            );
            reclaimed += 1;
        }

        reclaimed
    }

    /// Starts a background task reclaiming stale contexts at the configured
    /// interval.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>) -> StaleContextSweeper {
        StaleContextSweeper::spawn(self, self.config.sweep_interval())
    }

    /// Cancels every live context and stops sweepers.
    pub fn shutdown(&self) {
        info!(live = self.search_bag.len(), "Shutting down update coordinator");
        self.root.cancel("coordinator shutdown");
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("live_contexts", &self.search_bag.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`UpdateCoordinator`].
pub struct UpdateCoordinatorBuilder {
    config: LifecycleConfig,
    search_bag: Option<Arc<dyn UpdateContextSearchBag>>,
    pending_checker: Option<Arc<dyn PendingExceededChecker>>,
    handlers: HandlerChain,
    services: Services,
    parent: Option<Arc<CancellationToken>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl UpdateCoordinatorBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            search_bag: None,
            pending_checker: None,
            handlers: HandlerChain::new(),
            services: Services::new(),
            parent: None,
            event_sink: None,
        }
    }

    /// Uses a custom search bag.
    #[must_use]
    pub fn search_bag(mut self, bag: Arc<dyn UpdateContextSearchBag>) -> Self {
        self.search_bag = Some(bag);
        self
    }

    /// Uses a custom pending-time policy.
    #[must_use]
    pub fn pending_checker(mut self, checker: Arc<dyn PendingExceededChecker>) -> Self {
        self.pending_checker = Some(checker);
        self
    }

    /// Appends a handler to the chain.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn UpdateHandler>) -> Self {
        self.handlers.add(handler);
        self
    }

    /// Sets the services handed to every context.
    #[must_use]
    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// Makes the coordinator's cancellation scope a child of `parent`.
    #[must_use]
    pub fn parent_cancellation(mut self, parent: Arc<CancellationToken>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the event sink. Defaults to the global sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds the coordinator.
    pub fn build(self) -> Result<UpdateCoordinator, ConfigError> {
        self.config.validate()?;

        let pending_checker = self.pending_checker.unwrap_or_else(|| {
            Arc::new(CreationTimePendingExceededChecker::new(
                self.config.pending_time_limit(),
            ))
        });
        let root = self
            .parent
            .map_or_else(|| Arc::new(CancellationToken::new()), |parent| parent.child_token());

        Ok(UpdateCoordinator {
            search_bag: self
                .search_bag
                .unwrap_or_else(|| Arc::new(ConcurrentSearchBag::new())),
            pending_checker,
            handlers: self.handlers,
            services: self.services,
            root,
            event_sink: self.event_sink.unwrap_or_else(get_event_sink),
            config: self.config,
        })
    }
}
