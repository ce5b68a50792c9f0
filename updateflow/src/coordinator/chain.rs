//! Handler trait and the ordered chain that runs handlers.

use crate::context::UpdateContext;
use crate::errors::HandlerError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, trace};

/// A step in update processing.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Returns the handler name.
    fn name(&self) -> &str;

    /// Handles the update.
    ///
    /// Call [`UpdateContext::force_exit`] to stop the chain after this
    /// handler, or [`UpdateContext::mark_processed`] to tell later handlers
    /// the update was dealt with.
    async fn handle(&self, ctx: &Arc<UpdateContext>) -> Result<(), HandlerError>;
}

type HandlerFn =
    dyn Fn(Arc<UpdateContext>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;

/// A handler built from an async closure.
pub struct FnHandler {
    name: String,
    func: Box<HandlerFn>,
}

impl FnHandler {
    /// Creates a handler from a closure returning a future.
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Arc<UpdateContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(move |ctx| Box::pin(func(ctx))),
        }
    }
}

impl std::fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl UpdateHandler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &Arc<UpdateContext>) -> Result<(), HandlerError> {
        (self.func)(Arc::clone(ctx)).await
    }
}

/// What happened while running a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainOutcome {
    /// Number of handlers invoked.
    pub handlers_invoked: usize,
    /// Whether the update ended up processed.
    pub processed: bool,
    /// Whether the chain stopped early on force exit.
    pub force_exited: bool,
}

/// An ordered, forward-only chain of handlers.
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn UpdateHandler>>,
}

impl HandlerChain {
    /// Creates a new empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn add(&mut self, handler: Arc<dyn UpdateHandler>) {
        self.handlers.push(handler);
    }

    /// Appends a handler, builder style.
    #[must_use]
    pub fn with(mut self, handler: Arc<dyn UpdateHandler>) -> Self {
        self.add(handler);
        self
    }

    /// Runs handlers in order until one fails or force exit is requested.
    ///
    /// A handler error is returned as is; the caller owns disposal.
    pub async fn run(&self, ctx: &Arc<UpdateContext>) -> Result<ChainOutcome, HandlerError> {
        let mut outcome = ChainOutcome::default();

        for handler in &self.handlers {
            if ctx.is_force_exit_requested() {
                debug!(context_id = %ctx.id(), next = handler.name(), "Force exit requested, stopping chain");
                outcome.force_exited = true;
                break;
            }
            trace!(context_id = %ctx.id(), handler = handler.name(), "Invoking handler");
            ctx.touch();
            outcome.handlers_invoked += 1;
            handler.handle(ctx).await?;
        }

        outcome.force_exited |= ctx.is_force_exit_requested();
        outcome.processed = ctx.is_processed();
        Ok(outcome)
    }

    /// Returns the number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::context::Services;
    use crate::testing::{text_update, FailingHandler, ForceExitHandler, RecordingBotClient, RecordingHandler};

    fn context() -> Arc<UpdateContext> {
        Arc::new(UpdateContext::new(
            text_update(1, 1, "/start"),
            RecordingBotClient::new().into_context(1),
            Services::new(),
            &CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_runs_handlers_in_order() {
        let first = Arc::new(RecordingHandler::new("first"));
        let second = Arc::new(RecordingHandler::new("second"));
        let chain = HandlerChain::new().with(first.clone()).with(second.clone());

        let outcome = chain.run(&context()).await.unwrap();

        assert_eq!(outcome.handlers_invoked, 2);
        assert!(!outcome.force_exited);
        assert!(!outcome.processed);
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
    }

    #[tokio::test]
    async fn test_force_exit_is_a_hard_stop() {
        let before = Arc::new(RecordingHandler::new("before"));
        let after = Arc::new(RecordingHandler::new("after"));
        let chain = HandlerChain::new()
            .with(before.clone())
            .with(Arc::new(ForceExitHandler::new("stop")))
            .with(after.clone());

        let ctx = context();
        let outcome = chain.run(&ctx).await.unwrap();

        assert_eq!(outcome.handlers_invoked, 2);
        assert!(outcome.force_exited);
        assert!(outcome.processed);
        assert_eq!(before.call_count(), 1);
        assert_eq!(after.call_count(), 0);
    }

    #[tokio::test]
    async fn test_error_propagates_and_stops_chain() {
        let after = Arc::new(RecordingHandler::new("after"));
        let chain = HandlerChain::new()
            .with(Arc::new(FailingHandler::new("broken", "boom")))
            .with(after.clone());

        let err = chain.run(&context()).await.unwrap_err();

        assert!(matches!(err, HandlerError::Failed { .. }));
        assert_eq!(after.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fn_handler_marks_processed() {
        let chain = HandlerChain::new().with(Arc::new(FnHandler::new("mark", |ctx: Arc<UpdateContext>| async move {
            ctx.mark_processed();
            Ok(())
        })));

        let outcome = chain.run(&context()).await.unwrap();
        assert!(outcome.processed);
        assert!(!outcome.force_exited);
    }

    #[tokio::test]
    async fn test_disposed_context_runs_no_handlers() {
        let handler = Arc::new(RecordingHandler::new("h"));
        let chain = HandlerChain::new().with(handler.clone());
        let ctx = context();
        ctx.dispose();

        let outcome = chain.run(&ctx).await.unwrap();
        assert_eq!(outcome.handlers_invoked, 0);
        assert_eq!(handler.call_count(), 0);
    }
}
