//! Mock collaborators for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::context::{BotClient, BotClientContext, UpdateContext};
use crate::coordinator::UpdateHandler;
use crate::errors::{HandlerError, UpdateflowError};

/// A bot client that records every message instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingBotClient {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
    delay: Option<Duration>,
}

impl RecordingBotClient {
    /// Creates a client that records immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send take `delay`, abandoning it on cancellation.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wraps this client in a bot context.
    #[must_use]
    pub fn into_context(self, bot_id: i64) -> BotClientContext {
        BotClientContext::new(bot_id, Arc::new(self))
    }

    /// Returns `(chat_id, text)` for every completed send.
    #[must_use]
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl BotClient for RecordingBotClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), UpdateflowError> {
        if let Some(delay) = self.delay {
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(UpdateflowError::cancelled(cancel.reason().unwrap_or_default()));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }
}

/// A handler that records the updates it sees.
#[derive(Debug)]
pub struct RecordingHandler {
    name: String,
    calls: AtomicUsize,
    update_ids: Mutex<Vec<i64>>,
}

impl RecordingHandler {
    /// Creates a recording handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
            update_ids: Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the update ids seen, in order.
    #[must_use]
    pub fn update_ids(&self) -> Vec<i64> {
        self.update_ids.lock().clone()
    }
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &Arc<UpdateContext>) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.update_ids.lock().push(ctx.update().update_id);
        Ok(())
    }
}

/// A handler that requests force exit.
#[derive(Debug)]
pub struct ForceExitHandler {
    name: String,
}

impl ForceExitHandler {
    /// Creates a force-exit handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl UpdateHandler for ForceExitHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &Arc<UpdateContext>) -> Result<(), HandlerError> {
        ctx.force_exit();
        Ok(())
    }
}

/// A handler that always fails.
#[derive(Debug)]
pub struct FailingHandler {
    name: String,
    message: String,
}

impl FailingHandler {
    /// Creates a failing handler.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl UpdateHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: &Arc<UpdateContext>) -> Result<(), HandlerError> {
        Err(HandlerError::failed(&self.name, &self.message))
    }
}

/// A handler that works for a while, giving up if its context is cancelled.
#[derive(Debug)]
pub struct SlowHandler {
    name: String,
    duration: Duration,
    started: AtomicUsize,
}

impl SlowHandler {
    /// Creates a slow handler.
    #[must_use]
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
            started: AtomicUsize::new(0),
        }
    }

    /// Returns how many runs have started.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateHandler for SlowHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &Arc<UpdateContext>) -> Result<(), HandlerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let token = ctx.processing_aborted();
        tokio::select! {
            () = token.cancelled() => Err(HandlerError::cancelled(
                &self.name,
                token.reason().unwrap_or_default(),
            )),
            () = tokio::time::sleep(self.duration) => {
                ctx.mark_processed();
                Ok(())
            }
        }
    }
}
