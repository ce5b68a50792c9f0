//! Bot connection seen by handlers.

use crate::cancellation::CancellationToken;
use crate::errors::UpdateflowError;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound reply transport.
///
/// Implementations should stop work when `cancel` fires and report
/// [`UpdateflowError::Cancelled`].
#[async_trait]
pub trait BotClient: Send + Sync {
    /// Sends a text message to a conversation.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), UpdateflowError>;
}

/// The bot instance that received an update.
#[derive(Clone)]
pub struct BotClientContext {
    bot_id: i64,
    username: Option<String>,
    client: Arc<dyn BotClient>,
}

impl BotClientContext {
    /// Creates a bot context.
    #[must_use]
    pub fn new(bot_id: i64, client: Arc<dyn BotClient>) -> Self {
        Self {
            bot_id,
            username: None,
            client,
        }
    }

    /// Sets the bot username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Returns the bot id.
    #[must_use]
    pub const fn bot_id(&self) -> i64 {
        self.bot_id
    }

    /// Returns the bot username.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the reply transport.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn BotClient> {
        &self.client
    }
}

impl std::fmt::Debug for BotClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotClientContext")
            .field("bot_id", &self.bot_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
