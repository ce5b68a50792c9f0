//! Update fixtures and a coordinator harness.

use std::sync::Arc;

use crate::config::LifecycleConfig;
use crate::context::{CallbackQuery, Chat, Message, Update, User};
use crate::coordinator::{UpdateCoordinator, UpdateHandler};
use crate::events::CollectingEventSink;
use crate::pending::PendingExceededChecker;

fn message(chat_id: i64, text: Option<&str>) -> Message {
    Message {
        message_id: 1,
        date: 0,
        chat: Chat {
            id: chat_id,
            kind: "private".to_string(),
            title: None,
            username: None,
        },
        from: Some(test_user()),
        text: text.map(String::from),
    }
}

fn test_user() -> User {
    User {
        id: 1000,
        is_bot: false,
        first_name: "Test".to_string(),
        username: Some("tester".to_string()),
    }
}

/// A text message update in `chat_id`.
#[must_use]
pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(message(chat_id, Some(text))),
        edited_message: None,
        callback_query: None,
    }
}

/// A callback query update in `chat_id`.
#[must_use]
pub fn callback_update(update_id: i64, chat_id: i64, data: &str) -> Update {
    Update {
        update_id,
        message: None,
        edited_message: None,
        callback_query: Some(CallbackQuery {
            id: format!("cb-{update_id}"),
            from: test_user(),
            message: Some(message(chat_id, None)),
            data: Some(data.to_string()),
        }),
    }
}

/// An update that belongs to no conversation.
#[must_use]
pub fn update_without_chat(update_id: i64) -> Update {
    Update {
        update_id,
        message: None,
        edited_message: None,
        callback_query: None,
    }
}

/// A coordinator wired to a collecting event sink.
pub struct TestCoordinator {
    /// The coordinator under test.
    pub coordinator: Arc<UpdateCoordinator>,
    /// Every lifecycle event it emitted.
    pub events: Arc<CollectingEventSink>,
}

impl TestCoordinator {
    /// Builds a coordinator with `handlers` and the default policy for
    /// `config`.
    #[must_use]
    pub fn new(config: LifecycleConfig, handlers: Vec<Arc<dyn UpdateHandler>>) -> Self {
        Self::build(config, handlers, None)
    }

    /// Builds a coordinator with a custom pending policy.
    #[must_use]
    pub fn with_checker(
        config: LifecycleConfig,
        handlers: Vec<Arc<dyn UpdateHandler>>,
        checker: Arc<dyn PendingExceededChecker>,
    ) -> Self {
        Self::build(config, handlers, Some(checker))
    }

    fn build(
        config: LifecycleConfig,
        handlers: Vec<Arc<dyn UpdateHandler>>,
        checker: Option<Arc<dyn PendingExceededChecker>>,
    ) -> Self {
        let events = Arc::new(CollectingEventSink::new());
        let mut builder = UpdateCoordinator::builder(config).event_sink(events.clone());
        for handler in handlers {
            builder = builder.handler(handler);
        }
        if let Some(checker) = checker {
            builder = builder.pending_checker(checker);
        }
        let coordinator = builder
            .build()
            .unwrap_or_else(|e| panic!("invalid test coordinator config: {e}"));
        Self {
            coordinator: Arc::new(coordinator),
            events,
        }
    }
}
