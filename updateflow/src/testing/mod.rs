//! Testing utilities for update pipelines.
//!
//! This module provides:
//! - A recording bot client
//! - Mock handlers (recording, force-exit, failing, slow)
//! - Update fixtures

mod fixtures;
mod mocks;

pub use crate::events::CollectingEventSink;
pub use fixtures::{callback_update, text_update, update_without_chat, TestCoordinator};
pub use mocks::{FailingHandler, ForceExitHandler, RecordingBotClient, RecordingHandler, SlowHandler};
