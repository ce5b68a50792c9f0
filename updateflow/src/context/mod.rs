//! Update contexts and the data they carry.
//!
//! This module provides:
//! - The inbound [`Update`] payload model
//! - The bot connection and scoped services handed to handlers
//! - A lazily allocated properties bag for handler metadata
//! - [`UpdateContext`], the request-scoped unit of work

mod bags;
mod bot;
mod identity;
mod services;
mod update;
mod update_context;

pub use bags::{PropertyBag, PropertyKey, PropertyValue};
pub use bot::{BotClient, BotClientContext};
pub use identity::ContextId;
pub use services::Services;
pub use update::{CallbackQuery, Chat, Message, Update, User};
pub use update_context::{
    UpdateContext, DISPOSED_REASON, EVICTED_REASON, PENDING_EXCEEDED_REASON,
};
