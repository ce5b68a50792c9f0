//! # Updateflow
//!
//! Request-scoped contexts for processing messaging-bot updates.
//!
//! Each inbound update gets an [`UpdateContext`](context::UpdateContext)
//! with its own cancellation scope, metadata bag and processing flags.
//! The [`UpdateCoordinator`](coordinator::UpdateCoordinator) keeps at most
//! one live context per conversation and bot:
//!
//! - **Search index**: concurrent lookup of live contexts by conversation
//!   and bot, evicting the previous context when a newer update arrives
//! - **Pending-time policy**: pluggable detection of contexts that have
//!   been pending too long
//! - **Lifecycle**: create, run the handler chain, dispose exactly once
//! - **Cancellation**: disposal cascades to every child scope
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use updateflow::prelude::*;
//!
//! let coordinator = Arc::new(
//!     UpdateCoordinator::builder(LifecycleConfig::from_env()?)
//!         .handler(Arc::new(GreetHandler))
//!         .build()?,
//! );
//! let _sweeper = coordinator.spawn_sweeper();
//!
//! // For every update delivered by the transport:
//! coordinator.process(update, bot_context.clone()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pending;
pub mod search;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, CleanupRegistry};
    pub use crate::config::LifecycleConfig;
    pub use crate::context::{
        BotClient, BotClientContext, ContextId, PropertyBag, PropertyKey, PropertyValue,
        Services, Update, UpdateContext,
    };
    pub use crate::coordinator::{
        ChainOutcome, FnHandler, HandlerChain, StaleContextSweeper, UpdateCoordinator,
        UpdateHandler,
    };
    pub use crate::errors::{ConfigError, HandlerError, UpdateflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pending::{
        CreationTimePendingExceededChecker, LastActivityPendingExceededChecker,
        PendingExceededChecker,
    };
    pub use crate::search::{
        ConcurrentSearchBag, SearchKey, UpdateContextSearchBag, UpdateContextSearchData,
    };
    pub use std::sync::Arc;
}
