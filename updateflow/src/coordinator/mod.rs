//! Lifecycle coordination for update contexts.
//!
//! This module provides:
//! - The [`UpdateHandler`] trait and a forward-only [`HandlerChain`]
//! - [`UpdateCoordinator`], which creates, indexes and disposes contexts
//! - [`StaleContextSweeper`], a background task reclaiming stale contexts

mod chain;
mod lifecycle;
mod sweeper;

pub use chain::{ChainOutcome, FnHandler, HandlerChain, UpdateHandler};
pub use lifecycle::{UpdateCoordinator, UpdateCoordinatorBuilder};
pub use sweeper::StaleContextSweeper;
