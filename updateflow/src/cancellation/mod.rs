//! Structured cancellation and cleanup utilities.
//!
//! This module provides:
//! - CancellationToken for cooperative, tree-shaped cancellation
//! - CleanupRegistry for LIFO disposal callbacks

mod cleanup;
mod token;

pub use cleanup::CleanupRegistry;
pub use token::{CancelCallback, CancellationToken};
