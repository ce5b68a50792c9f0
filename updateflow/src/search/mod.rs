//! Concurrent directory of live update contexts.
//!
//! Contexts are found by their conversation and the bot that received them.
//! At most one context is live per key: installing a new one retires its
//! predecessor.

mod bag;
mod concurrent;

pub use bag::{SearchKey, UpdateContextSearchBag, UpdateContextSearchData};
pub use concurrent::ConcurrentSearchBag;
