//! DashMap-backed search bag.

use super::{SearchKey, UpdateContextSearchBag, UpdateContextSearchData};
use crate::context::{ContextId, EVICTED_REASON};
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

/// Search bag over a sharded concurrent map.
///
/// Per-key operations are serialized by the shard lock, so two concurrent
/// adds for one key always retire one another in order. Contexts are only
/// upgraded, cancelled or disposed in ways that never re-enter the map
/// while a shard lock is held.
#[derive(Debug, Default)]
pub struct ConcurrentSearchBag {
    entries: DashMap<SearchKey, UpdateContextSearchData>,
}

impl ConcurrentSearchBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpdateContextSearchBag for ConcurrentSearchBag {
    fn add(&self, data: UpdateContextSearchData) -> Option<UpdateContextSearchData> {
        let Some(context) = data.context() else {
            debug!(key = %data.key(), "Skipping add of dropped context");
            return None;
        };
        if context.is_disposed() {
            debug!(key = %data.key(), context_id = %data.context_id(), "Skipping add of disposed context");
            return None;
        }

        let key = data.key();
        let context_id = data.context_id();

        // The upgraded predecessor is carried out of the shard lock so its
        // last strong reference is never released while the lock is held.
        // Inside the lock it is only flagged as cancelled; child scopes and
        // callbacks may read the bag, so they run after the lock is gone.
        let retired = match self.entries.entry(key) {
            Entry::Occupied(mut slot) if slot.get().context_id() == context_id => {
                slot.insert(data);
                None
            }
            Entry::Occupied(mut slot) => {
                let previous = slot.get().context();
                if let Some(previous) = &previous {
                    previous.processing_aborted().mark_cancelled(EVICTED_REASON);
                }
                Some((slot.insert(data), previous))
            }
            Entry::Vacant(slot) => {
                slot.insert(data);
                None
            }
        };

        // A dispose racing with this add may have missed the new entry.
        if context.is_disposed() {
            self.entries
                .remove_if(&key, |_, entry| entry.context_id() == context_id);
        }

        let (old, previous) = retired?;
        debug!(key = %key, evicted = %old.context_id(), installed = %context_id, "Evicted previous context");
        if let Some(previous) = previous {
            previous.abort(EVICTED_REASON);
            previous.dispose_with_reason(EVICTED_REASON);
        }
        Some(old)
    }

    fn try_find(&self, chat_id: i64, bot_id: i64) -> Option<UpdateContextSearchData> {
        self.entries
            .get(&SearchKey::new(chat_id, bot_id))
            .map(|entry| entry.value().clone())
    }

    fn contains(&self, chat_id: i64, bot_id: i64) -> bool {
        self.entries.contains_key(&SearchKey::new(chat_id, bot_id))
    }

    fn try_remove(&self, chat_id: i64, bot_id: i64) -> Option<UpdateContextSearchData> {
        self.entries
            .remove(&SearchKey::new(chat_id, bot_id))
            .map(|(_, entry)| entry)
    }

    fn remove_if_same(&self, key: SearchKey, context_id: ContextId) -> Option<UpdateContextSearchData> {
        self.entries
            .remove_if(&key, |_, entry| entry.context_id() == context_id)
            .map(|(_, entry)| entry)
    }

    fn snapshot(&self) -> Vec<UpdateContextSearchData> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Services, UpdateContext};
    use crate::testing::{text_update, RecordingBotClient};
    use crate::cancellation::CancellationToken;
    use std::sync::Arc;

    fn context(chat_id: i64, bot_id: i64) -> Arc<UpdateContext> {
        let bot = RecordingBotClient::new().into_context(bot_id);
        Arc::new(UpdateContext::new(
            text_update(1, chat_id, "/start"),
            bot,
            Services::new(),
            &CancellationToken::new(),
        ))
    }

    fn entry(ctx: &Arc<UpdateContext>) -> UpdateContextSearchData {
        UpdateContextSearchData::new(ctx).unwrap()
    }

    #[test]
    fn test_add_and_find() {
        let bag = ConcurrentSearchBag::new();
        let ctx = context(1, 10);

        assert!(bag.add(entry(&ctx)).is_none());

        let found = bag.try_find(1, 10).unwrap();
        assert_eq!(found.context_id(), ctx.id());
        assert!(bag.contains(1, 10));
        assert!(!bag.contains(1, 11));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_add_same_key_evicts_previous() {
        let bag = ConcurrentSearchBag::new();
        let first = context(1, 10);
        let second = context(1, 10);

        bag.add(entry(&first));
        let retired = bag.add(entry(&second)).unwrap();

        assert_eq!(retired.context_id(), first.id());
        assert!(first.is_cancelled());
        assert!(first.is_disposed());
        assert_eq!(first.cancellation_reason().as_deref(), Some(EVICTED_REASON));
        assert_eq!(bag.try_find(1, 10).unwrap().context_id(), second.id());
        assert!(!second.is_cancelled());
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_readd_same_context_keeps_it_alive() {
        let bag = ConcurrentSearchBag::new();
        let ctx = context(1, 10);

        bag.add(entry(&ctx));
        assert!(bag.add(entry(&ctx)).is_none());
        assert!(!ctx.is_cancelled());
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_different_bots_do_not_collide() {
        let bag = ConcurrentSearchBag::new();
        let a = context(1, 10);
        let b = context(1, 20);

        bag.add(entry(&a));
        bag.add(entry(&b));

        assert_eq!(bag.len(), 2);
        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());
    }

    #[test]
    fn test_try_remove_absent_key_leaves_bag_untouched() {
        let bag = ConcurrentSearchBag::new();
        let ctx = context(1, 10);
        bag.add(entry(&ctx));

        assert!(bag.try_remove(2, 10).is_none());
        assert_eq!(bag.len(), 1);
        assert!(bag.contains(1, 10));
    }

    #[test]
    fn test_try_remove_returns_entry() {
        let bag = ConcurrentSearchBag::new();
        let ctx = context(1, 10);
        bag.add(entry(&ctx));

        let removed = bag.try_remove(1, 10).unwrap();
        assert_eq!(removed.context_id(), ctx.id());
        assert!(bag.try_find(1, 10).is_none());
        assert!(bag.is_empty());
    }

    #[test]
    fn test_remove_if_same_ignores_successor() {
        let bag = ConcurrentSearchBag::new();
        let first = context(1, 10);
        let second = context(1, 10);
        let key = SearchKey::new(1, 10);

        bag.add(entry(&first));
        bag.add(entry(&second));

        assert!(bag.remove_if_same(key, first.id()).is_none());
        assert!(bag.contains(1, 10));
        assert!(bag.remove_if_same(key, second.id()).is_some());
        assert!(bag.is_empty());
    }

    #[test]
    fn test_disposed_context_is_not_added() {
        let bag = ConcurrentSearchBag::new();
        let ctx = context(1, 10);
        let data = entry(&ctx);
        ctx.dispose();

        assert!(bag.add(data).is_none());
        assert!(bag.is_empty());
    }

    #[test]
    fn test_dropped_context_entry_is_stale() {
        let bag = ConcurrentSearchBag::new();
        let ctx = context(1, 10);
        let data = entry(&ctx);
        bag.add(data.clone());

        // Dropping the only owner disposes the context, which deregisters
        // nothing here because no observer was attached.
        drop(ctx);

        let found = bag.try_find(1, 10).unwrap();
        assert!(found.context().is_none());
        assert!(found.is_stale());
    }

    #[test]
    fn test_eviction_callbacks_can_read_the_bag() {
        let bag = Arc::new(ConcurrentSearchBag::new());
        let first = context(100, 7);
        let second = context(100, 7);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        bag.add(entry(&first));
        {
            let bag = bag.clone();
            let seen = seen.clone();
            first.processing_aborted().on_cancel(move |_| {
                let found = bag.try_find(100, 7).map(|e| e.context_id());
                seen.lock().push((bag.contains(100, 7), found));
            });
        }

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let worker = {
            let bag = bag.clone();
            let second = second.clone();
            std::thread::spawn(move || {
                bag.add(entry(&second));
                let _ = done_tx.send(());
            })
        };

        assert!(done_rx.recv_timeout(std::time::Duration::from_secs(3)).is_ok());
        worker.join().unwrap();
        assert!(first.is_disposed());
        assert_eq!(*seen.lock(), vec![(true, Some(second.id()))]);
    }

    #[test]
    fn test_concurrent_adds_leave_one_live_entry() {
        let bag = Arc::new(ConcurrentSearchBag::new());
        let contexts: Vec<_> = (0..32).map(|_| context(5, 50)).collect();

        std::thread::scope(|scope| {
            for ctx in &contexts {
                let bag = bag.clone();
                scope.spawn(move || {
                    bag.add(entry(ctx));
                });
            }
        });

        assert_eq!(bag.len(), 1);
        let live = bag.try_find(5, 50).unwrap();
        let live_count = contexts.iter().filter(|c| !c.is_cancelled()).count();
        assert_eq!(live_count, 1);
        assert!(contexts
            .iter()
            .filter(|c| c.id() != live.context_id())
            .all(|c| c.is_cancelled() && c.is_disposed()));
    }
}
