use std::{hash::Hash, time::Duration};

use moka::{policy::EvictionPolicy, sync::Cache};

/// LRU cache for a context table.
///
/// `capacity == 0` leaves the cache unbounded. With `idle` set, entries not
/// read or written for that long expire.
pub(crate) fn context_cache<K, V>(capacity: usize, idle: Option<Duration>) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let mut builder = Cache::builder().eviction_policy(EvictionPolicy::lru());
    if capacity > 0 {
        builder = builder.max_capacity(capacity as u64);
    }
    if let Some(idle) = idle {
        builder = builder.time_to_idle(idle);
    }
    builder.build()
}

/// Entry count after pending evictions have been applied.
pub(crate) fn settled_len<K, V>(cache: &Cache<K, V>) -> usize
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache.run_pending_tasks();
    cache.entry_count() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let c = context_cache::<i32, &str>(2, None);
        c.insert(1, "a");
        c.insert(2, "b");
        c.run_pending_tasks();
        assert_eq!(c.get(&1), Some("a"));
        c.run_pending_tasks();
        c.insert(3, "c");
        c.run_pending_tasks();

        assert_eq!(settled_len(&c), 2);
        assert!(c.get(&2).is_none());
        assert_eq!(c.get(&1), Some("a"));
        assert_eq!(c.get(&3), Some("c"));
    }

    #[test]
    fn zero_capacity_is_unbounded() {
        let c = context_cache::<i32, i32>(0, None);
        for i in 0..1000 {
            c.insert(i, i);
        }
        assert_eq!(settled_len(&c), 1000);
    }

    #[test]
    fn idle_entries_expire() {
        let c = context_cache::<i32, i32>(10, Some(Duration::from_millis(50)));
        c.insert(1, 1);
        std::thread::sleep(Duration::from_millis(150));
        assert!(c.get(&1).is_none());
    }
}
