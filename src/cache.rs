//! Per-shard memoization of reachability facts.
//!
//! Traversal programs that prove "local node L can reach destination D" get
//! to remember it here, tagged with the request that produced the proof. The
//! inverse index makes invalidation O(1): when a request's writes are undone
//! (a deletion lands under it), dropping its id removes every fact it cached.
//!
//! All three operations serialize on a single mutex; readers never observe a
//! partially-updated pair of tables.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

/// Request-id sentinel returned on a cache miss.
pub const MISS: u64 = 0;

#[derive(Debug, Default)]
struct Bucket {
    locals: HashSet<u64>,
    req_id: u64,
}

#[derive(Debug, Default)]
struct Tables {
    /// dest node -> local nodes known to reach it, plus the caching request.
    forward: HashMap<u64, Bucket>,
    /// req id -> dest node, for id-based invalidation.
    invalidation: HashMap<u64, u64>,
}

/// Concurrency-safe reachability cache.
#[derive(Debug, Default)]
pub struct ReachCache {
    tables: Mutex<Tables>,
}

impl ReachCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `local` reaches `dest`, proven by `req_id`.
    ///
    /// Returns false if the (dest, local) pair was already cached. A second
    /// local under the same dest overwrites the bucket's recorded request:
    /// the cache tracks the most recent proof.
    pub fn insert_entry(&self, dest: u64, local: u64, req_id: u64) -> bool {
        let mut tables = self.tables.lock();
        let bucket = tables.forward.entry(dest).or_default();
        if !bucket.locals.insert(local) {
            return false;
        }
        bucket.req_id = req_id;
        tables.invalidation.insert(req_id, dest);
        true
    }

    /// The request that cached `(dest, local)`, or [`MISS`].
    pub fn get_req_id(&self, dest: u64, local: u64) -> u64 {
        let tables = self.tables.lock();
        match tables.forward.get(&dest) {
            Some(bucket) if bucket.locals.contains(&local) => bucket.req_id,
            _ => MISS,
        }
    }

    /// Invalidate everything proven under `req_id`.
    ///
    /// Drops the whole dest bucket the request points at, even when a later
    /// request has since overwritten the bucket's recorded id. No-op for ids
    /// never recorded or already removed.
    pub fn remove_entry(&self, req_id: u64) {
        let mut tables = self.tables.lock();
        if let Some(dest) = tables.invalidation.remove(&req_id) {
            tables.forward.remove(&dest);
        }
    }

    /// Check the cross-table invariant: every forward bucket's recorded
    /// request id maps back to that bucket's dest. (Superseded ids may
    /// linger in the invalidation table; that direction is not required.)
    /// Test support.
    #[doc(hidden)]
    pub fn invariant_holds(&self) -> bool {
        let tables = self.tables.lock();
        tables
            .forward
            .iter()
            .all(|(dest, bucket)| tables.invalidation.get(&bucket.req_id) == Some(dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let cache = ReachCache::new();
        assert!(cache.insert_entry(7, 3, 42));
        assert_eq!(cache.get_req_id(7, 3), 42);
        assert_eq!(cache.get_req_id(7, 4), MISS);
        assert_eq!(cache.get_req_id(8, 3), MISS);
        // Duplicate pair is rejected.
        assert!(!cache.insert_entry(7, 3, 43));
        assert_eq!(cache.get_req_id(7, 3), 42);
    }

    #[test]
    fn most_recent_proof_wins() {
        let cache = ReachCache::new();
        assert!(cache.insert_entry(7, 3, 42));
        assert!(cache.insert_entry(7, 4, 99));
        // Both locals now answer with the latest request id.
        assert_eq!(cache.get_req_id(7, 3), 99);
        assert_eq!(cache.get_req_id(7, 4), 99);
    }

    #[test]
    fn invalidation_drops_whole_bucket() {
        let cache = ReachCache::new();
        cache.insert_entry(7, 3, 42);
        cache.insert_entry(7, 4, 99);
        cache.insert_entry(8, 5, 100);

        // 42 was superseded by 99 for dest 7; removing it still names dest 7.
        cache.remove_entry(42);
        assert_eq!(cache.get_req_id(7, 3), MISS);
        assert_eq!(cache.get_req_id(7, 4), MISS);
        assert_eq!(cache.get_req_id(8, 5), 100);
        assert!(cache.invariant_holds());

        // Unknown ids are a no-op.
        cache.remove_entry(12345);
        assert!(cache.invariant_holds());
    }

    #[test]
    fn invariant_after_mixed_workload() {
        let cache = ReachCache::new();
        for i in 0..100u64 {
            cache.insert_entry(i % 10, i, 1000 + i);
            if i % 3 == 0 {
                cache.remove_entry(1000 + i / 2);
            }
            assert!(cache.invariant_holds(), "after step {i}");
        }
    }
}
