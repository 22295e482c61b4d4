//! Per-(node, request) program state and cached values.
//!
//! A node program's state must survive between hops of the same request: the
//! Dijkstra frontier, for instance, lives at the source node across the whole
//! traversal. Each node cell owns one [`ProgramStore`] holding that state
//! plus any per-request cache values a program installs; both are keyed by
//! request id and type-erased so the store doesn't care which program is
//! running. Typed access goes through [`ProgramHooks`](crate::prog::ProgramHooks).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type AnyState = Box<dyn Any + Send>;
type AnyValue = Arc<dyn Any + Send + Sync>;

/// Type-erased per-request storage owned by a node cell.
///
/// Mutated only while the owning cell's mutex is held.
#[derive(Default)]
pub struct ProgramStore {
    states: HashMap<u64, AnyState>,
    cache_values: HashMap<u64, Vec<AnyValue>>,
}

impl ProgramStore {
    /// Mutable program state for `req_id`, created via `init` on first
    /// access.
    ///
    /// A request runs exactly one program, so the stored state always
    /// downcasts to the type that created it; a mismatch means two programs
    /// shared a request id and the state is reset rather than corrupted.
    pub fn state_or_init<S: Send + 'static>(
        &mut self,
        req_id: u64,
        init: impl Fn() -> S,
    ) -> &mut S {
        let slot = self.states.entry(req_id).or_insert_with(|| Box::new(init()));
        if !slot.is::<S>() {
            debug_assert!(false, "program state type mismatch for request {req_id}");
            *slot = Box::new(init());
        }
        match slot.downcast_mut::<S>() {
            Some(state) => state,
            None => unreachable!("slot was just reset to the requested type"),
        }
    }

    /// Install a cache value for `req_id`.
    pub fn put_cache_value<V: Send + Sync + 'static>(&mut self, req_id: u64, value: V) {
        self.cache_values
            .entry(req_id)
            .or_default()
            .push(Arc::new(value));
    }

    /// All cache values of type `V` installed for `req_id`.
    pub fn cached_values<V: Send + Sync + 'static>(&self, req_id: u64) -> Vec<Arc<V>> {
        self.cache_values
            .get(&req_id)
            .into_iter()
            .flatten()
            .filter_map(|v| Arc::clone(v).downcast::<V>().ok())
            .collect()
    }

    /// Drop everything retained for `req_id`.
    pub fn discard_request(&mut self, req_id: u64) {
        self.states.remove(&req_id);
        self.cache_values.remove(&req_id);
    }

    pub fn request_count(&self) -> usize {
        self.states.len()
    }
}

impl fmt::Debug for ProgramStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramStore")
            .field("states", &self.states.len())
            .field("cache_values", &self.cache_values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, PartialEq, Debug)]
    struct Counter {
        hops: u32,
    }

    #[test]
    fn state_persists_across_accesses() {
        let mut store = ProgramStore::default();
        store.state_or_init(1, Counter::default).hops += 1;
        store.state_or_init(1, Counter::default).hops += 1;
        assert_eq!(store.state_or_init(1, Counter::default).hops, 2);
        // A different request gets fresh state.
        assert_eq!(store.state_or_init(2, Counter::default).hops, 0);
    }

    #[test]
    fn cache_values_round_trip() {
        let mut store = ProgramStore::default();
        store.put_cache_value(1, "proof".to_string());
        store.put_cache_value(1, "another".to_string());

        let values = store.cached_values::<String>(1);
        assert_eq!(values.len(), 2);
        assert!(store.cached_values::<String>(2).is_empty());
        // Wrong type yields nothing rather than corrupt data.
        assert!(store.cached_values::<u64>(1).is_empty());
    }

    #[test]
    fn discard_request_clears_both_tables() {
        let mut store = ProgramStore::default();
        store.state_or_init(1, Counter::default).hops = 5;
        store.put_cache_value(1, 7u64);
        store.discard_request(1);

        assert_eq!(store.request_count(), 0);
        assert_eq!(store.state_or_init(1, Counter::default).hops, 0);
        assert!(store.cached_values::<u64>(1).is_empty());
    }
}
