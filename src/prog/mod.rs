//! Node programs: graph computations that travel with their messages.
//!
//! A node program runs one invocation per inbound hop. The dispatcher locks
//! the target node, hands the program a read view of it plus typed hooks
//! into its per-request state, and routes whatever `(destination, params)`
//! pairs the invocation returns. Sending to another node continues the
//! traversal on that node's shard; sending to the coordinator sink ends the
//! request.
//!
//! Programs are pure with respect to the graph: they read the node under the
//! request's snapshot clock and mutate only their own params and state.

pub mod state;

pub mod dijkstra;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::graph::{Node, RemoteNode};
use state::ProgramStore;

/// A distributed graph computation.
///
/// Implementations are stateless types; everything an invocation needs
/// arrives through its arguments. `Params` is the hop payload, `State` the
/// per-(node, request) memory between hops, `CacheValue` the shape of any
/// memoized partial results the program chooses to publish.
pub trait NodeProgram: Sized + Send + Sync + 'static {
    type Params: Serialize + DeserializeOwned + Clone + Send + std::fmt::Debug + 'static;
    type State: Default + Serialize + DeserializeOwned + Send + 'static;
    type CacheValue: Send + Sync + 'static;

    /// Run one hop at a live node.
    ///
    /// `remote_self` is the visiting node's own cluster-wide address; the
    /// node's mutex is held for the duration of the call.
    fn run(
        req_id: u64,
        node: &Node,
        remote_self: RemoteNode,
        params: &mut Self::Params,
        hooks: &mut ProgramHooks<'_, Self>,
    ) -> Vec<(RemoteNode, Self::Params)>;

    /// Run the deleted-node variant.
    ///
    /// Invoked by the shard a hop lands on when the target handle is unknown
    /// there or no longer visible at the request clock. There is no node to
    /// lock and no state to consult; the program decides where the traversal
    /// resumes.
    fn run_deleted(
        req_id: u64,
        deleted_handle: u64,
        params: &mut Self::Params,
    ) -> Vec<(RemoteNode, Self::Params)>;
}

/// Typed access to a node's per-request storage, scoped to one invocation.
///
/// This is the program's only channel to durable state: one capability
/// object with the three operations of the node-program ABI (get-or-create
/// state, publish a cache value, read published values).
pub struct ProgramHooks<'a, P: NodeProgram> {
    req_id: u64,
    store: &'a mut ProgramStore,
    _program: PhantomData<P>,
}

impl<'a, P: NodeProgram> ProgramHooks<'a, P> {
    pub fn new(req_id: u64, store: &'a mut ProgramStore) -> Self {
        Self {
            req_id,
            store,
            _program: PhantomData,
        }
    }

    pub fn req_id(&self) -> u64 {
        self.req_id
    }

    /// The program's state at this node for this request, created on first
    /// access and persistent until the request is discarded.
    pub fn state(&mut self) -> &mut P::State {
        self.store.state_or_init(self.req_id, P::State::default)
    }

    /// Publish a cached partial result for this request.
    pub fn put_cache_value(&mut self, value: P::CacheValue) {
        self.store.put_cache_value(self.req_id, value);
    }

    /// Previously published cache values relevant to this request.
    pub fn cached_values(&self) -> Vec<Arc<P::CacheValue>> {
        self.store.cached_values(self.req_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prog::dijkstra::{DijkstraCacheValue, DijkstraProgram};

    #[test]
    fn hooks_share_the_store_across_invocations() {
        let mut store = ProgramStore::default();

        let mut hooks = ProgramHooks::<DijkstraProgram>::new(7, &mut store);
        assert_eq!(hooks.req_id(), 7);
        hooks.put_cache_value(DijkstraCacheValue {
            edge_weight_key: 0,
            dst_node: 42,
            cost: 9,
            is_widest: false,
        });

        // A later invocation for the same request sees the published value.
        let hooks = ProgramHooks::<DijkstraProgram>::new(7, &mut store);
        let values = hooks.cached_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].dst_node, 42);

        // Other requests see nothing.
        let hooks = ProgramHooks::<DijkstraProgram>::new(8, &mut store);
        assert!(hooks.cached_values().is_empty());
    }
}
