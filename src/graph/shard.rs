//! The per-shard node map.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{ClockRef, VClock};
use crate::graph::Node;
use crate::prog::state::ProgramStore;

/// A node together with its per-request program state, guarded by one mutex.
///
/// The dispatcher locks the cell for the whole duration of a program
/// invocation; splitting node and store into separate fields lets the program
/// read the graph element while mutating its own state.
#[derive(Debug)]
pub struct NodeCell {
    pub node: Node,
    pub programs: ProgramStore,
}

/// Shared handle to one node's cell.
pub type SharedNode = Arc<Mutex<NodeCell>>;

/// All nodes owned by one shard, keyed by node handle.
///
/// The map itself is concurrent; per-node exclusion comes from each cell's
/// mutex, which callers hold only while a program runs (never across an
/// await).
#[derive(Debug)]
pub struct GraphShard {
    shard_id: u64,
    nodes: DashMap<u64, SharedNode>,
}

impl GraphShard {
    pub fn new(shard_id: u64) -> Self {
        Self {
            shard_id,
            nodes: DashMap::new(),
        }
    }

    pub fn shard_id(&self) -> u64 {
        self.shard_id
    }

    /// Install a node created at `creat`; its handle is the stamp's ticks.
    ///
    /// Returns the handle. Re-creating an existing handle replaces the node
    /// (the coordinator never reissues creation stamps).
    pub fn create_node(&self, creat: ClockRef) -> u64 {
        let handle = creat.ticks();
        debug!(shard = self.shard_id, handle, "creating node");
        self.nodes.insert(
            handle,
            Arc::new(Mutex::new(NodeCell {
                node: Node::new(creat),
                programs: ProgramStore::default(),
            })),
        );
        handle
    }

    /// The node's cell regardless of visibility.
    pub fn node(&self, handle: u64) -> Option<SharedNode> {
        self.nodes.get(&handle).map(|slot| Arc::clone(slot.value()))
    }

    /// The node's cell iff the node exists and is visible at `at`.
    ///
    /// `None` covers both an unknown handle and a node outside its lifetime
    /// window; the dispatcher treats either as a deleted hop target.
    pub fn live_node(&self, handle: u64, at: VClock) -> Option<SharedNode> {
        let slot = self.node(handle)?;
        let live = slot.lock().node.visible_at(at);
        live.then_some(slot)
    }

    /// Stamp the node deleted. Returns false for unknown handles.
    pub fn delete_node(&self, handle: u64, del: ClockRef) -> bool {
        match self.node(handle) {
            Some(slot) => {
                slot.lock().node.update_del_time(del);
                true
            }
            None => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop all program state retained for `req_id` on this shard.
    ///
    /// Requests are discarded lazily; the coordinator is free to call this
    /// any time after it has seen the terminal message.
    pub fn discard_request(&self, req_id: u64) {
        for slot in self.nodes.iter() {
            slot.value().lock().programs.discard_request(req_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::stamp;

    #[test]
    fn live_node_respects_lifetime() {
        let shard = GraphShard::new(1);
        let h = shard.create_node(stamp(10));

        assert!(shard.live_node(h, VClock::new(9)).is_none());
        assert!(shard.live_node(h, VClock::new(10)).is_some());

        assert!(shard.delete_node(h, stamp(20)));
        assert!(shard.live_node(h, VClock::new(19)).is_some());
        assert!(shard.live_node(h, VClock::new(20)).is_none());
        // The cell itself is still reachable for state cleanup.
        assert!(shard.node(h).is_some());
    }

    #[test]
    fn unknown_handles() {
        let shard = GraphShard::new(1);
        assert_eq!(shard.node_count(), 0);
        assert!(shard.node(404).is_none());
        assert!(!shard.delete_node(404, stamp(1)));
    }
}
