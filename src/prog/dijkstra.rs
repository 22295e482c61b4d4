//! Generalized Dijkstra as a distributed node program.
//!
//! One request computes either a single-source shortest path (additive
//! costs) or a widest path (maximize the minimum edge weight) between two
//! nodes. The frontier lives at the source node; every other node only ever
//! answers one question, "which neighbors can you reach and at what
//! priority", and sends the answer back. The traversal is a conversation:
//!
//! 1. The initial hop lands at the source, seeds the frontier from its
//!    out-edges, and sends a collect request to the best candidate.
//! 2. The candidate's shard walks its out-edges under the request snapshot
//!    and replies with `entries_to_add`.
//! 3. The source folds the reply into the frontier and picks the next
//!    candidate, until the destination is popped or the frontier drains.
//!
//! A hop that lands on a deleted node bounces straight back so the source
//! can move on to the next candidate. Exactly one message leaves every
//! invocation; the terminal one goes to the coordinator sink, carrying the
//! reconstructed path, or an empty path with zero cost when the destination
//! is unreachable.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::VClock;
use crate::graph::{Edge, Node, Property, RemoteNode};
use crate::prog::{NodeProgram, ProgramHooks};

/// A frontier entry: candidate node, the aggregate cost of reaching it, and
/// the node it was reached from (for path reconstruction).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct QueueElem {
    pub cost: u64,
    pub node: RemoteNode,
    pub prev_handle: u64,
}

impl QueueElem {
    pub fn new(cost: u64, node: RemoteNode, prev_handle: u64) -> Self {
        Self {
            cost,
            node,
            prev_handle,
        }
    }
}

/// Hop payload of the Dijkstra program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DijkstraParams {
    /// Handle of the source node; the frontier lives on its shard.
    pub src_handle: u64,
    /// Set on first entry at the source; collect replies are addressed here.
    pub source_node: RemoteNode,
    /// Handle of the destination node.
    pub dst_handle: u64,
    /// Numeric key of the edge property holding the weight.
    pub edge_weight_key: u32,
    /// Predicate filter: an edge is traversable only if it carries every
    /// listed property (by key and value).
    pub edge_props: Vec<Property>,
    /// Maximize the bottleneck instead of minimizing the sum.
    pub is_widest_path: bool,
    /// Message kind: true when carrying collected neighbor candidates, false
    /// on initial entry and on a deleted-target notice.
    pub adding_nodes: bool,
    /// Node the current candidate was reached from.
    pub prev_node: u64,
    /// Neighbor candidates collected at a remote node.
    pub entries_to_add: Vec<(u64, RemoteNode)>,
    /// The candidate currently being evaluated.
    pub next_node: u64,
    /// Reconstructed path once the destination is reached, destination
    /// first, source omitted. Shortest mode records per-edge costs; widest
    /// mode records the running aggregate at each node.
    pub final_path: Vec<(u64, u64)>,
    /// Aggregate cost so far.
    pub cost: u64,
}

impl DijkstraParams {
    pub fn new(src_handle: u64, dst_handle: u64, edge_weight_key: u32) -> Self {
        Self {
            src_handle,
            dst_handle,
            edge_weight_key,
            ..Self::default()
        }
    }

    /// Switch the request to widest-path aggregation.
    pub fn widest(mut self) -> Self {
        self.is_widest_path = true;
        self
    }

    /// Restrict traversal to edges carrying all of `props`.
    pub fn with_edge_props(mut self, props: Vec<Property>) -> Self {
        self.edge_props = props;
        self
    }
}

/// Frontier and visit log, persisted at the source node between hops.
///
/// Both heaps are always present so the serialized shape is uniform across
/// shortest and widest requests; exactly one of them is used per request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DijkstraState {
    pq_shortest: BinaryHeap<Reverse<QueueElem>>,
    pq_widest: BinaryHeap<QueueElem>,
    /// handle -> (previous handle on the best known path, aggregate cost).
    visited: HashMap<u64, (u64, u64)>,
}

impl DijkstraState {
    fn push(&mut self, widest: bool, elem: QueueElem) {
        if widest {
            self.pq_widest.push(elem);
        } else {
            self.pq_shortest.push(Reverse(elem));
        }
    }

    fn pop(&mut self, widest: bool) -> Option<QueueElem> {
        if widest {
            self.pq_widest.pop()
        } else {
            self.pq_shortest.pop().map(|rev| rev.0)
        }
    }
}

/// Memoized result shape published by completed traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DijkstraCacheValue {
    pub edge_weight_key: u32,
    pub dst_node: u64,
    pub cost: u64,
    pub is_widest: bool,
}

/// Fold one edge weight into the running aggregate.
///
/// Shortest paths add; widest paths keep the smallest weight seen, so the
/// aggregate is the path's bottleneck.
fn aggregate_cost(current: u64, edge_weight: u64, widest: bool) -> u64 {
    if widest {
        current.min(edge_weight)
    } else {
        current.saturating_add(edge_weight)
    }
}

/// Out-edges visible at `at` that carry every predicate property.
fn usable_edges<'a>(
    node: &'a Node,
    at: VClock,
    preds: &'a [Property],
) -> impl Iterator<Item = &'a Edge> {
    node.out_edges()
        .filter(move |e| e.visible_at(at) && preds.iter().all(|p| e.has_property(p)))
}

/// The Dijkstra / widest-path node program.
pub enum DijkstraProgram {}

impl DijkstraProgram {
    /// Source-side: fold the frontier and emit the next hop.
    ///
    /// Returns the single outbound message, or the terminal message when the
    /// destination was popped or the frontier drained.
    fn select_next(
        params: &mut DijkstraParams,
        state: &mut DijkstraState,
    ) -> (RemoteNode, DijkstraParams) {
        let widest = params.is_widest_path;
        while let Some(elem) = state.pop(widest) {
            params.cost = elem.cost;
            params.next_node = elem.node.handle;
            params.prev_node = elem.prev_handle;

            if params.next_node == params.dst_handle {
                return match reconstruct_path(params, state) {
                    Ok(()) => (RemoteNode::coordinator(), params.clone()),
                    // Broken visit log; abandon with a failure result.
                    Err(missing) => {
                        debug_assert!(false, "visit log lost handle {missing}");
                        fail(params)
                    }
                };
            }

            // A dominated pop is skipped outright: the recorded visit already
            // reaches this node at least as well.
            let dominated = state.visited.get(&params.next_node).is_some_and(|&(_, old)| {
                if widest {
                    old >= params.cost
                } else {
                    old <= params.cost
                }
            });
            if !dominated {
                trace!(next = params.next_node, cost = params.cost, "expanding candidate");
                return (elem.node, params.clone());
            }
        }

        fail(params)
    }
}

/// Terminal failure: empty path, zero cost.
fn fail(params: &mut DijkstraParams) -> (RemoteNode, DijkstraParams) {
    params.final_path.clear();
    params.cost = 0;
    (RemoteNode::coordinator(), params.clone())
}

/// Rebuild `final_path` by walking the visit log back from the destination.
///
/// Widest mode stores each node with the running bottleneck at that node.
/// Shortest mode stores each node with the cost of the edge into it,
/// recovered as the difference of cumulative costs, and omits the source.
fn reconstruct_path(params: &mut DijkstraParams, state: &DijkstraState) -> Result<(), u64> {
    let visited = |handle: u64| state.visited.get(&handle).copied().ok_or(handle);

    if params.is_widest_path {
        let mut cur_node = params.dst_handle;
        let mut cur_cost = params.cost;
        params.final_path.push((cur_node, cur_cost));
        cur_node = params.prev_node;
        let mut entry = visited(params.prev_node)?;
        while cur_node != params.src_handle {
            cur_cost = entry.1;
            params.final_path.push((cur_node, cur_cost));
            cur_node = entry.0;
            entry = visited(cur_node)?;
        }
    } else {
        let mut old_cost = params.cost;
        let mut old_node = params.dst_handle;
        let mut cur_node = params.prev_node;
        while old_node != params.src_handle {
            let entry = visited(cur_node)?;
            params.final_path.push((old_node, old_cost.saturating_sub(entry.1)));
            old_node = cur_node;
            old_cost = entry.1;
            cur_node = entry.0;
        }
    }
    Ok(())
}

impl NodeProgram for DijkstraProgram {
    type Params = DijkstraParams;
    type State = DijkstraState;
    type CacheValue = DijkstraCacheValue;

    fn run(
        req_id: u64,
        node: &Node,
        remote_self: RemoteNode,
        params: &mut DijkstraParams,
        hooks: &mut ProgramHooks<'_, Self>,
    ) -> Vec<(RemoteNode, DijkstraParams)> {
        let at = VClock::new(req_id);
        let widest = params.is_widest_path;

        if node.handle() == params.src_handle {
            let state = hooks.state();

            if params.adding_nodes {
                // Reply from a collect request: fold the candidates in and
                // log the visit that produced them.
                for (priority, rn) in params.entries_to_add.drain(..) {
                    state.push(widest, QueueElem::new(priority, rn, params.next_node));
                }
                state
                    .visited
                    .insert(params.next_node, (params.prev_node, params.cost));
            } else if state.visited.contains_key(&params.src_handle) {
                // Bounce from a deleted candidate: drop it and move on.
                debug!(req_id, candidate = params.next_node, "candidate was deleted");
                params.entries_to_add.clear();
            } else {
                // First entry: seed the frontier from the source's out-edges.
                params.source_node = remote_self;
                params.cost = if widest { u64::MAX } else { 0 };
                state
                    .visited
                    .insert(params.src_handle, (params.src_handle, params.cost));
                for edge in usable_edges(node, at, &params.edge_props) {
                    if let Some(w) = edge.weight(params.edge_weight_key, at) {
                        let priority = aggregate_cost(params.cost, w, widest);
                        state.push(widest, QueueElem::new(priority, edge.nbr, params.src_handle));
                    }
                }
                debug!(req_id, src = params.src_handle, dst = params.dst_handle, widest, "traversal started");
            }
            params.adding_nodes = true;

            vec![Self::select_next(params, state)]
        } else {
            // Collect request at a remote node: gather usable neighbors and
            // send them back to the source.
            for edge in usable_edges(node, at, &params.edge_props) {
                if let Some(w) = edge.weight(params.edge_weight_key, at) {
                    let priority = aggregate_cost(params.cost, w, widest);
                    params.entries_to_add.push((priority, edge.nbr));
                }
            }
            params.adding_nodes = true;
            vec![(params.source_node, params.clone())]
        }
    }

    fn run_deleted(
        req_id: u64,
        deleted_handle: u64,
        params: &mut DijkstraParams,
    ) -> Vec<(RemoteNode, DijkstraParams)> {
        debug!(req_id, deleted_handle, "hop target deleted, bouncing to source");
        params.adding_nodes = false;
        vec![(params.source_node, params.clone())]
    }
}
