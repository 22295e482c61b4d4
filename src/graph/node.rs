//! Nodes and their outgoing edges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock::{self, ClockRef, VClock};
use crate::graph::{Edge, Property};

/// A node owned by this shard.
///
/// The creation stamp doubles as the node's handle: programs identify nodes
/// by `creat_time.ticks()`, and the shard's node map is keyed the same way.
/// Outgoing edges live in an ordered map keyed by a shard-local edge handle;
/// iteration order is stable within a process but not meaningful.
///
/// A node is only ever touched under its slot's mutex (see
/// [`GraphShard`](crate::graph::GraphShard)); the methods here assume the
/// caller holds it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    creat_time: ClockRef,
    del_time: ClockRef,
    props: Vec<Property>,
    out_edges: BTreeMap<u64, Edge>,
    next_edge_handle: u64,
}

impl Node {
    pub fn new(creat: ClockRef) -> Self {
        Self {
            creat_time: creat,
            del_time: clock::end_of_time(),
            props: Vec::new(),
            out_edges: BTreeMap::new(),
            next_edge_handle: 1,
        }
    }

    /// The node's program-visible identity.
    pub fn handle(&self) -> u64 {
        self.creat_time.ticks()
    }

    pub fn creat_time(&self) -> &ClockRef {
        &self.creat_time
    }

    pub fn del_time(&self) -> &ClockRef {
        &self.del_time
    }

    pub fn visible_at(&self, at: VClock) -> bool {
        *self.creat_time <= at && at < *self.del_time
    }

    /// Mark the node deleted. Edges keep their own stamps.
    pub fn update_del_time(&mut self, del: ClockRef) {
        debug_assert!(*self.del_time == VClock::END_OF_TIME || *self.del_time < *del);
        self.del_time = del;
    }

    pub fn add_property(&mut self, prop: Property) {
        self.props.push(prop);
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.props.iter()
    }

    /// Attach an outgoing edge, returning its shard-local edge handle.
    pub fn add_edge(&mut self, edge: Edge) -> u64 {
        let handle = self.next_edge_handle;
        self.next_edge_handle += 1;
        self.out_edges.insert(handle, edge);
        handle
    }

    pub fn edge(&self, edge_handle: u64) -> Option<&Edge> {
        self.out_edges.get(&edge_handle)
    }

    pub fn edge_mut(&mut self, edge_handle: u64) -> Option<&mut Edge> {
        self.out_edges.get_mut(&edge_handle)
    }

    /// Stable iteration over all outgoing edges, live or not.
    pub fn out_edges(&self) -> impl Iterator<Item = &Edge> {
        self.out_edges.values()
    }

    pub fn out_degree(&self) -> usize {
        self.out_edges.len()
    }
}
