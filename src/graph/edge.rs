//! Outgoing edges.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::{self, ClockRef, VClock};
use crate::graph::{Property, RemoteNode};

/// An outgoing edge from a node to a [`RemoteNode`] neighbor.
///
/// Carries a property set and the usual creation/deletion stamps; the
/// deletion stamp is end-of-time while the edge is live. The numeric edge
/// weight used by traversal programs is an ordinary property whose key is the
/// decimal rendering of the program's weight key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Location of the neighbor this edge points at.
    pub nbr: RemoteNode,
    props: Vec<Property>,
    creat_time: ClockRef,
    del_time: ClockRef,
}

impl Edge {
    pub fn new(nbr: RemoteNode, creat: ClockRef) -> Self {
        Self {
            nbr,
            props: Vec::new(),
            creat_time: creat,
            del_time: clock::end_of_time(),
        }
    }

    pub fn creat_time(&self) -> &ClockRef {
        &self.creat_time
    }

    pub fn del_time(&self) -> &ClockRef {
        &self.del_time
    }

    /// True iff the edge is live at `at`.
    pub fn visible_at(&self, at: VClock) -> bool {
        *self.creat_time <= at && at < *self.del_time
    }

    /// Mark the edge deleted.
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

    /// Equality probe by (key, value); stamps are ignored on both sides.
    pub fn has_property(&self, pred: &Property) -> bool {
        self.props.iter().any(|p| p == pred)
    }

    /// Parsed numeric value of the first property with `key` visible at `at`.
    pub fn property_value(&self, key: &str, at: VClock) -> Option<u64> {
        let prop = self
            .props
            .iter()
            .find(|p| p.key == key && p.visible_at(at))?;
        match prop.value.parse::<u64>() {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(key, value = %prop.value, %err, "edge property is not numeric");
                None
            }
        }
    }

    /// The edge weight under a program's numeric weight key.
    pub fn weight(&self, weight_key: u32, at: VClock) -> Option<u64> {
        self.property_value(&weight_key.to_string(), at)
    }
}
