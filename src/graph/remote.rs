//! Location-addressable node references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{COORD_HANDLE, COORD_SHARD_ID};

/// A `(shard, handle)` reference to a node anywhere in the cluster.
///
/// Pure value: freely copyable, owns nothing. Edges store one per neighbor,
/// and hop messages are addressed by one.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
)]
pub struct RemoteNode {
    pub shard: u64,
    pub handle: u64,
}

impl RemoteNode {
    pub fn new(shard: u64, handle: u64) -> Self {
        Self { shard, handle }
    }

    /// The well-known coordinator sink; hops sent here are terminal results.
    pub fn coordinator() -> Self {
        Self {
            shard: COORD_SHARD_ID,
            handle: COORD_HANDLE,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.shard == COORD_SHARD_ID && self.handle == COORD_HANDLE
    }
}

impl fmt::Display for RemoteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.shard, self.handle)
    }
}
