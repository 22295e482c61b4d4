//! Deterministic test infrastructure.
//!
//! Multi-shard traversals are tested without real network or KV I/O: an
//! in-memory KV store backs the directory, and an in-memory router delivers
//! hop frames between shard servers running on the local runtime. Terminal
//! messages land in the router's coordinator sink where tests await them.

mod kv;
mod router;

pub use kv::MemoryKv;
pub use router::{HopRouter, TestCluster};
