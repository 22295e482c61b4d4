//! Weft: shard-side core of a distributed, versioned property graph.
//!
//! The graph is partitioned across shards; each shard owns a set of nodes
//! and their outgoing edges. User-defined node programs traverse the graph
//! one hop at a time, each hop a message from one shard to another, and
//! report their result to a coordinator sink. Elements carry creation and
//! deletion stamps, and every read during a request uses the request's own
//! clock, so a traversal observes one consistent snapshot regardless of
//! concurrent writes.
//!
//! What lives here:
//!
//! - the versioned element store ([`graph`]);
//! - the node-to-shard directory client over an external KV store ([`nmap`]);
//! - the reachability cache ([`cache`]);
//! - the node-program ABI, state store, and the Dijkstra / widest-path
//!   traversal program ([`prog`]);
//! - wire framing and the per-shard hop dispatcher ([`wire`], [`dispatch`]).
//!
//! Transport, clock generation, the KV store itself, and coordinator
//! admission are external; they plug in through the [`dispatch::HopTransport`]
//! and [`nmap::NmapBackend`] seams.

/// Reachability memoization with id-based invalidation.
pub mod cache;
/// Logical timestamps and their shared handles.
pub mod clock;
/// Environment-driven shard configuration.
pub mod config;
/// Sentinels, wire names, and resource bounds.
pub mod constants;
/// Hop dispatch: program invocation and routing.
pub mod dispatch;
/// The versioned property graph owned by one shard.
pub mod graph;
/// The batched node-to-shard directory client.
pub mod nmap;
/// Node programs and their per-request state.
pub mod prog;
/// Length-prefixed wire framing.
pub mod wire;

/// Deterministic in-memory cluster for tests.
pub mod testing;

pub use cache::ReachCache;
pub use clock::{ClockRef, VClock};
pub use config::ShardConfig;
pub use dispatch::{HopTransport, ShardServer};
pub use graph::{Edge, GraphShard, Node, Property, RemoteNode};
pub use nmap::NmapClient;
pub use prog::{NodeProgram, ProgramHooks};
pub use wire::HopEnvelope;
