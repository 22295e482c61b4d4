//! Centralized constants for the shard runtime.
//!
//! Sentinels, wire-level names, and resource bounds live here so every
//! subsystem agrees on them. Bounds are fixed at compile time; nothing in the
//! hop path allocates without a limit.

/// Shard identifier reserved for the coordinator sink.
///
/// Real shards are numbered starting at 1; a hop addressed to this shard is a
/// terminal result for its request.
pub const COORD_SHARD_ID: u64 = 0;

/// Reserved node handle of the coordinator sink.
pub const COORD_HANDLE: u64 = 1337;

/// KV space holding the node-to-shard directory.
pub const NMAP_SPACE: &str = "weaver_loc_mapping";

/// Attribute name under which a node's owning shard is stored.
pub const NMAP_ATTR_SHARD: &str = "shard";

/// Exact byte width of a directory key and of the `shard` attribute value.
///
/// Both are raw little-endian `u64`s; a lookup that comes back with any other
/// width is malformed and gets dropped.
pub const NMAP_VALUE_LEN: usize = 8;

/// Largest name-map batch submitted in one pipelined round.
pub const MAX_NMAP_BATCH: usize = 4096;

/// Hard ceiling on an encoded hop frame, header included (1 MiB).
///
/// A traversal's params grow with `entries_to_add` and `final_path`; both are
/// bounded by out-degree and path length, so 1 MiB leaves generous headroom
/// while still catching runaway payloads.
pub const MAX_HOP_MESSAGE_SIZE: usize = 1024 * 1024;

/// Maximum node-program invocations running concurrently on one shard.
pub const MAX_CONCURRENT_PROGRAMS: usize = 64;

/// Depth of a shard server's inbound hop queue.
pub const HOP_INBOX_DEPTH: usize = 1024;
