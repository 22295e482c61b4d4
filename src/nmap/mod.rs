//! The node-to-shard directory.
//!
//! Every node handle maps to the shard that owns it; the mapping lives in an
//! external KV store under one space, with the owning shard in a single
//! integer attribute. The client here batches directory traffic and
//! pipelines it: a whole batch is submitted before any completion is
//! awaited, so a round costs one RTT instead of one per key.
//!
//! Directory writes are best-effort from the caller's perspective. Per-op
//! failures are logged, never raised; a failed read batch comes back empty
//! and the caller falls back or retries at its own layer. One client
//! instance serves one task at a time; spin up more instances for parallel
//! traffic.

mod backend;

pub use backend::{BackendError, KvAttribute, NmapBackend};

use std::collections::{HashMap, HashSet};

use futures::stream::{FuturesUnordered, StreamExt};
use snafu::Snafu;
use tracing::{debug, warn};

use crate::constants::{MAX_NMAP_BATCH, NMAP_ATTR_SHARD, NMAP_SPACE, NMAP_VALUE_LEN};

/// Error surfaced by the few directory operations that do fail loudly.
#[derive(Debug, Snafu)]
pub enum NmapError {
    /// The backing store rejected an administrative operation.
    #[snafu(display("directory space operation failed: {source}"))]
    Space { source: BackendError },
}

/// Batched, pipelined directory client.
pub struct NmapClient<B> {
    backend: B,
    space: String,
}

impl<B: NmapBackend> NmapClient<B> {
    pub fn new(backend: B) -> Self {
        Self::with_space(backend, NMAP_SPACE)
    }

    pub fn with_space(backend: B, space: impl Into<String>) -> Self {
        Self {
            backend,
            space: space.into(),
        }
    }

    /// Record the owning shard for each handle.
    ///
    /// All puts are submitted up front, then one completion is drained per
    /// submission. The first failed completion stops the drain: later writes
    /// may or may not have landed, which is fine because the directory entry
    /// for a handle is idempotent. Each value buffer is owned by its
    /// in-flight operation, so it stays live until that operation completes.
    pub async fn put_mappings(&self, pairs: &HashMap<u64, u64>) {
        debug_assert!(pairs.len() <= MAX_NMAP_BATCH, "directory batch too large");
        let mut inflight: FuturesUnordered<_> = pairs
            .iter()
            .map(|(&handle, &shard)| {
                let attr =
                    KvAttribute::new(NMAP_ATTR_SHARD, shard.to_le_bytes().to_vec());
                self.backend.put(&self.space, handle.to_le_bytes(), attr)
            })
            .collect();

        while let Some(completion) = inflight.next().await {
            if let Err(err) = completion {
                warn!(%err, "directory put failed, aborting batch");
                return;
            }
        }
    }

    /// Resolve the owning shard for each requested handle.
    ///
    /// Returns only the handles whose lookup succeeded with exactly one
    /// attribute of the expected width. Any failed completion voids the
    /// whole batch (empty result) so callers never act on a torn read.
    pub async fn get_mappings(&self, handles: &HashSet<u64>) -> Vec<(u64, u64)> {
        debug_assert!(handles.len() <= MAX_NMAP_BATCH, "directory batch too large");
        let mut inflight: FuturesUnordered<_> = handles
            .iter()
            .map(|&handle| {
                let backend = &self.backend;
                let space = &self.space;
                async move { (handle, backend.get(space, handle.to_le_bytes()).await) }
            })
            .collect();

        let mut found = Vec::with_capacity(handles.len());
        while let Some((handle, completion)) = inflight.next().await {
            match completion {
                Ok(attrs) => {
                    if let Some(shard) = decode_shard_attrs(handle, &attrs) {
                        found.push((handle, shard));
                    }
                }
                Err(err) => {
                    warn!(handle, %err, "directory get failed, voiding batch");
                    return Vec::new();
                }
            }
        }
        found
    }

    /// Drop the directory entries for the given handles.
    ///
    /// Soft failures: the first failed completion stops the drain and is
    /// logged. Deleting an absent handle is not an error.
    pub async fn del_mappings(&self, handles: &[u64]) {
        debug_assert!(handles.len() <= MAX_NMAP_BATCH, "directory batch too large");
        let mut inflight: FuturesUnordered<_> = handles
            .iter()
            .map(|&handle| {
                let backend = &self.backend;
                let space = &self.space;
                async move { (handle, backend.del(space, handle.to_le_bytes()).await) }
            })
            .collect();

        while let Some((handle, completion)) = inflight.next().await {
            match completion {
                Ok(existed) => {
                    if !existed {
                        debug!(handle, "directory del of absent handle");
                    }
                }
                Err(err) => {
                    warn!(handle, %err, "directory del failed, aborting batch");
                    return;
                }
            }
        }
    }

    /// Drop the whole backing space.
    pub async fn clean_up_space(&self) -> Result<(), NmapError> {
        self.backend
            .drop_space(&self.space)
            .await
            .map_err(|source| NmapError::Space { source })
    }
}

/// Pick the shard id out of a lookup result, or log why it doesn't parse.
fn decode_shard_attrs(handle: u64, attrs: &[KvAttribute]) -> Option<u64> {
    match attrs {
        [] => {
            debug!(handle, "handle not present in directory");
            None
        }
        [attr] => {
            if attr.name != NMAP_ATTR_SHARD || attr.value.len() != NMAP_VALUE_LEN {
                warn!(
                    handle,
                    attr = %attr.name,
                    len = attr.value.len(),
                    "malformed directory attribute"
                );
                return None;
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&attr.value);
            Some(u64::from_le_bytes(raw))
        }
        more => {
            warn!(handle, count = more.len(), "directory lookup returned multiple attributes");
            None
        }
    }
}
