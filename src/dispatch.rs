//! The shard server: hop dispatch and program invocation.
//!
//! One [`ShardServer`] runs per shard. Inbound hops arrive on a channel;
//! each is handled by its own task under a semaphore bound. Handling a hop
//! means decoding the params, locking the target node's cell, running the
//! program synchronously under that lock, then routing the returned
//! messages: terminal results to the coordinator sink, everything else to
//! the shard that owns the destination node.
//!
//! The node lock is never held across an await: the program runs to
//! completion first, outbound sends happen after the guard is dropped.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use snafu::{ResultExt, Snafu};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::cache::ReachCache;
use crate::clock::VClock;
use crate::config::ShardConfig;
use crate::graph::{GraphShard, NodeCell, RemoteNode};
use crate::nmap::{NmapBackend, NmapClient};
use crate::prog::{NodeProgram, ProgramHooks};
use crate::wire::{self, HopEnvelope, WireError};

#[derive(Debug, Snafu)]
pub enum DispatchError {
    /// Inbound params did not decode; the hop is dropped.
    #[snafu(display("undecodable hop payload for request {req_id}: {source}"))]
    Payload { req_id: u64, source: WireError },

    /// An outbound message could not be encoded.
    #[snafu(display("failed to encode outbound hop: {source}"))]
    Outbound { source: WireError },

    /// The transport refused a delivery.
    #[snafu(display("delivery to shard {shard} failed: {message}"))]
    Delivery { shard: u64, message: String },
}

/// Delivery of framed hops between shards and to the coordinator sink.
///
/// Implementations route by `env.dst.shard`; the in-memory test router and a
/// real network transport both fit behind this seam.
#[async_trait]
pub trait HopTransport: Send + Sync + 'static {
    async fn deliver(&self, env: HopEnvelope) -> Result<(), DispatchError>;
}

/// Per-shard execution engine for one node program type.
pub struct ShardServer<P, B, T> {
    shard_id: u64,
    graph: Arc<GraphShard>,
    reach_cache: Arc<ReachCache>,
    nmap: NmapClient<B>,
    transport: Arc<T>,
    permits: Arc<Semaphore>,
    _program: PhantomData<P>,
}

impl<P, B, T> ShardServer<P, B, T>
where
    P: NodeProgram,
    B: NmapBackend + 'static,
    T: HopTransport,
{
    pub fn new(
        config: &ShardConfig,
        graph: Arc<GraphShard>,
        nmap: NmapClient<B>,
        transport: Arc<T>,
    ) -> Self {
        debug_assert_eq!(config.shard_id, graph.shard_id());
        Self {
            shard_id: config.shard_id,
            graph,
            reach_cache: Arc::new(ReachCache::new()),
            nmap,
            transport,
            permits: Arc::new(Semaphore::new(config.max_inflight_hops)),
            _program: PhantomData,
        }
    }

    pub fn shard_id(&self) -> u64 {
        self.shard_id
    }

    pub fn graph(&self) -> &Arc<GraphShard> {
        &self.graph
    }

    pub fn reach_cache(&self) -> &ReachCache {
        &self.reach_cache
    }

    /// Lazily drop everything retained for an abandoned or finished request.
    pub fn discard_request(&self, req_id: u64) {
        self.graph.discard_request(req_id);
    }

    /// Invalidate reachability facts proven under `req_id`.
    pub fn invalidate_reachability(&self, req_id: u64) {
        self.reach_cache.remove_entry(req_id);
    }

    /// Serve hops from `inbox` until the channel closes.
    ///
    /// Each hop runs in its own task; the semaphore bounds how many programs
    /// execute concurrently on this shard.
    pub async fn serve(self: Arc<Self>, mut inbox: mpsc::Receiver<HopEnvelope>) {
        info!(shard = self.shard_id, "shard server accepting hops");
        while let Some(env) = inbox.recv().await {
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                // Semaphore closed: shutting down.
                Err(_) => break,
            };
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = server.handle_hop(env).await {
                    // A hop that cannot be handled is dropped; the request
                    // stalls and its coordinator times it out.
                    warn!(shard = server.shard_id, error = %err, "dropping hop");
                }
            });
        }
        info!(shard = self.shard_id, "shard server stopped");
    }

    /// Handle one inbound hop end to end.
    pub async fn handle_hop(&self, env: HopEnvelope) -> Result<(), DispatchError> {
        debug_assert_eq!(env.dst.shard, self.shard_id, "hop routed to wrong shard");
        let mut params: P::Params = wire::decode_body(&env.params)
            .context(PayloadSnafu { req_id: env.req_id })?;

        let at = VClock::new(env.req_id);
        let outputs = match self.graph.live_node(env.dst.handle, at) {
            Some(slot) => {
                let mut cell = slot.lock();
                let NodeCell { node, programs } = &mut *cell;
                let mut hooks = ProgramHooks::<P>::new(env.req_id, programs);
                let me = RemoteNode::new(self.shard_id, env.dst.handle);
                debug!(req_id = env.req_id, node = env.dst.handle, "invoking program");
                P::run(env.req_id, node, me, &mut params, &mut hooks)
            }
            None => {
                // Unknown handle or outside its lifetime window at this
                // clock: the deleted-node hook decides where to resume.
                P::run_deleted(env.req_id, env.dst.handle, &mut params)
            }
        };

        for (dst, outbound) in outputs {
            self.route(env.req_id, dst, outbound).await?;
        }
        Ok(())
    }

    /// Send one program output on its way.
    ///
    /// The destination's owning shard is confirmed through the directory;
    /// the shard id embedded in the `RemoteNode` is a hint that can go stale
    /// when nodes migrate. Coordinator messages bypass the directory.
    async fn route(
        &self,
        req_id: u64,
        dst: RemoteNode,
        outbound: P::Params,
    ) -> Result<(), DispatchError> {
        let body = wire::encode_body(&outbound).context(OutboundSnafu)?;

        let shard = if dst.is_coordinator() {
            dst.shard
        } else {
            let wanted: HashSet<u64> = [dst.handle].into();
            match self.nmap.get_mappings(&wanted).await.pop() {
                Some((_, shard)) => shard,
                None => {
                    debug!(req_id, handle = dst.handle, "directory miss, using embedded shard");
                    dst.shard
                }
            }
        };

        self.transport
            .deliver(HopEnvelope {
                req_id,
                dst: RemoteNode::new(shard, dst.handle),
                params: body,
            })
            .await
    }
}
