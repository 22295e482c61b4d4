//! In-memory hop routing between shard servers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::clock::stamp;
use crate::config::ShardConfig;
use crate::constants::HOP_INBOX_DEPTH;
use crate::dispatch::{DispatchError, HopTransport, ShardServer};
use crate::graph::{Edge, GraphShard, Property, RemoteNode};
use crate::nmap::NmapClient;
use crate::prog::NodeProgram;
use crate::wire::{self, HopEnvelope};

/// Routes hop frames to per-shard inboxes and collects terminal messages.
///
/// The coordinator sink is a channel; tests await it instead of sleeping.
pub struct HopRouter {
    inboxes: Mutex<HashMap<u64, mpsc::Sender<HopEnvelope>>>,
    terminals: Mutex<Vec<HopEnvelope>>,
    terminal_tx: mpsc::UnboundedSender<HopEnvelope>,
    terminal_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<HopEnvelope>>,
    delivered: Mutex<Vec<HopEnvelope>>,
}

impl Default for HopRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl HopRouter {
    pub fn new() -> Self {
        let (terminal_tx, terminal_rx) = mpsc::unbounded_channel();
        Self {
            inboxes: Mutex::new(HashMap::new()),
            terminals: Mutex::new(Vec::new()),
            terminal_tx,
            terminal_rx: tokio::sync::Mutex::new(terminal_rx),
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, shard_id: u64, inbox: mpsc::Sender<HopEnvelope>) {
        self.inboxes.lock().insert(shard_id, inbox);
    }

    /// Hops delivered to a specific node, for asserting traversal shape.
    pub fn hops_to_node(&self, dst: RemoteNode) -> usize {
        self.delivered
            .lock()
            .iter()
            .filter(|env| env.dst == dst)
            .count()
    }

    /// Wait for the terminal message of `req_id` and decode its params.
    ///
    /// Terminals for other requests seen along the way are retained, so the
    /// call order of concurrent requests does not matter.
    pub async fn await_terminal<P: NodeProgram>(
        &self,
        req_id: u64,
        timeout: Duration,
    ) -> Option<P::Params> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut rx = self.terminal_rx.lock().await;
        loop {
            if let Some(env) = self
                .terminals
                .lock()
                .iter()
                .find(|env| env.req_id == req_id)
            {
                return wire::decode_body(&env.params).ok();
            }
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(env)) => self.terminals.lock().push(env),
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

#[async_trait]
impl HopTransport for HopRouter {
    async fn deliver(&self, env: HopEnvelope) -> Result<(), DispatchError> {
        self.delivered.lock().push(env.clone());

        if env.dst.is_coordinator() {
            debug!(req_id = env.req_id, "terminal message reached coordinator sink");
            let _ = self.terminal_tx.send(env);
            return Ok(());
        }

        let inbox = self.inboxes.lock().get(&env.dst.shard).cloned();
        match inbox {
            Some(inbox) => inbox.send(env).await.map_err(|e| DispatchError::Delivery {
                shard: e.0.dst.shard,
                message: "shard inbox closed".to_string(),
            }),
            None => Err(DispatchError::Delivery {
                shard: env.dst.shard,
                message: "no such shard registered".to_string(),
            }),
        }
    }
}

/// A little cluster of shard servers wired through one [`HopRouter`] and one
/// [`MemoryKv`](crate::testing::MemoryKv) directory.
pub struct TestCluster<P: NodeProgram> {
    router: Arc<HopRouter>,
    kv: Arc<crate::testing::MemoryKv>,
    shards: HashMap<u64, Arc<ShardServer<P, Arc<crate::testing::MemoryKv>, HopRouter>>>,
}

impl<P: NodeProgram> TestCluster<P> {
    /// Spin up shards `1..=num_shards`, each serving its inbox on the
    /// current runtime.
    pub fn new(num_shards: u64) -> Self {
        let router = Arc::new(HopRouter::new());
        let kv = Arc::new(crate::testing::MemoryKv::new());
        let mut shards = HashMap::new();

        for shard_id in 1..=num_shards {
            let config = ShardConfig::for_shard(shard_id);
            let graph = Arc::new(GraphShard::new(shard_id));
            let nmap = NmapClient::with_space(Arc::clone(&kv), config.nmap_space.clone());
            let server = Arc::new(ShardServer::<P, _, _>::new(
                &config,
                graph,
                nmap,
                Arc::clone(&router),
            ));

            let (tx, rx) = mpsc::channel(HOP_INBOX_DEPTH);
            router.register(shard_id, tx);
            tokio::spawn(Arc::clone(&server).serve(rx));
            shards.insert(shard_id, server);
        }

        Self { router, kv, shards }
    }

    pub fn router(&self) -> &Arc<HopRouter> {
        &self.router
    }

    pub fn kv(&self) -> &Arc<crate::testing::MemoryKv> {
        &self.kv
    }

    pub fn server(
        &self,
        shard_id: u64,
    ) -> &Arc<ShardServer<P, Arc<crate::testing::MemoryKv>, HopRouter>> {
        &self.shards[&shard_id]
    }

    pub fn graph(&self, shard_id: u64) -> &Arc<GraphShard> {
        self.shards[&shard_id].graph()
    }

    /// Create a node on `shard` with creation ticks `handle` and register it
    /// in the directory.
    pub async fn add_node(&self, shard: u64, handle: u64) -> RemoteNode {
        self.graph(shard).create_node(stamp(handle));
        let client = NmapClient::new(Arc::clone(&self.kv));
        client.put_mappings(&[(handle, shard)].into()).await;
        RemoteNode::new(shard, handle)
    }

    /// Add a weighted edge; the weight lands under property key `"0"`.
    pub fn add_edge(&self, from: RemoteNode, to: RemoteNode, weight: u64) {
        self.add_edge_with(from, to, weight, &[]);
    }

    /// Add a weighted edge carrying extra (key, value) properties.
    pub fn add_edge_with(
        &self,
        from: RemoteNode,
        to: RemoteNode,
        weight: u64,
        props: &[(&str, &str)],
    ) {
        let slot = self
            .graph(from.shard)
            .node(from.handle)
            .expect("edge source must exist");
        let mut cell = slot.lock();
        let creat = stamp(from.handle.max(to.handle) + 1);
        let mut edge = Edge::new(to, Arc::clone(&creat));
        edge.add_property(Property::stamped("0", weight.to_string(), Arc::clone(&creat)));
        for (k, v) in props {
            edge.add_property(Property::stamped(*k, *v, Arc::clone(&creat)));
        }
        cell.node.add_edge(edge);
    }

    /// Inject the initial hop of a request at `src` and await the terminal
    /// result.
    pub async fn run_request(
        &self,
        req_id: u64,
        src: RemoteNode,
        params: &P::Params,
    ) -> anyhow::Result<P::Params> {
        let body = wire::encode_body(params).context("encoding initial params")?;
        self.router
            .deliver(HopEnvelope {
                req_id,
                dst: src,
                params: body,
            })
            .await
            .context("delivering initial hop")?;
        self.router
            .await_terminal::<P>(req_id, Duration::from_secs(5))
            .await
            .context("request produced no terminal message")
    }
}
