//! End-to-end traversal scenarios over an in-memory cluster.
//!
//! Each test builds a small graph spread across shards, injects the initial
//! hop at the source, and asserts on the terminal message the coordinator
//! sink receives.

use weft::clock::stamp;
use weft::graph::{Property, RemoteNode};
use weft::prog::dijkstra::{DijkstraParams, DijkstraProgram};
use weft::testing::TestCluster;

const REQ: u64 = 1_000;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn single_edge_shortest_path() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    cluster.add_edge(a, b, 5);

    let params = DijkstraParams::new(a.handle, b.handle, 0);
    let result = cluster.run_request(REQ, a, &params).await.expect("terminal");

    assert_eq!(result.cost, 5);
    assert_eq!(result.final_path, vec![(b.handle, 5)]);
}

#[tokio::test]
async fn triangle_takes_the_cheap_diversion() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(3);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    let c = cluster.add_node(3, 30).await;
    cluster.add_edge(a, b, 10);
    cluster.add_edge(a, c, 1);
    cluster.add_edge(c, b, 2);

    let params = DijkstraParams::new(a.handle, b.handle, 0);
    let result = cluster.run_request(REQ, a, &params).await.expect("terminal");

    assert_eq!(result.cost, 3);
    let visited: Vec<u64> = result.final_path.iter().map(|&(h, _)| h).collect();
    assert_eq!(visited, vec![b.handle, c.handle]);
    let edge_cost_sum: u64 = result.final_path.iter().map(|&(_, c)| c).sum();
    assert_eq!(edge_cost_sum, 3);
}

#[tokio::test]
async fn widest_path_prefers_the_big_pipe() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    let c = cluster.add_node(1, 30).await;
    cluster.add_edge(a, b, 1);
    cluster.add_edge(a, c, 10);
    cluster.add_edge(c, b, 9);

    let params = DijkstraParams::new(a.handle, b.handle, 0).widest();
    let result = cluster.run_request(REQ, a, &params).await.expect("terminal");

    // Bottleneck of A -> C -> B, not the direct A -> B edge.
    assert_eq!(result.cost, 9);
    let visited: Vec<u64> = result.final_path.iter().map(|&(h, _)| h).collect();
    assert_eq!(visited, vec![b.handle, c.handle]);
}

#[tokio::test]
async fn predicate_filter_discards_unlabeled_edges() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    cluster.add_edge_with(a, b, 5, &[("color", "red")]);
    cluster.add_edge(a, b, 2);

    let params = DijkstraParams::new(a.handle, b.handle, 0)
        .with_edge_props(vec![Property::new("color", "red")]);
    let result = cluster.run_request(REQ, a, &params).await.expect("terminal");

    // The cheaper edge lacks the predicate property.
    assert_eq!(result.cost, 5);
}

#[tokio::test]
async fn deleted_node_makes_destination_unreachable() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    let c = cluster.add_node(1, 30).await;
    cluster.add_edge(a, b, 1);
    cluster.add_edge(b, c, 1);

    // B is deleted before the request's snapshot clock.
    assert!(cluster.graph(2).delete_node(b.handle, stamp(500)));

    let params = DijkstraParams::new(a.handle, c.handle, 0);
    let result = cluster.run_request(REQ, a, &params).await.expect("terminal");

    assert_eq!(result.cost, 0);
    assert!(result.final_path.is_empty());
}

#[tokio::test]
async fn deleted_candidate_bounces_once_and_reroutes() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(3);
    let a = cluster.add_node(1, 10).await;
    let d = cluster.add_node(3, 40).await;
    let c = cluster.add_node(1, 30).await;
    // B never materializes on shard 2; the edge still points there, which is
    // exactly the shape of a deletion racing the hop.
    let b = RemoteNode::new(2, 20);
    cluster.add_edge(a, b, 1);
    cluster.add_edge(a, d, 5);
    cluster.add_edge(d, c, 5);

    let params = DijkstraParams::new(a.handle, c.handle, 0);
    let result = cluster.run_request(REQ, a, &params).await.expect("terminal");

    // The dead branch costs one bounce; the alternative path still wins out.
    assert_eq!(result.cost, 10);
    let visited: Vec<u64> = result.final_path.iter().map(|&(h, _)| h).collect();
    assert_eq!(visited, vec![c.handle, d.handle]);
    assert_eq!(cluster.router().hops_to_node(b), 1);
}

#[tokio::test]
async fn deleted_edge_is_invisible_to_later_requests() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    let c = cluster.add_node(1, 30).await;
    cluster.add_edge(a, b, 1);
    cluster.add_edge(a, c, 4);
    cluster.add_edge(c, b, 4);

    // Delete the direct edge at clock 500; requests before that still see it.
    {
        let slot = cluster.graph(1).node(a.handle).unwrap();
        let mut cell = slot.lock();
        let direct = cell.node.edge_mut(1).unwrap();
        assert_eq!(direct.nbr, b);
        direct.update_del_time(stamp(500));
    }

    let params = DijkstraParams::new(a.handle, b.handle, 0);
    let before = cluster.run_request(400, a, &params).await.expect("terminal");
    assert_eq!(before.cost, 1);

    let after = cluster.run_request(REQ, a, &params).await.expect("terminal");
    assert_eq!(after.cost, 8);
}

#[tokio::test]
async fn reachability_cache_is_scoped_per_server() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let cache = cluster.server(1).reach_cache();
    assert!(cache.insert_entry(7, 3, REQ));
    assert_eq!(cache.get_req_id(7, 3), REQ);
    // The other shard's cache is untouched.
    assert_eq!(cluster.server(2).reach_cache().get_req_id(7, 3), 0);

    cluster.server(1).invalidate_reachability(REQ);
    assert_eq!(cache.get_req_id(7, 3), 0);
}

#[tokio::test]
async fn two_requests_do_not_share_state() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    cluster.add_edge(a, b, 5);

    let params = DijkstraParams::new(a.handle, b.handle, 0);
    let first = cluster.run_request(REQ, a, &params).await.expect("terminal");
    let second = cluster
        .run_request(REQ + 1, a, &params)
        .await
        .expect("terminal");

    assert_eq!(first.cost, 5);
    assert_eq!(second.cost, 5);
    assert_eq!(second.final_path, vec![(b.handle, 5)]);
}

#[tokio::test]
async fn discard_request_drops_program_state() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    cluster.add_edge(a, b, 5);

    let params = DijkstraParams::new(a.handle, b.handle, 0);
    cluster.run_request(REQ, a, &params).await.expect("terminal");

    let slot = cluster.graph(1).node(a.handle).unwrap();
    assert_eq!(slot.lock().programs.request_count(), 1);
    cluster.server(1).discard_request(REQ);
    assert_eq!(slot.lock().programs.request_count(), 0);
}

#[tokio::test]
async fn unreachable_destination_fails_cleanly() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(2);
    let a = cluster.add_node(1, 10).await;
    let b = cluster.add_node(2, 20).await;
    // Edge exists but the request predates it.
    cluster.add_edge(a, b, 5);

    let params = DijkstraParams::new(a.handle, b.handle, 0);
    let result = cluster
        .run_request(15, a, &params)
        .await
        .expect("terminal");

    assert_eq!(result.cost, 0);
    assert!(result.final_path.is_empty());
}

#[tokio::test]
async fn longer_chain_across_shards() {
    init_tracing();
    let cluster = TestCluster::<DijkstraProgram>::new(3);
    let nodes = {
        let mut v = Vec::new();
        for i in 0..6u64 {
            v.push(cluster.add_node(1 + i % 3, 10 + i * 10).await);
        }
        v
    };
    for w in nodes.windows(2) {
        cluster.add_edge(w[0], w[1], 2);
    }
    // A tempting shortcut that is actually more expensive.
    cluster.add_edge(nodes[0], nodes[5], 100);

    let params = DijkstraParams::new(nodes[0].handle, nodes[5].handle, 0);
    let result = cluster.run_request(REQ, nodes[0], &params).await.expect("terminal");

    assert_eq!(result.cost, 10);
    assert_eq!(result.final_path.len(), 5);
}
