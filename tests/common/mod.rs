#![allow(dead_code)]

use dynamic_replan::{Graph, NodeId, Path, ReplanContext, SearchStatus};

/// Unit-spaced 4-neighbour lattice.
pub fn grid(width: usize, height: usize) -> Graph {
    Graph::grid(width, height, 1.0)
}

/// `len` nodes in a row, each linked to the next.
pub fn chain(len: usize) -> Graph {
    Graph::grid(len, 1, 1.0)
}

/// Two 2x2 rooms joined by a single corridor node at (2, 0); returns the
/// graph and the corridor node.
pub fn two_rooms() -> (Graph, NodeId) {
    let mut graph = Graph::grid(5, 2, 1.0);
    graph.set_blocked(NodeId(7), true).unwrap();
    (graph, NodeId(2))
}

pub fn block(graph: &mut Graph, ids: &[usize]) {
    for &id in ids {
        graph.set_blocked(NodeId(id), true).unwrap();
    }
}

/// Replan anchors pinned to fixed nodes.
pub struct Anchors {
    pub agent: NodeId,
    pub target: NodeId,
}

impl ReplanContext for Anchors {
    fn closest_node_to_agent(&self, _graph: &Graph) -> Option<NodeId> {
        Some(self.agent)
    }

    fn closest_node_to_target(&self, _graph: &Graph) -> Option<NodeId> {
        Some(self.target)
    }
}

/// Found, runs from `start` to `target` and never stands on a blocked node
/// after leaving the start.
pub fn assert_route(graph: &Graph, path: &Path, start: NodeId, target: NodeId) {
    assert_eq!(path.status, SearchStatus::Found);
    assert_eq!(path.nodes.first(), Some(&start));
    assert_eq!(path.nodes.last(), Some(&target));
    assert_eq!(path.nodes.len(), path.waypoints.len());
    for &id in path.nodes.iter().skip(1) {
        assert!(!graph.is_blocked(id), "path crosses blocked node {id}");
    }
}

/// [`assert_route`] plus every hop following an edge.
pub fn assert_walk(graph: &Graph, path: &Path, start: NodeId, target: NodeId) {
    assert_route(graph, path, start, target);
    for pair in path.nodes.windows(2) {
        assert!(
            graph.neighbors(pair[0]).contains(&pair[1]),
            "{} -> {} is not an edge",
            pair[0],
            pair[1]
        );
    }
}
