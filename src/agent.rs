use crate::algorithms::common::{Path, ReplanContext};
use crate::graph::{Graph, NodeId, Position};

/// A walker that hops node to node along the last path it was handed.
pub struct Agent {
    pub position: Position,
    pub target: Position,
    route: Vec<NodeId>,
    cursor: usize,
}

impl Agent {
    pub fn new(position: Position, target: Position) -> Self {
        Agent {
            position,
            target,
            route: Vec::new(),
            cursor: 0,
        }
    }

    /// Adopts `path`. The first node is where the search started, which is
    /// where the agent already stands, so walking begins at the second.
    pub fn follow(&mut self, path: &Path) {
        self.route = path.nodes.clone();
        self.cursor = 1;
    }

    pub fn next_node(&self) -> Option<NodeId> {
        self.route.get(self.cursor).copied()
    }

    /// Nodes left to walk, including the next one.
    pub fn remaining(&self) -> &[NodeId] {
        self.route.get(self.cursor..).unwrap_or(&[])
    }

    /// Steps onto the next node and returns the distance covered.
    pub fn advance(&mut self, graph: &Graph) -> Option<f32> {
        let next = self.next_node()?;
        let destination = graph.position(next);
        let travelled = self.position.distance(destination);
        self.position = destination;
        self.cursor += 1;
        Some(travelled)
    }

    pub fn has_arrived(&self, graph: &Graph) -> bool {
        graph.closest(self.position) == graph.closest(self.target)
    }

    pub fn clear_route(&mut self) {
        self.route.clear();
        self.cursor = 0;
    }
}

impl ReplanContext for Agent {
    fn closest_node_to_agent(&self, graph: &Graph) -> Option<NodeId> {
        graph.closest_unblocked(self.position)
    }

    fn closest_node_to_target(&self, graph: &Graph) -> Option<NodeId> {
        graph.closest_unblocked(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::common::PathfindingAlgorithm;
    use crate::algorithms::dijkstra::Dijkstra;

    #[test]
    fn walks_the_route_after_its_first_node() {
        let graph = Graph::grid(3, 1, 1.0);
        let path = Dijkstra::new()
            .calculate_path(&graph, NodeId(0), NodeId(2))
            .unwrap();
        let mut agent = Agent::new(Position::new(0.0, 0.0), Position::new(2.0, 0.0));
        agent.follow(&path);
        assert_eq!(agent.next_node(), Some(NodeId(1)));
        assert_eq!(agent.advance(&graph), Some(1.0));
        assert_eq!(agent.remaining(), &[NodeId(2)]);
        agent.advance(&graph);
        assert!(agent.has_arrived(&graph));
        assert_eq!(agent.advance(&graph), None);
    }

    #[test]
    fn anchors_skip_blocked_nodes() {
        let mut graph = Graph::grid(3, 1, 1.0);
        graph.set_blocked(NodeId(0), true).unwrap();
        let agent = Agent::new(Position::new(0.1, 0.0), Position::new(2.0, 0.0));
        assert_eq!(agent.closest_node_to_agent(&graph), Some(NodeId(1)));
        assert_eq!(agent.closest_node_to_target(&graph), Some(NodeId(2)));
    }
}
