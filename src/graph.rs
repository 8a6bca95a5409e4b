use crate::error::{PathError, Result};
use pathfinding::prelude::dijkstra;
use std::fmt;

/// Fixed-point scale used when handing float costs to integer-cost solvers.
const COST_SCALE: f32 = 10_000.0;

/// Stable index of a node inside a [`Graph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A 2D world-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Position { x, y }
    }

    pub fn distance(&self, other: Position) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn manhattan(&self, other: Position) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub position: Position,
    pub blocked: bool,
    pub neighbors: Vec<NodeId>,
}

/// Arena of navigable nodes. Algorithms read it; the environment toggles
/// `blocked` flags between searches.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Graph { nodes: Vec::new() }
    }

    /// Builds a `width` x `height` lattice with 4-neighbour connectivity.
    /// Node `(x, y)` gets id `y * width + x`.
    pub fn grid(width: usize, height: usize, spacing: f32) -> Self {
        let mut graph = Graph::new();
        for y in 0..height {
            for x in 0..width {
                graph.add_node(Position::new(x as f32 * spacing, y as f32 * spacing));
            }
        }
        for y in 0..height {
            for x in 0..width {
                let id = NodeId(y * width + x);
                if x + 1 < width {
                    graph.connect(id, NodeId(y * width + x + 1));
                }
                if y + 1 < height {
                    graph.connect(id, NodeId((y + 1) * width + x));
                }
            }
        }
        graph
    }

    pub fn add_node(&mut self, position: Position) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            position,
            blocked: false,
            neighbors: Vec::new(),
        });
        id
    }

    /// Links `a` and `b` in both directions.
    pub fn connect(&mut self, a: NodeId, b: NodeId) {
        self.connect_directed(a, b);
        self.connect_directed(b, a);
    }

    pub fn connect_directed(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        let neighbors = &mut self.nodes[from.0].neighbors;
        if !neighbors.contains(&to) {
            neighbors.push(to);
        }
    }

    /// Rebuilds every neighbour list from proximity: nodes within `range` of
    /// each other become mutual neighbours.
    pub fn link_within(&mut self, range: f32) {
        for node in &mut self.nodes {
            node.neighbors.clear();
        }
        for a in 0..self.nodes.len() {
            for b in (a + 1)..self.nodes.len() {
                if self.nodes[a].position.distance(self.nodes[b].position) <= range {
                    self.connect(NodeId(a), NodeId(b));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Validates that `id` belongs to this graph.
    pub fn check(&self, id: NodeId) -> Result<NodeId> {
        if id.0 < self.nodes.len() {
            Ok(id)
        } else {
            Err(PathError::UnknownNode(id))
        }
    }

    /// Position of a node. `id` must have passed [`Graph::check`].
    pub fn position(&self, id: NodeId) -> Position {
        self.nodes[id.0].position
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].neighbors
    }

    pub fn is_blocked(&self, id: NodeId) -> bool {
        self.nodes[id.0].blocked
    }

    /// Sets the blocked flag and returns the previous value.
    pub fn set_blocked(&mut self, id: NodeId, blocked: bool) -> Result<bool> {
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or(PathError::UnknownNode(id))?;
        Ok(std::mem::replace(&mut node.blocked, blocked))
    }

    pub fn blocked_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|&id| self.is_blocked(id))
    }

    pub fn distance(&self, a: NodeId, b: NodeId) -> f32 {
        self.position(a).distance(self.position(b))
    }

    /// Nearest node to `position`, blocked or not.
    pub fn closest(&self, position: Position) -> Option<NodeId> {
        self.closest_matching(position, |_| true)
    }

    /// Nearest unblocked node to `position`.
    pub fn closest_unblocked(&self, position: Position) -> Option<NodeId> {
        self.closest_matching(position, |node| !node.blocked)
    }

    fn closest_matching(&self, position: Position, keep: impl Fn(&Node) -> bool) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            if !keep(node) {
                continue;
            }
            let distance = node.position.distance(position);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((NodeId(index), distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Total Euclidean length of a polyline.
    pub fn path_length(waypoints: &[Position]) -> f32 {
        waypoints
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    /// Shortest start-to-target length over unblocked nodes, computed by an
    /// independent solver. Used as the optimality yardstick.
    pub fn reference_shortest_length(&self, start: NodeId, target: NodeId) -> Option<f32> {
        self.check(start).ok()?;
        self.check(target).ok()?;
        let (_, cost) = dijkstra(
            &start,
            |&id| {
                self.neighbors(id)
                    .iter()
                    .filter(|&&n| !self.is_blocked(n))
                    .map(|&n| (n, (self.distance(id, n) * COST_SCALE).round() as u64))
                    .collect::<Vec<_>>()
            },
            |&id| id == target,
        )?;
        Some(cost as f32 / COST_SCALE)
    }
}
