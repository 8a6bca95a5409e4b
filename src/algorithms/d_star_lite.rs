use crate::algorithms::common::{
    check_query, replan_endpoints, Path, PathfindingAlgorithm, ReplanContext, SearchStatus,
};
use crate::algorithms::priority_queue::PriorityQueue;
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::metrics::{MetricsRecorder, SearchMetrics};
use rustc_hash::FxHashSet;
use std::mem::size_of;
use tracing::{debug, error, instrument, warn};

/// Implements the D* Lite pathfinding algorithm.
///
/// The search is rooted at the goal: `g` holds the cost-to-goal each node has
/// settled on and `rhs` the one-step lookahead over its successors. A node is
/// queued exactly while the two disagree.
///
/// The instance remembers which nodes it last saw blocked. Every call diffs
/// that snapshot against the graph and only re-examines the predecessors of
/// nodes whose flag flipped, so obstacles toggled by anyone are repaired
/// incrementally. Asking for a different goal or handing over a graph of a
/// different size starts over.
pub struct DStarLite {
    g: Vec<f32>,
    rhs: Vec<f32>,
    predecessors: Vec<Vec<NodeId>>,
    known_blocked: Vec<bool>,
    open: PriorityQueue<NodeId>,
    /// Key modifier, accumulates heuristic drift as the start moves.
    k_m: f32,
    last_start: Option<NodeId>,
    goal: Option<NodeId>,
    metrics: MetricsRecorder,
}

impl Default for DStarLite {
    fn default() -> Self {
        Self::new()
    }
}

impl DStarLite {
    pub fn new() -> Self {
        DStarLite {
            g: Vec::new(),
            rhs: Vec::new(),
            predecessors: Vec::new(),
            known_blocked: Vec::new(),
            open: PriorityQueue::new(),
            k_m: 0.0,
            last_start: None,
            goal: None,
            metrics: MetricsRecorder::new("d_star_lite"),
        }
    }

    /// Settled cost-to-goal of `id`, infinite when unknown.
    pub fn cost_to_goal(&self, id: NodeId) -> f32 {
        self.g.get(id.0).copied().unwrap_or(f32::INFINITY)
    }

    /// Entering a blocked node is impossible; leaving one is not.
    fn edge_cost(graph: &Graph, from: NodeId, to: NodeId) -> f32 {
        if graph.is_blocked(to) {
            f32::INFINITY
        } else {
            graph.distance(from, to)
        }
    }

    fn heuristic(&self, graph: &Graph, id: NodeId) -> f32 {
        self.last_start.map_or(0.0, |start| graph.distance(start, id))
    }

    fn calculate_key(&self, graph: &Graph, id: NodeId) -> f32 {
        self.g[id.0].min(self.rhs[id.0]) + self.heuristic(graph, id) + self.k_m
    }

    fn initialize(&mut self, graph: &Graph, start: NodeId, goal: NodeId) {
        let n = graph.len();
        self.g = vec![f32::INFINITY; n];
        self.rhs = vec![f32::INFINITY; n];
        self.predecessors = vec![Vec::new(); n];
        for id in graph.ids() {
            for &successor in graph.neighbors(id) {
                self.predecessors[successor.0].push(id);
            }
        }
        self.known_blocked = graph.ids().map(|id| graph.is_blocked(id)).collect();
        self.open.clear();
        self.k_m = 0.0;
        self.last_start = Some(start);
        self.goal = Some(goal);

        self.rhs[goal.0] = 0.0;
        let key = self.calculate_key(graph, goal);
        self.open.insert(goal, key);
        debug!(%goal, nodes = n, "d* lite initialised");
    }

    /// Recomputes `rhs` for `id` and queues it iff it is inconsistent.
    fn update_vertex(&mut self, graph: &Graph, id: NodeId) {
        if Some(id) != self.goal {
            self.rhs[id.0] = graph
                .neighbors(id)
                .iter()
                .map(|&successor| Self::edge_cost(graph, id, successor) + self.g[successor.0])
                .fold(f32::INFINITY, f32::min);
        }
        if self.g[id.0] != self.rhs[id.0] {
            let key = self.calculate_key(graph, id);
            self.open.insert(id, key);
        } else {
            self.open.remove(&id);
        }
    }

    /// Moves the heuristic origin to `start` and re-examines the
    /// predecessors of every node whose blocked flag changed.
    fn absorb_changes(&mut self, graph: &Graph, start: NodeId) {
        if let Some(last) = self.last_start {
            if last != start {
                self.k_m += graph.distance(last, start);
            }
        }
        self.last_start = Some(start);

        let changed: Vec<NodeId> = graph
            .ids()
            .filter(|&id| graph.is_blocked(id) != self.known_blocked[id.0])
            .collect();
        if changed.is_empty() {
            return;
        }
        debug!(changed = changed.len(), "d* lite: repairing around changed nodes");
        for &id in &changed {
            self.known_blocked[id.0] = graph.is_blocked(id);
            for index in 0..self.predecessors[id.0].len() {
                let predecessor = self.predecessors[id.0][index];
                self.update_vertex(graph, predecessor);
            }
        }
    }

    /// Expands inconsistent nodes until every node keyed at or below the
    /// start is settled and the start itself is consistent.
    fn compute_shortest_path(&mut self, graph: &Graph, start: NodeId) {
        while let Some((top, old_key)) = self.open.peek_min() {
            let start_consistent = self.g[start.0] == self.rhs[start.0];
            if old_key > self.calculate_key(graph, start) && start_consistent {
                break;
            }

            let new_key = self.calculate_key(graph, top);
            if old_key < new_key {
                self.open.insert(top, new_key);
                continue;
            }
            self.open.extract_min();
            self.metrics.node_expanded();

            if self.g[top.0] > self.rhs[top.0] {
                self.g[top.0] = self.rhs[top.0];
            } else {
                self.g[top.0] = f32::INFINITY;
                self.update_vertex(graph, top);
            }
            for index in 0..self.predecessors[top.0].len() {
                let predecessor = self.predecessors[top.0][index];
                self.update_vertex(graph, predecessor);
            }
        }
    }

    /// Greedy descent from the start: always step to the successor that
    /// minimises `c + g`.
    fn extract_path(&self, graph: &Graph, start: NodeId, goal: NodeId) -> Option<Vec<NodeId>> {
        if start == goal {
            return Some(vec![start]);
        }
        if self.g[start.0].is_infinite() {
            return None;
        }

        let mut nodes = vec![start];
        let mut seen = FxHashSet::default();
        seen.insert(start);
        let mut current = start;
        while current != goal {
            let next = graph
                .neighbors(current)
                .iter()
                .map(|&successor| {
                    (successor, Self::edge_cost(graph, current, successor) + self.g[successor.0])
                })
                .filter(|(_, cost)| cost.is_finite())
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(successor, _)| successor);

            let Some(next) = next else {
                error!(%current, "d* lite: descent reached a node with no finite successor");
                return None;
            };
            if !seen.insert(next) {
                error!(%next, "d* lite: descent revisited a node");
                return None;
            }
            nodes.push(next);
            current = next;
        }
        Some(nodes)
    }

    fn state_bytes(&self) -> usize {
        let edges: usize = self.predecessors.iter().map(Vec::len).sum();
        (self.g.len() + self.rhs.len()) * size_of::<f32>()
            + self.known_blocked.len() * size_of::<bool>()
            + edges * size_of::<NodeId>()
            + self.open.len() * (size_of::<NodeId>() + size_of::<f32>())
    }
}

impl PathfindingAlgorithm for DStarLite {
    fn name(&self) -> &'static str {
        "d_star_lite"
    }

    #[instrument(skip_all, name = "d_star_lite", fields(start = %start, target = %target), level = "debug")]
    fn calculate_path(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> Result<Path> {
        check_query(graph, start, target)?;
        self.metrics.start(self.state_bytes());

        if self.goal != Some(target) || self.g.len() != graph.len() {
            self.initialize(graph, start, target);
        } else {
            self.absorb_changes(graph, start);
        }
        self.compute_shortest_path(graph, start);

        let path = match self.extract_path(graph, start, target) {
            Some(nodes) => Path::found(graph, nodes),
            None => Path::not_found(SearchStatus::NoPath),
        };
        if path.is_empty() {
            warn!("d* lite: no path found");
        }
        let state_bytes = self.state_bytes();
        self.metrics.finish(&path.waypoints, state_bytes);
        Ok(path)
    }

    /// Marks the node, then lets the next search repair around it.
    fn handle_blocked(
        &mut self,
        graph: &mut Graph,
        blocked: NodeId,
        context: &dyn ReplanContext,
    ) -> Result<Path> {
        debug!(%blocked, "d* lite: blocked path, repairing");
        graph.set_blocked(blocked, true)?;
        let (start, target) = replan_endpoints(graph, context, self.goal)?;
        self.calculate_path(graph, start, target)
    }

    fn reset(&mut self) {
        self.g.clear();
        self.rhs.clear();
        self.predecessors.clear();
        self.known_blocked.clear();
        self.open.clear();
        self.k_m = 0.0;
        self.last_start = None;
        self.goal = None;
    }

    fn last_metrics(&self) -> Option<&SearchMetrics> {
        self.metrics.last()
    }
}
