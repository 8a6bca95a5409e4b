use crate::algorithms::common::{
    check_query, reconstruct_path, replan_endpoints, Path, PathfindingAlgorithm, ReplanContext,
    SearchStatus,
};
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::metrics::{map_bytes, MetricsRecorder, SearchMetrics};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, instrument, warn};

/// Tunables for [`FringeSearch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FringeLimits {
    /// Pops allowed per search before giving up.
    pub max_iterations: usize,
    /// Visited-set size allowed per search before giving up.
    pub max_visited: usize,
    /// Most recently admitted nodes forgotten on a block event.
    pub reopen_count: usize,
    /// Minimum threshold increase when the now list runs dry.
    pub threshold_step: f32,
}

impl Default for FringeLimits {
    fn default() -> Self {
        FringeLimits {
            max_iterations: 100_000,
            max_visited: 5_000,
            reopen_count: 5,
            threshold_step: 1.0,
        }
    }
}

/// How the last block event was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// The kept tree was re-rooted and only the invalidated part searched again.
    Partial,
    /// The kept state was discarded and a fresh search ran.
    Restart,
}

/// Threshold-bounded search over a FIFO "now" list and a deferred "later"
/// list. Admission is by `f = dist(start, n) + dist(n, target)` against a
/// threshold that rises whenever "now" empties.
///
/// The visited set, predecessor tree and lists outlive a call. On a block
/// event the tree is re-rooted at the agent's node and only the subtrees
/// hanging off the blocked node and the last few admitted nodes are
/// forgotten; the search then resumes from the surviving frontier and only
/// falls back to a full restart when that fails.
pub struct FringeSearch {
    limits: FringeLimits,
    visited: FxHashSet<NodeId>,
    admitted: Vec<NodeId>,
    now: VecDeque<NodeId>,
    later: Vec<(NodeId, NodeId)>,
    came_from: FxHashMap<NodeId, NodeId>,
    threshold: f32,
    start: Option<NodeId>,
    target: Option<NodeId>,
    last_repair: Option<Repair>,
    metrics: MetricsRecorder,
}

impl Default for FringeSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl FringeSearch {
    pub fn new() -> Self {
        Self::with_limits(FringeLimits::default())
    }

    pub fn with_limits(limits: FringeLimits) -> Self {
        FringeSearch {
            limits,
            visited: FxHashSet::default(),
            admitted: Vec::new(),
            now: VecDeque::new(),
            later: Vec::new(),
            came_from: FxHashMap::default(),
            threshold: 0.0,
            start: None,
            target: None,
            last_repair: None,
            metrics: MetricsRecorder::new("fringe_search"),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn last_repair(&self) -> Option<Repair> {
        self.last_repair
    }

    fn state_bytes(&self) -> usize {
        map_bytes::<NodeId, ()>(self.visited.len() + self.admitted.len() + self.now.len())
            + map_bytes::<NodeId, NodeId>(self.later.len() + self.came_from.len())
    }

    fn f_cost(graph: &Graph, start: NodeId, node: NodeId, target: NodeId) -> f32 {
        graph.distance(start, node) + graph.distance(node, target)
    }

    fn admit(&mut self, node: NodeId, parent: Option<NodeId>) {
        if let Some(parent) = parent {
            self.came_from.insert(node, parent);
        }
        self.visited.insert(node);
        self.admitted.push(node);
        self.now.push_back(node);
    }

    fn defer(&mut self, node: NodeId, parent: NodeId) {
        if !self.later.iter().any(|&(queued, _)| queued == node) {
            self.later.push((node, parent));
        }
    }

    fn seed(&mut self, graph: &Graph, start: NodeId, target: NodeId) {
        self.now.clear();
        self.later.clear();
        self.came_from.remove(&start);
        self.start = Some(start);
        self.target = Some(target);
        self.threshold = graph.distance(start, target);
        self.admit(start, None);
    }

    fn clear(&mut self) {
        self.visited.clear();
        self.admitted.clear();
        self.now.clear();
        self.later.clear();
        self.came_from.clear();
    }

    /// Raises the threshold and moves every passable deferred node into
    /// "now". Returns false when nothing could be promoted.
    fn promote_later(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> bool {
        let (ready, blocked): (Vec<_>, Vec<_>) = std::mem::take(&mut self.later)
            .into_iter()
            .partition(|&(node, _)| !graph.is_blocked(node));
        self.later = blocked;

        let ready: Vec<_> = ready
            .into_iter()
            .filter(|(node, _)| !self.visited.contains(node))
            .collect();
        if ready.is_empty() {
            return false;
        }

        let min_f = ready
            .iter()
            .map(|&(node, _)| Self::f_cost(graph, start, node, target))
            .fold(f32::INFINITY, f32::min);
        self.threshold = (self.threshold + self.limits.threshold_step).max(min_f);
        debug!(threshold = self.threshold, promoted = ready.len(), "fringe threshold raised");

        for (node, parent) in ready {
            self.admit(node, Some(parent));
        }
        true
    }

    fn run(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> Path {
        let mut iterations = 0;
        loop {
            let Some(current) = self.now.pop_front() else {
                if self.promote_later(graph, start, target) {
                    continue;
                }
                return Path::not_found(SearchStatus::NoPath);
            };

            iterations += 1;
            if iterations > self.limits.max_iterations || self.visited.len() > self.limits.max_visited {
                warn!(
                    iterations,
                    visited = self.visited.len(),
                    "fringe search: safety limit exceeded, terminating search"
                );
                return Path::not_found(SearchStatus::SafetyLimitExceeded {
                    iterations,
                    visited: self.visited.len(),
                });
            }
            self.metrics.node_expanded();

            if current == target {
                return match reconstruct_path(&self.came_from, start, target, graph.len()) {
                    Some(nodes) => Path::found(graph, nodes),
                    None => Path::not_found(SearchStatus::NoPath),
                };
            }

            for &neighbor in graph.neighbors(current) {
                if self.visited.contains(&neighbor) {
                    continue;
                }
                if graph.is_blocked(neighbor) {
                    self.defer(neighbor, current);
                    continue;
                }
                if Self::f_cost(graph, start, neighbor, target) <= self.threshold {
                    self.admit(neighbor, Some(current));
                } else {
                    self.defer(neighbor, current);
                }
            }
        }
    }

    /// Makes `start` the root of the kept predecessor tree by reversing the
    /// chain between it and the old root. Fails when `start` was never
    /// reached or a reversed hop is not an edge.
    fn reroot(&mut self, graph: &Graph, start: NodeId) -> bool {
        if !self.visited.contains(&start) {
            return false;
        }
        let mut chain = vec![start];
        let mut current = start;
        while let Some(&parent) = self.came_from.get(&current) {
            if chain.len() > graph.len() {
                return false;
            }
            chain.push(parent);
            current = parent;
        }
        if chain
            .windows(2)
            .any(|hop| !graph.neighbors(hop[0]).contains(&hop[1]))
        {
            return false;
        }

        self.came_from.remove(&start);
        for hop in chain.windows(2) {
            self.came_from.insert(hop[1], hop[0]);
        }
        self.start = Some(start);
        true
    }

    /// Forgets every visited node whose predecessor chain runs through
    /// `blocked`, through a node that is blocked now, or through one of the
    /// `reopen_count` most recently admitted nodes. Returns how many nodes
    /// were forgotten.
    fn invalidate(&mut self, graph: &Graph, blocked: NodeId, start: NodeId) -> usize {
        let mut roots: FxHashSet<NodeId> = self
            .admitted
            .iter()
            .rev()
            .take(self.limits.reopen_count)
            .copied()
            .collect();
        roots.insert(blocked);
        roots.extend(self.visited.iter().copied().filter(|&id| graph.is_blocked(id)));
        roots.remove(&start);

        let mut stale_by_node: FxHashMap<NodeId, bool> = FxHashMap::default();
        let visited: Vec<NodeId> = self.visited.iter().copied().collect();
        for node in visited {
            let mut trail = Vec::new();
            let mut current = node;
            let stale = loop {
                if let Some(&known) = stale_by_node.get(&current) {
                    break known;
                }
                trail.push(current);
                if roots.contains(&current) {
                    break true;
                }
                if current == start {
                    break false;
                }
                match self.came_from.get(&current) {
                    Some(&parent) if trail.len() <= graph.len() => current = parent,
                    _ => break true,
                }
            };
            for id in trail {
                stale_by_node.insert(id, stale);
            }
        }

        let stale: FxHashSet<NodeId> = stale_by_node
            .into_iter()
            .filter_map(|(id, stale)| stale.then_some(id))
            .collect();
        for id in &stale {
            self.visited.remove(id);
            self.came_from.remove(id);
        }
        self.admitted.retain(|id| !stale.contains(id));
        self.now.retain(|id| !stale.contains(id));
        self.later.retain(|(_, parent)| !stale.contains(parent));
        stale.len()
    }

    /// Queues every kept node that still borders unvisited ground, after
    /// whatever survived in "now".
    fn refill_now(&mut self, graph: &Graph) {
        let mut queued: FxHashSet<NodeId> = self.now.iter().copied().collect();
        for &id in &self.admitted {
            if !queued.contains(&id)
                && graph
                    .neighbors(id)
                    .iter()
                    .any(|neighbor| !self.visited.contains(neighbor))
            {
                queued.insert(id);
                self.now.push_back(id);
            }
        }
    }

    /// Searches again from the kept state. `None` means the kept tree could
    /// not be re-rooted at `start`.
    fn repair(&mut self, graph: &Graph, blocked: NodeId, start: NodeId, target: NodeId) -> Option<Path> {
        if !self.reroot(graph, start) {
            return None;
        }
        let forgotten = self.invalidate(graph, blocked, start);
        debug!(%blocked, forgotten, kept = self.visited.len(), "fringe search: partial reopen");

        self.threshold = self.threshold.max(graph.distance(start, target));
        if self.visited.contains(&target) {
            return reconstruct_path(&self.came_from, start, target, graph.len())
                .map(|nodes| Path::found(graph, nodes));
        }
        self.refill_now(graph);
        Some(self.run(graph, start, target))
    }
}

impl PathfindingAlgorithm for FringeSearch {
    fn name(&self) -> &'static str {
        "fringe_search"
    }

    #[instrument(skip_all, name = "fringe_search", fields(start = %start, target = %target), level = "debug")]
    fn calculate_path(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> Result<Path> {
        check_query(graph, start, target)?;
        self.metrics.start(self.state_bytes());
        self.clear();
        self.seed(graph, start, target);
        let path = self.run(graph, start, target);
        if path.status == SearchStatus::NoPath {
            warn!("fringe search: no path found");
        }
        let state_bytes = self.state_bytes();
        self.metrics.finish(&path.waypoints, state_bytes);
        Ok(path)
    }

    fn handle_blocked(
        &mut self,
        graph: &mut Graph,
        blocked: NodeId,
        context: &dyn ReplanContext,
    ) -> Result<Path> {
        graph.set_blocked(blocked, true)?;
        let (start, target) = replan_endpoints(graph, context, self.target)?;
        if self.start.is_none() || self.target != Some(target) {
            let path = self.calculate_path(graph, start, target);
            self.last_repair = Some(Repair::Restart);
            return path;
        }

        self.metrics.start(self.state_bytes());
        let path = match self.repair(graph, blocked, start, target) {
            Some(path) if !path.is_empty() => {
                self.last_repair = Some(Repair::Partial);
                path
            }
            _ => {
                debug!(%blocked, "fringe search: partial reopen failed, restarting");
                self.last_repair = Some(Repair::Restart);
                self.clear();
                self.seed(graph, start, target);
                self.run(graph, start, target)
            }
        };
        if path.is_empty() {
            warn!("fringe search: no path found after block");
        }
        let state_bytes = self.state_bytes();
        self.metrics.finish(&path.waypoints, state_bytes);
        Ok(path)
    }

    fn reset(&mut self) {
        self.clear();
        self.threshold = 0.0;
        self.start = None;
        self.target = None;
        self.last_repair = None;
    }

    fn last_metrics(&self) -> Option<&SearchMetrics> {
        self.metrics.last()
    }
}
