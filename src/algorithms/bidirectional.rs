use crate::algorithms::common::{
    check_query, replan_from_scratch, Path, PathfindingAlgorithm, ReplanContext, SearchStatus,
};
use crate::algorithms::priority_queue::PriorityQueue;
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::metrics::{map_bytes, MetricsRecorder, SearchMetrics};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, instrument, warn};

/// One direction of the search: its own open set, costs and tree.
struct Frontier {
    open: PriorityQueue<NodeId>,
    cost: FxHashMap<NodeId, f32>,
    came_from: FxHashMap<NodeId, NodeId>,
    expanded: FxHashSet<NodeId>,
}

impl Frontier {
    fn rooted_at(root: NodeId) -> Self {
        let mut frontier = Frontier {
            open: PriorityQueue::new(),
            cost: FxHashMap::default(),
            came_from: FxHashMap::default(),
            expanded: FxHashSet::default(),
        };
        frontier.cost.insert(root, 0.0);
        frontier.open.insert(root, 0.0);
        frontier
    }

    /// Whether this direction has reached `id`, open or expanded.
    fn has_reached(&self, id: NodeId) -> bool {
        self.cost.contains_key(&id)
    }

    /// Expands the cheapest open node. Returns the first neighbour the other
    /// direction has already reached.
    fn step(&mut self, graph: &Graph, other: &Frontier, metrics: &mut MetricsRecorder) -> Option<NodeId> {
        if self.open.is_empty() {
            return None;
        }
        let current = self.open.extract_min();
        self.expanded.insert(current);
        metrics.node_expanded();

        let current_cost = self.cost[&current];
        for &neighbor in graph.neighbors(current) {
            if graph.is_blocked(neighbor) || self.expanded.contains(&neighbor) {
                continue;
            }
            let tentative = current_cost + graph.distance(current, neighbor);
            if tentative < self.cost.get(&neighbor).copied().unwrap_or(f32::INFINITY) {
                self.cost.insert(neighbor, tentative);
                self.came_from.insert(neighbor, current);
                self.open.insert(neighbor, tentative);
                if other.has_reached(neighbor) {
                    return Some(neighbor);
                }
            }
        }
        None
    }

    /// Follows this direction's tree from `from` back to its root.
    fn chain_to_root(&self, from: NodeId, limit: usize) -> Option<Vec<NodeId>> {
        let mut chain = Vec::new();
        let mut current = from;
        while let Some(&previous) = self.came_from.get(&current) {
            chain.push(previous);
            if chain.len() > limit {
                error!(%from, "cycle in bidirectional predecessor chain");
                return None;
            }
            current = previous;
        }
        Some(chain)
    }

    fn state_bytes(&self) -> usize {
        map_bytes::<NodeId, f32>(self.cost.len() + self.open.len())
            + map_bytes::<NodeId, NodeId>(self.came_from.len())
            + map_bytes::<NodeId, ()>(self.expanded.len())
    }
}

/// Two cost-ordered searches, from the start and from the target, taking
/// turns one expansion at a time. The first node reached by both ends the
/// search.
///
/// The meeting test is a frontier-intersection heuristic: it does not check
/// that the joined route is globally shortest, so results can be longer than
/// the true optimum.
pub struct BidirectionalSearch {
    last_target: Option<NodeId>,
    metrics: MetricsRecorder,
}

impl Default for BidirectionalSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl BidirectionalSearch {
    pub fn new() -> Self {
        BidirectionalSearch {
            last_target: None,
            metrics: MetricsRecorder::new("bidirectional"),
        }
    }

    /// start .. meeting .. target, meeting node exactly once.
    fn join(
        forward: &Frontier,
        backward: &Frontier,
        meeting: NodeId,
        limit: usize,
    ) -> Option<Vec<NodeId>> {
        let mut nodes = forward.chain_to_root(meeting, limit)?;
        nodes.reverse();
        nodes.push(meeting);
        nodes.extend(backward.chain_to_root(meeting, limit)?);
        Some(nodes)
    }
}

impl PathfindingAlgorithm for BidirectionalSearch {
    fn name(&self) -> &'static str {
        "bidirectional"
    }

    #[instrument(skip_all, name = "bidirectional", fields(start = %start, target = %target), level = "debug")]
    fn calculate_path(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> Result<Path> {
        check_query(graph, start, target)?;
        self.last_target = Some(target);
        self.metrics.start(0);

        let mut forward = Frontier::rooted_at(start);
        let mut backward = Frontier::rooted_at(target);

        let mut meeting = (start == target).then_some(start);
        // The backward tree is rooted at the target, so a blocked target would
        // otherwise still be joined onto.
        let target_open = start == target || !graph.is_blocked(target);
        while target_open
            && meeting.is_none()
            && !forward.open.is_empty()
            && !backward.open.is_empty()
        {
            meeting = forward.step(graph, &backward, &mut self.metrics);
            if meeting.is_none() {
                meeting = backward.step(graph, &forward, &mut self.metrics);
            }
        }

        let path = match meeting.and_then(|m| Self::join(&forward, &backward, m, graph.len())) {
            Some(nodes) => Path::found(graph, nodes),
            None => {
                warn!("bidirectional search: no path found");
                Path::not_found(SearchStatus::NoPath)
            }
        };
        if let Some(meeting) = meeting {
            debug!(%meeting, "frontiers met");
        }
        let state_bytes = forward.state_bytes() + backward.state_bytes();
        self.metrics.finish(&path.waypoints, state_bytes);
        Ok(path)
    }

    fn handle_blocked(
        &mut self,
        graph: &mut Graph,
        blocked: NodeId,
        context: &dyn ReplanContext,
    ) -> Result<Path> {
        debug!(%blocked, "bidirectional search: blocked path, recalculating");
        let remembered = self.last_target;
        replan_from_scratch(self, graph, blocked, context, remembered)
    }

    fn reset(&mut self) {
        self.last_target = None;
    }

    fn last_metrics(&self) -> Option<&SearchMetrics> {
        self.metrics.last()
    }
}
