use crate::algorithms::common::{
    check_query, reconstruct_path, replan_from_scratch, Path, PathfindingAlgorithm, ReplanContext,
    SearchStatus,
};
use crate::algorithms::priority_queue::PriorityQueue;
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::metrics::{map_bytes, MetricsRecorder, SearchMetrics};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument, warn};

/// Uninformed best-first search with a closed set. Every call starts from
/// scratch; the only state kept is the last target, so a replan can head
/// back to the same goal.
pub struct Dijkstra {
    last_target: Option<NodeId>,
    metrics: MetricsRecorder,
}

impl Default for Dijkstra {
    fn default() -> Self {
        Self::new()
    }
}

impl Dijkstra {
    pub fn new() -> Self {
        Dijkstra {
            last_target: None,
            metrics: MetricsRecorder::new("dijkstra"),
        }
    }
}

impl PathfindingAlgorithm for Dijkstra {
    fn name(&self) -> &'static str {
        "dijkstra"
    }

    #[instrument(skip_all, name = "dijkstra", fields(start = %start, target = %target), level = "debug")]
    fn calculate_path(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> Result<Path> {
        check_query(graph, start, target)?;
        self.last_target = Some(target);
        self.metrics.start(0);

        let mut cost: FxHashMap<NodeId, f32> = FxHashMap::default();
        let mut came_from: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut closed: FxHashSet<NodeId> = FxHashSet::default();
        let mut open = PriorityQueue::new();

        cost.insert(start, 0.0);
        open.insert(start, 0.0);

        let mut path = Path::not_found(SearchStatus::NoPath);
        while !open.is_empty() {
            let current = open.extract_min();
            closed.insert(current);
            self.metrics.node_expanded();

            if current == target {
                if let Some(nodes) = reconstruct_path(&came_from, start, target, graph.len()) {
                    path = Path::found(graph, nodes);
                }
                break;
            }

            let current_cost = cost[&current];
            for &neighbor in graph.neighbors(current) {
                if graph.is_blocked(neighbor) || closed.contains(&neighbor) {
                    continue;
                }
                let tentative = current_cost + graph.distance(current, neighbor);
                if tentative < cost.get(&neighbor).copied().unwrap_or(f32::INFINITY) {
                    cost.insert(neighbor, tentative);
                    came_from.insert(neighbor, current);
                    open.insert(neighbor, tentative);
                }
            }
        }

        if path.is_empty() {
            warn!("dijkstra: no path found");
        }
        let state_bytes = map_bytes::<NodeId, f32>(cost.len())
            + map_bytes::<NodeId, NodeId>(came_from.len())
            + map_bytes::<NodeId, ()>(closed.len());
        let metrics = self.metrics.finish(&path.waypoints, state_bytes);
        debug!(expanded = metrics.nodes_expanded, length = metrics.path_length, "dijkstra finished");
        Ok(path)
    }

    fn handle_blocked(
        &mut self,
        graph: &mut Graph,
        blocked: NodeId,
        context: &dyn ReplanContext,
    ) -> Result<Path> {
        debug!(%blocked, "dijkstra: blocked path, recalculating");
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
