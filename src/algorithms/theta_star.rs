use crate::algorithms::common::{
    check_query, reconstruct_path, replan_from_scratch, Path, PathfindingAlgorithm, ReplanContext,
    SearchStatus,
};
use crate::algorithms::priority_queue::PriorityQueue;
use crate::error::Result;
use crate::graph::{Graph, NodeId, Position};
use crate::metrics::{map_bytes, MetricsRecorder, SearchMetrics};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument, warn};

/// Relative tolerance when deciding whether a neighbour lies on an axis.
const AXIS_TOLERANCE: f32 = 1e-4;

/// Collision query: is the straight segment between two positions free?
pub trait LineOfSight {
    fn is_clear(&self, graph: &Graph, from: Position, to: Position) -> bool;
}

impl<F> LineOfSight for F
where
    F: Fn(Position, Position) -> bool,
{
    fn is_clear(&self, _graph: &Graph, from: Position, to: Position) -> bool {
        self(from, to)
    }
}

/// Never grants a shortcut; Theta* degrades to plain grid search.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShortcuts;

impl LineOfSight for NoShortcuts {
    fn is_clear(&self, _graph: &Graph, _from: Position, _to: Position) -> bool {
        false
    }
}

/// Treats every blocked node as a disc of `radius`; a segment touching any
/// disc is obstructed.
#[derive(Debug, Clone, Copy)]
pub struct ClearanceSight {
    pub radius: f32,
}

impl ClearanceSight {
    pub fn new(radius: f32) -> Self {
        ClearanceSight { radius }
    }
}

impl Default for ClearanceSight {
    fn default() -> Self {
        ClearanceSight { radius: 0.5 }
    }
}

impl LineOfSight for ClearanceSight {
    fn is_clear(&self, graph: &Graph, from: Position, to: Position) -> bool {
        graph
            .blocked_nodes()
            .all(|id| segment_distance(graph.position(id), from, to) > self.radius)
    }
}

fn segment_distance(point: Position, a: Position, b: Position) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return point.distance(a);
    }
    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance(Position::new(a.x + t * dx, a.y + t * dy))
}

fn is_axis_aligned(from: Position, to: Position) -> bool {
    let (dx, dy) = ((to.x - from.x).abs(), (to.y - from.y).abs());
    (dx > 0.0 && dy <= dx * AXIS_TOLERANCE) || (dy > 0.0 && dx <= dy * AXIS_TOLERANCE)
}

fn heuristic(graph: &Graph, a: NodeId, b: NodeId) -> f32 {
    graph.position(a).manhattan(graph.position(b))
}

/// Any-angle search: a neighbour inherits the current node's parent when the
/// parent can see it directly. Only axis-aligned neighbours are expanded and
/// the open set is ordered by `g + manhattan`.
pub struct ThetaStar {
    sight: Box<dyn LineOfSight>,
    last_target: Option<NodeId>,
    metrics: MetricsRecorder,
}

impl Default for ThetaStar {
    fn default() -> Self {
        Self::new(ClearanceSight::default())
    }
}

impl ThetaStar {
    pub fn new(sight: impl LineOfSight + 'static) -> Self {
        ThetaStar {
            sight: Box::new(sight),
            last_target: None,
            metrics: MetricsRecorder::new("theta_star"),
        }
    }
}

impl PathfindingAlgorithm for ThetaStar {
    fn name(&self) -> &'static str {
        "theta_star"
    }

    #[instrument(skip_all, name = "theta_star", fields(start = %start, target = %target), level = "debug")]
    fn calculate_path(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> Result<Path> {
        check_query(graph, start, target)?;
        self.last_target = Some(target);
        self.metrics.start(0);

        let mut g: FxHashMap<NodeId, f32> = FxHashMap::default();
        let mut came_from: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut closed: FxHashSet<NodeId> = FxHashSet::default();
        let mut open = PriorityQueue::new();

        g.insert(start, 0.0);
        open.insert(start, heuristic(graph, start, target));

        let mut path = Path::not_found(SearchStatus::NoPath);
        while !open.is_empty() {
            let current = open.extract_min();
            self.metrics.node_expanded();

            if current == target {
                if let Some(nodes) = reconstruct_path(&came_from, start, target, graph.len()) {
                    path = Path::found(graph, nodes);
                }
                break;
            }
            closed.insert(current);

            let current_position = graph.position(current);
            let parent = came_from.get(&current).copied().unwrap_or(current);
            for &neighbor in graph.neighbors(current) {
                let neighbor_position = graph.position(neighbor);
                if !is_axis_aligned(current_position, neighbor_position)
                    || closed.contains(&neighbor)
                    || graph.is_blocked(neighbor)
                {
                    continue;
                }

                let (from, cost) = if self.sight.is_clear(graph, graph.position(parent), neighbor_position) {
                    (parent, g[&parent] + graph.distance(parent, neighbor))
                } else {
                    (current, g[&current] + graph.distance(current, neighbor))
                };

                if cost < g.get(&neighbor).copied().unwrap_or(f32::INFINITY) {
                    g.insert(neighbor, cost);
                    came_from.insert(neighbor, from);
                    open.insert(neighbor, cost + heuristic(graph, neighbor, target));
                }
            }
        }

        if path.is_empty() {
            warn!("theta*: no valid path found");
        }
        let state_bytes = map_bytes::<NodeId, f32>(g.len())
            + map_bytes::<NodeId, NodeId>(came_from.len())
            + map_bytes::<NodeId, ()>(closed.len());
        self.metrics.finish(&path.waypoints, state_bytes);
        Ok(path)
    }

    fn handle_blocked(
        &mut self,
        graph: &mut Graph,
        blocked: NodeId,
        context: &dyn ReplanContext,
    ) -> Result<Path> {
        debug!(%blocked, "theta*: blocked path, recalculating");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_shortcuts_matches_grid_distance() {
        let graph = Graph::grid(3, 3, 1.0);
        let path = ThetaStar::new(NoShortcuts)
            .calculate_path(&graph, NodeId(0), NodeId(8))
            .unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.length(), 4.0);
    }

    #[test]
    fn open_field_collapses_to_a_straight_line() {
        let graph = Graph::grid(4, 4, 1.0);
        let path = ThetaStar::default()
            .calculate_path(&graph, NodeId(0), NodeId(15))
            .unwrap();
        assert_eq!(path.nodes, vec![NodeId(0), NodeId(15)]);
        assert!((path.length() - 18f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn shortcut_respects_blocked_node_clearance() {
        let mut graph = Graph::grid(3, 3, 1.0);
        graph.set_blocked(NodeId(4), true).unwrap();
        let path = ThetaStar::default()
            .calculate_path(&graph, NodeId(0), NodeId(8))
            .unwrap();
        assert!(!path.is_empty());
        assert!(!path.contains(NodeId(4)));
        for pair in path.waypoints.windows(2) {
            assert!(segment_distance(graph.position(NodeId(4)), pair[0], pair[1]) > 0.5);
        }
        let reference = graph.reference_shortest_length(NodeId(0), NodeId(8)).unwrap();
        assert!(path.length() <= reference + 1e-4);
    }

    #[test]
    fn diagonal_neighbors_are_ignored() {
        let mut graph = Graph::new();
        let a = graph.add_node(Position::new(0.0, 0.0));
        let b = graph.add_node(Position::new(1.0, 1.0));
        graph.connect(a, b);
        let path = ThetaStar::new(NoShortcuts).calculate_path(&graph, a, b).unwrap();
        assert_eq!(path.status, SearchStatus::NoPath);
        assert!(path.is_empty());
    }

    #[test]
    fn closure_line_of_sight_is_accepted() {
        let graph = Graph::grid(3, 1, 1.0);
        let path = ThetaStar::new(|_: Position, _: Position| true)
            .calculate_path(&graph, NodeId(0), NodeId(2))
            .unwrap();
        assert_eq!(path.nodes, vec![NodeId(0), NodeId(2)]);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(2.0, 0.0);
        assert_eq!(segment_distance(Position::new(1.0, 1.0), a, b), 1.0);
        assert_eq!(segment_distance(Position::new(3.0, 0.0), a, b), 1.0);
        assert_eq!(segment_distance(Position::new(0.0, 0.0), a, a), 0.0);
    }
}
