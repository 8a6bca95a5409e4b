use crate::error::{Endpoint, PathError, Result};
use crate::graph::{Graph, NodeId, Position};
use crate::metrics::SearchMetrics;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error};

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Found,
    /// The frontier ran dry before reaching the target.
    NoPath,
    /// A fixed safety cap stopped the search. Callers treat it as `NoPath`.
    SafetyLimitExceeded { iterations: usize, visited: usize },
}

/// An ordered start-to-target route. Both endpoints are included; an empty
/// route means no path was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub waypoints: Vec<Position>,
    pub status: SearchStatus,
}

impl Path {
    pub fn found(graph: &Graph, nodes: Vec<NodeId>) -> Self {
        let waypoints = nodes.iter().map(|&id| graph.position(id)).collect();
        Path {
            nodes,
            waypoints,
            status: SearchStatus::Found,
        }
    }

    pub fn not_found(status: SearchStatus) -> Self {
        Path {
            nodes: Vec::new(),
            waypoints: Vec::new(),
            status,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn length(&self) -> f32 {
        Graph::path_length(&self.waypoints)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }
}

/// Closest-node queries answered by whoever owns the agent.
pub trait ReplanContext {
    /// Nearest unblocked node to where the agent stands now.
    fn closest_node_to_agent(&self, graph: &Graph) -> Option<NodeId>;

    /// Nearest unblocked node to where the agent is heading.
    fn closest_node_to_target(&self, graph: &Graph) -> Option<NodeId>;
}

pub trait PathfindingAlgorithm {
    fn name(&self) -> &'static str;

    /// Searches from `start` to `target` over the current node states.
    fn calculate_path(&mut self, graph: &Graph, start: NodeId, target: NodeId) -> Result<Path>;

    /// Reacts to `blocked` becoming impassable while a path is in flight:
    /// marks it, re-anchors the endpoints and returns a fresh path.
    fn handle_blocked(
        &mut self,
        graph: &mut Graph,
        blocked: NodeId,
        context: &dyn ReplanContext,
    ) -> Result<Path>;

    /// Drops any state carried between calls.
    fn reset(&mut self) {}

    /// Counters from the most recent search, if any ran.
    fn last_metrics(&self) -> Option<&SearchMetrics>;
}

/// Validates a query before any node is dereferenced.
pub fn check_query(graph: &Graph, start: NodeId, target: NodeId) -> Result<()> {
    if graph.is_empty() {
        return Err(PathError::EmptyGraph);
    }
    graph.check(start)?;
    graph.check(target)?;
    Ok(())
}

/// Picks the endpoints for a replan after a block event. The remembered
/// target is kept while it is still passable.
pub fn replan_endpoints(
    graph: &Graph,
    context: &dyn ReplanContext,
    remembered_target: Option<NodeId>,
) -> Result<(NodeId, NodeId)> {
    let start = context
        .closest_node_to_agent(graph)
        .ok_or(PathError::NoAnchorNode(Endpoint::Agent))?;
    let target = match remembered_target {
        Some(id) if graph.check(id).is_ok() && !graph.is_blocked(id) => id,
        _ => context
            .closest_node_to_target(graph)
            .ok_or(PathError::NoAnchorNode(Endpoint::Target))?,
    };
    debug!(%start, %target, "replanning endpoints");
    Ok((start, target))
}

/// Marks `blocked` impassable and re-runs `algorithm` from scratch with
/// re-anchored endpoints.
pub fn replan_from_scratch<A: PathfindingAlgorithm + ?Sized>(
    algorithm: &mut A,
    graph: &mut Graph,
    blocked: NodeId,
    context: &dyn ReplanContext,
    remembered_target: Option<NodeId>,
) -> Result<Path> {
    graph.set_blocked(blocked, true)?;
    let (start, target) = replan_endpoints(graph, context, remembered_target)?;
    algorithm.calculate_path(graph, start, target)
}

/// Walks `came_from` back from `target` to `start`, returning the chain in
/// forward order. `None` if the chain is broken or loops.
pub fn reconstruct_path(
    came_from: &FxHashMap<NodeId, NodeId>,
    start: NodeId,
    target: NodeId,
    limit: usize,
) -> Option<Vec<NodeId>> {
    let mut nodes = vec![target];
    let mut seen = FxHashSet::default();
    seen.insert(target);
    let mut current = target;
    while current != start {
        let Some(&previous) = came_from.get(&current) else {
            error!(%current, %start, "predecessor chain broken before reaching start");
            return None;
        };
        if !seen.insert(previous) || nodes.len() > limit {
            error!(%previous, "cycle in predecessor chain");
            return None;
        }
        nodes.push(previous);
        current = previous;
    }
    nodes.reverse();
    Some(nodes)
}
