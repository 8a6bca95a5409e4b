use crate::graph::{Graph, Position};
use std::mem::size_of;
use std::time::{Duration, Instant};

/// Raw counters for a single search call. Consumers format them; the core
/// only fills them in.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMetrics {
    pub algorithm: &'static str,
    pub elapsed: Duration,
    pub nodes_expanded: usize,
    pub path_length: f32,
    /// Change in estimated bytes held by search state across the call.
    pub memory_delta_bytes: i64,
}

/// Receives finished metrics. Implemented by whatever reports them.
pub trait MetricsSink {
    fn record(&mut self, metrics: &SearchMetrics);
}

impl MetricsSink for Vec<SearchMetrics> {
    fn record(&mut self, metrics: &SearchMetrics) {
        self.push(metrics.clone());
    }
}

/// Passive collector owned by each algorithm instance.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    algorithm: &'static str,
    started: Option<Instant>,
    nodes_expanded: usize,
    baseline_bytes: usize,
    last: Option<SearchMetrics>,
}

impl MetricsRecorder {
    pub fn new(algorithm: &'static str) -> Self {
        MetricsRecorder {
            algorithm,
            started: None,
            nodes_expanded: 0,
            baseline_bytes: 0,
            last: None,
        }
    }

    /// Begins a measurement. `state_bytes` is what the algorithm already holds.
    pub fn start(&mut self, state_bytes: usize) {
        self.nodes_expanded = 0;
        self.baseline_bytes = state_bytes;
        self.started = Some(Instant::now());
    }

    pub fn node_expanded(&mut self) {
        self.nodes_expanded += 1;
    }

    pub fn nodes_expanded(&self) -> usize {
        self.nodes_expanded
    }

    pub fn finish(&mut self, waypoints: &[Position], state_bytes: usize) -> &SearchMetrics {
        let elapsed = self.started.take().map(|t| t.elapsed()).unwrap_or_default();
        self.last.insert(SearchMetrics {
            algorithm: self.algorithm,
            elapsed,
            nodes_expanded: self.nodes_expanded,
            path_length: Graph::path_length(waypoints),
            memory_delta_bytes: state_bytes as i64 - self.baseline_bytes as i64,
        })
    }

    pub fn last(&self) -> Option<&SearchMetrics> {
        self.last.as_ref()
    }
}

/// Rough footprint of a map or set holding `entries` items of `K`/`V`.
pub fn map_bytes<K, V>(entries: usize) -> usize {
    entries * (size_of::<K>() + size_of::<V>())
}
