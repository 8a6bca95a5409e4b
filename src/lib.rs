//! Pathfinding over graphs whose nodes become blocked and unblocked while an
//! agent is travelling, with one-shot searches (Dijkstra, Theta*,
//! bidirectional), a threshold search that keeps state between calls (Fringe)
//! and an incremental planner (D* Lite) behind one trait.

pub mod agent;
pub mod algorithms;
pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod simulation;
pub mod statistics;

pub use algorithms::common::{Path, PathfindingAlgorithm, ReplanContext, SearchStatus};
pub use algorithms::AlgorithmKind;
pub use error::{Endpoint, PathError, Result};
pub use graph::{Graph, NodeId, Position};
pub use metrics::{MetricsRecorder, MetricsSink, SearchMetrics};
