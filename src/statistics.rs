use crate::metrics::{MetricsSink, SearchMetrics};
use std::fmt;
use std::time::Duration;

/// Everything one run produced: how the agent moved and what each search
/// call cost.
#[derive(Debug, Clone)]
pub struct Statistics {
    pub algorithm: &'static str,
    pub total_moves: usize,
    pub distance_travelled: f32,
    pub replans: usize,
    pub failed_searches: usize,
    pub waits: usize,
    /// Start-to-goal length on the obstacle-free graph.
    pub optimal_path_length: Option<f32>,
    pub route_efficiency: f64,
    pub searches: Vec<SearchMetrics>,
}

impl Statistics {
    pub fn new(algorithm: &'static str, optimal_path_length: Option<f32>) -> Self {
        Statistics {
            algorithm,
            total_moves: 0,
            distance_travelled: 0.0,
            replans: 0,
            failed_searches: 0,
            waits: 0,
            optimal_path_length,
            route_efficiency: 0.0,
            searches: Vec::new(),
        }
    }

    /// Travelled distance over the obstacle-free optimum; 1.0 is perfect.
    pub fn calculate_efficiency(&mut self) {
        self.route_efficiency = match self.optimal_path_length {
            Some(optimal) if optimal > 0.0 && self.distance_travelled > 0.0 => {
                f64::from(self.distance_travelled) / f64::from(optimal)
            }
            _ => 0.0,
        };
    }

    pub fn total_calls(&self) -> usize {
        self.searches.len()
    }

    pub fn average_search_time(&self) -> Duration {
        if self.searches.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.searches.iter().map(|m| m.elapsed).sum();
        total / self.searches.len() as u32
    }

    pub fn total_search_time(&self) -> Duration {
        self.searches.iter().map(|m| m.elapsed).sum()
    }

    pub fn total_nodes_expanded(&self) -> usize {
        self.searches.iter().map(|m| m.nodes_expanded).sum()
    }

    pub fn average_nodes_expanded(&self) -> f64 {
        if self.searches.is_empty() {
            0.0
        } else {
            self.total_nodes_expanded() as f64 / self.searches.len() as f64
        }
    }

    pub fn peak_memory_delta(&self) -> i64 {
        self.searches
            .iter()
            .map(|m| m.memory_delta_bytes)
            .max()
            .unwrap_or(0)
    }
}

impl MetricsSink for Statistics {
    fn record(&mut self, metrics: &SearchMetrics) {
        self.searches.push(metrics.clone());
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Algorithm: {}", self.algorithm)?;
        writeln!(f, "Total Moves: {}", self.total_moves)?;
        writeln!(f, "Distance Travelled: {:.2}", self.distance_travelled)?;
        match self.optimal_path_length {
            Some(optimal) => writeln!(f, "Optimal Path Length: {optimal:.2}")?,
            None => writeln!(f, "Optimal Path Length: unreachable")?,
        }
        writeln!(f, "Replans: {}", self.replans)?;
        writeln!(f, "Waits: {}", self.waits)?;
        writeln!(f, "Failed Searches: {}", self.failed_searches)?;
        writeln!(f, "Route Efficiency: {:.3}", self.route_efficiency)?;
        writeln!(f, "Search Calls: {}", self.total_calls())?;
        writeln!(f, "Average Search Time: {:.2?}", self.average_search_time())?;
        writeln!(f, "Average Nodes Expanded: {:.1}", self.average_nodes_expanded())?;
        writeln!(f, "Peak Memory Delta: {} bytes", self.peak_memory_delta())?;
        Ok(())
    }
}
