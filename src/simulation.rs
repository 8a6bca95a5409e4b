use crate::agent::Agent;
use crate::algorithms::common::{Path, PathfindingAlgorithm, ReplanContext};
use crate::algorithms::AlgorithmKind;
use crate::config::Config;
use crate::error::{Endpoint, PathError, Result};
use crate::graph::{Graph, NodeId};
use crate::metrics::MetricsSink;
use crate::statistics::Statistics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument, warn};

/// Consecutive failed searches tolerated before the agent gives up, unless
/// obstacles live longer than that.
const MAX_STUCK_ATTEMPTS: usize = 5;

/// Proximity range, in units of spacing, that also links diagonal neighbours.
const DIAGONAL_RANGE: f32 = 1.5;

/// A reproducible world: the obstacle-free graph, the two endpoints and the
/// obstacle waves rolled up front so every algorithm faces the same ones.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub graph: Graph,
    pub start: NodeId,
    pub goal: NodeId,
    pub waves: Vec<Vec<NodeId>>,
    pub interval: usize,
    pub lifespan: usize,
    pub step_limit: usize,
    pub spacing: f32,
    pub seed: u64,
}

impl Scenario {
    /// Start in the lower-left quadrant, goal in the upper-right, and one wave
    /// of random obstacles per `interval` steps of the step budget.
    pub fn generate(config: &Config) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let size = config.grid_size;

        let mut graph = Graph::grid(size, size, config.spacing);
        if config.diagonal {
            graph.link_within(config.spacing * DIAGONAL_RANGE);
        }

        let half = size / 2;
        let start = NodeId(rng.gen_range(0..half) * size + rng.gen_range(0..half));
        let goal = NodeId(rng.gen_range(half..size) * size + rng.gen_range(half..size));

        let wave_count = config.step_limit() / config.obstacle_interval.max(1);
        let waves = (0..wave_count)
            .map(|_| {
                let mut wave = Vec::with_capacity(config.obstacles_per_wave);
                let mut attempts = 0;
                while wave.len() < config.obstacles_per_wave && attempts < config.obstacles_per_wave * 10 {
                    let candidate = NodeId(rng.gen_range(0..graph.len()));
                    if candidate != start && candidate != goal && !wave.contains(&candidate) {
                        wave.push(candidate);
                    }
                    attempts += 1;
                }
                wave
            })
            .collect::<Vec<_>>();

        info!(seed, %start, %goal, waves = waves.len(), "generated scenario");
        Scenario {
            graph,
            start,
            goal,
            waves,
            interval: config.obstacle_interval,
            lifespan: config.obstacle_lifespan,
            step_limit: config.step_limit(),
            spacing: config.spacing,
            seed,
        }
    }

    /// Start-to-goal length with no obstacles placed.
    pub fn optimal_length(&self) -> Option<f32> {
        self.graph.reference_shortest_length(self.start, self.goal)
    }
}

#[derive(Debug, Clone)]
struct ObstacleGroup {
    nodes: Vec<NodeId>,
    steps_remaining: usize,
}

/// Replays obstacle waves: every `interval` steps the next wave is blocked,
/// and each wave clears itself after `lifespan` steps.
#[derive(Debug, Clone)]
pub struct ObstacleInjector {
    waves: Vec<Vec<NodeId>>,
    interval: usize,
    lifespan: usize,
    next_wave: usize,
    steps_since_wave: usize,
    active: Vec<ObstacleGroup>,
}

impl ObstacleInjector {
    pub fn new(waves: Vec<Vec<NodeId>>, interval: usize, lifespan: usize) -> Self {
        ObstacleInjector {
            waves,
            interval,
            lifespan,
            next_wave: 0,
            steps_since_wave: 0,
            active: Vec::new(),
        }
    }

    /// Advances one step: clears expired groups, then places the next wave
    /// if one is due. Nodes in `protected` or already blocked are skipped.
    /// Returns the nodes blocked this step.
    pub fn tick(&mut self, graph: &mut Graph, protected: &[NodeId]) -> Result<Vec<NodeId>> {
        for group in &mut self.active {
            group.steps_remaining = group.steps_remaining.saturating_sub(1);
            if group.steps_remaining == 0 {
                for &id in &group.nodes {
                    graph.set_blocked(id, false)?;
                }
            }
        }
        self.active.retain(|group| group.steps_remaining > 0);

        self.steps_since_wave += 1;
        if self.steps_since_wave < self.interval {
            return Ok(Vec::new());
        }
        self.steps_since_wave = 0;

        let Some(wave) = self.waves.get(self.next_wave) else {
            return Ok(Vec::new());
        };
        self.next_wave += 1;

        let mut placed = Vec::new();
        for &id in wave {
            if protected.contains(&id) || graph.check(id).is_err() || graph.is_blocked(id) {
                continue;
            }
            graph.set_blocked(id, true)?;
            placed.push(id);
        }
        if !placed.is_empty() {
            debug!(count = placed.len(), "obstacle wave placed");
            self.active.push(ObstacleGroup {
                nodes: placed.clone(),
                steps_remaining: self.lifespan,
            });
        }
        Ok(placed)
    }

    pub fn active_obstacles(&self) -> usize {
        self.active.iter().map(|group| group.nodes.len()).sum()
    }

    /// Unblocks everything still standing.
    pub fn clear(&mut self, graph: &mut Graph) -> Result<()> {
        for group in self.active.drain(..) {
            for id in group.nodes {
                graph.set_blocked(id, false)?;
            }
        }
        Ok(())
    }
}

/// Outcome of one algorithm on one scenario.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub name: &'static str,
    pub statistics: Statistics,
    pub success: bool,
    pub final_node: Option<NodeId>,
}

/// One agent, one algorithm instance and the obstacles it has to dodge.
pub struct Simulation {
    graph: Graph,
    agent: Agent,
    algorithm: Box<dyn PathfindingAlgorithm>,
    injector: ObstacleInjector,
    goal: NodeId,
    step_limit: usize,
    patience: usize,
    statistics: Statistics,
}

impl Simulation {
    pub fn new(scenario: &Scenario, algorithm: Box<dyn PathfindingAlgorithm>) -> Self {
        let graph = scenario.graph.clone();
        let agent = Agent::new(graph.position(scenario.start), graph.position(scenario.goal));
        let statistics = Statistics::new(algorithm.name(), scenario.optimal_length());
        Simulation {
            graph,
            agent,
            algorithm,
            injector: ObstacleInjector::new(scenario.waves.clone(), scenario.interval, scenario.lifespan),
            goal: scenario.goal,
            step_limit: scenario.step_limit,
            patience: scenario.lifespan.max(MAX_STUCK_ATTEMPTS),
            statistics,
        }
    }

    fn record(&mut self, path: &Path) {
        if let Some(metrics) = self.algorithm.last_metrics() {
            self.statistics.record(metrics);
        }
        if path.is_empty() {
            self.statistics.failed_searches += 1;
        }
        self.agent.follow(path);
    }

    /// Records a search outcome. A rejected query counts as a failed search
    /// and leaves the agent without a route, so the next step waits.
    fn settle(&mut self, outcome: Result<Path>) {
        match outcome {
            Ok(path) => self.record(&path),
            Err(err) => {
                warn!(%err, "search rejected, holding position");
                self.statistics.failed_searches += 1;
                self.agent.clear_route();
            }
        }
    }

    fn search_from_agent(&mut self) -> Result<Path> {
        let start = self
            .agent
            .closest_node_to_agent(&self.graph)
            .ok_or(PathError::NoAnchorNode(Endpoint::Agent))?;
        self.algorithm.calculate_path(&self.graph, start, self.goal)
    }

    /// Walks the agent to the goal, replanning whenever the next node on its
    /// route turns out to be blocked.
    #[instrument(skip_all, name = "simulation", fields(algorithm = self.algorithm.name()))]
    pub fn run(&mut self) -> Result<RunReport> {
        let outcome = self.search_from_agent();
        self.settle(outcome);

        let mut stuck_attempts = 0;
        for step in 0..self.step_limit {
            if self.agent.has_arrived(&self.graph) {
                break;
            }

            let here = self.graph.closest(self.agent.position);
            let protected: Vec<NodeId> = here.into_iter().chain([self.goal]).collect();
            self.injector.tick(&mut self.graph, &protected)?;

            match self.agent.next_node() {
                Some(next) if self.graph.is_blocked(next) => {
                    debug!(step, %next, "next node blocked, replanning");
                    self.statistics.replans += 1;
                    let outcome = self
                        .algorithm
                        .handle_blocked(&mut self.graph, next, &self.agent);
                    self.settle(outcome);
                }
                Some(_) => {
                    if let Some(travelled) = self.agent.advance(&self.graph) {
                        self.statistics.distance_travelled += travelled;
                        self.statistics.total_moves += 1;
                    }
                    stuck_attempts = 0;
                }
                None => {
                    stuck_attempts += 1;
                    if stuck_attempts > self.patience {
                        warn!(step, "agent permanently stuck, giving up");
                        break;
                    }
                    self.statistics.waits += 1;
                    let outcome = self.search_from_agent();
                    self.settle(outcome);
                }
            }
        }

        self.injector.clear(&mut self.graph)?;
        let success = self.agent.has_arrived(&self.graph);
        if !success {
            warn!(moves = self.statistics.total_moves, "agent did not reach the goal");
        }
        self.statistics.calculate_efficiency();
        Ok(RunReport {
            name: self.algorithm.name(),
            statistics: self.statistics.clone(),
            success,
            final_node: self.graph.closest(self.agent.position),
        })
    }

    /// Runs each algorithm against its own copy of `scenario`.
    pub fn run_all(scenario: &Scenario, kinds: &[AlgorithmKind]) -> Result<Vec<RunReport>> {
        let mut reports = Vec::with_capacity(kinds.len());
        for (index, kind) in kinds.iter().enumerate() {
            info!("running algorithm {} of {}: {}", index + 1, kinds.len(), kind);
            let mut simulation = Simulation::new(scenario, kind.create(scenario.spacing));
            let report = simulation.run()?;
            info!(
                success = report.success,
                moves = report.statistics.total_moves,
                "completed {}",
                kind
            );
            reports.push(report);
        }
        Ok(reports)
    }

    pub fn print_comparison_results(results: &[RunReport]) {
        println!("\n=== ALGORITHM COMPARISON RESULTS ===");
        println!();
        println!(
            "{:<15} {:<8} {:<7} {:<10} {:<9} {:<11} {:<8} {:<7} {:<13} {:<13} {:<12}",
            "Algorithm",
            "Success",
            "Moves",
            "Distance",
            "Optimal",
            "Efficiency",
            "Replans",
            "Calls",
            "Avg Search",
            "Avg Expanded",
            "Peak Memory"
        );
        println!("{}", "-".repeat(122));

        for result in results {
            let stats = &result.statistics;
            let optimal = stats
                .optimal_path_length
                .map_or_else(|| "-".to_string(), |length| format!("{length:.2}"));
            println!(
                "{:<15} {:<8} {:<7} {:<10.2} {:<9} {:<11.3} {:<8} {:<7} {:<13} {:<13.1} {:<12}",
                result.name,
                if result.success { "yes" } else { "no" },
                stats.total_moves,
                stats.distance_travelled,
                optimal,
                stats.route_efficiency,
                stats.replans,
                stats.total_calls(),
                format!("{:.2?}", stats.average_search_time()),
                stats.average_nodes_expanded(),
                format!("{} B", stats.peak_memory_delta()),
            );
        }
        println!();

        let successful: Vec<_> = results.iter().filter(|r| r.success).collect();
        let (Some(shortest), Some(fastest), Some(leanest)) = (
            successful
                .iter()
                .min_by(|a, b| a.statistics.distance_travelled.total_cmp(&b.statistics.distance_travelled)),
            successful
                .iter()
                .min_by_key(|r| r.statistics.average_search_time()),
            successful
                .iter()
                .min_by(|a, b| {
                    a.statistics
                        .average_nodes_expanded()
                        .total_cmp(&b.statistics.average_nodes_expanded())
                }),
        ) else {
            println!("No algorithms successfully reached the goal.");
            return;
        };

        println!("=== PERFORMANCE ANALYSIS ===");
        println!(
            "Shortest route: {} ({:.2} travelled)",
            shortest.name, shortest.statistics.distance_travelled
        );
        println!(
            "Fastest search: {} ({:.2?} avg)",
            fastest.name,
            fastest.statistics.average_search_time()
        );
        println!(
            "Fewest expansions: {} ({:.1} avg)",
            leanest.name,
            leanest.statistics.average_nodes_expanded()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_scenario(size: usize) -> Scenario {
        Scenario {
            graph: Graph::grid(size, size, 1.0),
            start: NodeId(0),
            goal: NodeId(size * size - 1),
            waves: Vec::new(),
            interval: 5,
            lifespan: 5,
            step_limit: size * size * 4,
            spacing: 1.0,
            seed: 0,
        }
    }

    #[test]
    fn injector_places_and_expires_waves() {
        let mut graph = Graph::grid(3, 3, 1.0);
        let mut injector = ObstacleInjector::new(vec![vec![NodeId(4), NodeId(0)]], 2, 2);

        assert!(injector.tick(&mut graph, &[NodeId(0)]).unwrap().is_empty());
        assert_eq!(injector.tick(&mut graph, &[NodeId(0)]).unwrap(), vec![NodeId(4)]);
        assert!(graph.is_blocked(NodeId(4)));
        assert!(!graph.is_blocked(NodeId(0)));
        assert_eq!(injector.active_obstacles(), 1);

        injector.tick(&mut graph, &[]).unwrap();
        assert!(graph.is_blocked(NodeId(4)));
        injector.tick(&mut graph, &[]).unwrap();
        assert!(!graph.is_blocked(NodeId(4)));
        assert_eq!(injector.active_obstacles(), 0);
    }

    #[test]
    fn injector_clear_unblocks_everything() {
        let mut graph = Graph::grid(3, 3, 1.0);
        let mut injector = ObstacleInjector::new(vec![vec![NodeId(1), NodeId(2)]], 1, 100);
        injector.tick(&mut graph, &[]).unwrap();
        assert_eq!(graph.blocked_nodes().count(), 2);
        injector.clear(&mut graph).unwrap();
        assert_eq!(graph.blocked_nodes().count(), 0);
    }

    #[test]
    fn every_algorithm_crosses_an_open_grid() {
        let scenario = open_scenario(4);
        let reports = Simulation::run_all(&scenario, &AlgorithmKind::ALL).unwrap();
        assert_eq!(reports.len(), AlgorithmKind::ALL.len());
        for report in reports {
            assert!(report.success, "{} failed", report.name);
            assert_eq!(report.final_node, Some(scenario.goal));
            assert_eq!(report.statistics.replans, 0);
            assert_eq!(report.statistics.total_calls(), 1);
        }
    }

    #[test]
    fn blocked_next_node_triggers_a_replan() {
        let mut scenario = open_scenario(3);
        scenario.goal = NodeId(2);
        // Blocks node 1 on the first step, right in front of the agent.
        scenario.waves = vec![vec![NodeId(1)]];
        scenario.interval = 1;
        scenario.lifespan = 50;

        let mut simulation = Simulation::new(&scenario, AlgorithmKind::Dijkstra.create(1.0));
        let report = simulation.run().unwrap();
        assert!(report.success);
        assert!(report.statistics.replans >= 1);
        assert!(report.statistics.distance_travelled > 2.0);
    }

    struct Rejecting;

    impl PathfindingAlgorithm for Rejecting {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        fn calculate_path(&mut self, _graph: &Graph, _start: NodeId, target: NodeId) -> Result<Path> {
            Err(PathError::UnknownNode(target))
        }

        fn handle_blocked(
            &mut self,
            _graph: &mut Graph,
            blocked: NodeId,
            _context: &dyn ReplanContext,
        ) -> Result<Path> {
            Err(PathError::UnknownNode(blocked))
        }

        fn last_metrics(&self) -> Option<&crate::metrics::SearchMetrics> {
            None
        }
    }

    #[test]
    fn rejected_searches_are_counted_and_the_run_finishes() {
        let scenario = open_scenario(3);
        let mut simulation = Simulation::new(&scenario, Box::new(Rejecting));
        let report = simulation.run().unwrap();
        assert!(!report.success);
        assert_eq!(report.final_node, Some(scenario.start));
        assert_eq!(report.statistics.total_moves, 0);
        assert_eq!(report.statistics.waits, scenario.lifespan.max(MAX_STUCK_ATTEMPTS));
        assert_eq!(report.statistics.failed_searches, 1 + report.statistics.waits);
        assert_eq!(report.statistics.total_calls(), 0);
    }

    #[test]
    fn generated_scenarios_are_reproducible() {
        let config = <Config as clap::Parser>::parse_from([
            "dynamic-replan",
            "--grid-size",
            "8",
            "--seed",
            "7",
        ]);
        let a = Scenario::generate(&config);
        let b = Scenario::generate(&config);
        assert_eq!((a.start, a.goal), (b.start, b.goal));
        assert_eq!(a.waves, b.waves);
        assert!(a.optimal_length().is_some());
        assert!(a.waves.iter().flatten().all(|&id| id != a.start && id != a.goal));
    }
}
