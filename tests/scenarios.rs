mod common;

use common::{assert_route, assert_walk, block, chain, grid, two_rooms, Anchors};
use dynamic_replan::algorithms::d_star_lite::DStarLite;
use dynamic_replan::algorithms::dijkstra::Dijkstra;
use dynamic_replan::algorithms::fringe_search::FringeSearch;
use dynamic_replan::algorithms::bidirectional::BidirectionalSearch;
use dynamic_replan::algorithms::theta_star::{ClearanceSight, ThetaStar};
use dynamic_replan::config::Config;
use dynamic_replan::simulation::{Scenario, Simulation};
use dynamic_replan::{AlgorithmKind, NodeId, PathError, PathfindingAlgorithm, Position, SearchStatus};
use proptest::prelude::*;

/// Algorithms whose routes follow graph edges hop by hop.
const WALKERS: [AlgorithmKind; 4] = [
    AlgorithmKind::Dijkstra,
    AlgorithmKind::Bidirectional,
    AlgorithmKind::FringeSearch,
    AlgorithmKind::DStarLite,
];

#[test]
fn open_three_by_three_corner_to_corner() {
    let graph = grid(3, 3);
    for kind in WALKERS {
        let path = kind.create(1.0).calculate_path(&graph, NodeId(0), NodeId(8)).unwrap();
        assert_walk(&graph, &path, NodeId(0), NodeId(8));
        assert_eq!(path.waypoints.len(), 5, "{kind}");
        assert_eq!(path.waypoints[0], Position::new(0.0, 0.0));
        assert_eq!(path.waypoints[4], Position::new(2.0, 2.0));
        assert_eq!(path.length(), 4.0, "{kind}");
    }

    let theta = AlgorithmKind::ThetaStar
        .create(1.0)
        .calculate_path(&graph, NodeId(0), NodeId(8))
        .unwrap();
    assert_route(&graph, &theta, NodeId(0), NodeId(8));
    assert!(theta.length() <= 4.0);
}

#[test]
fn blocked_center_forces_the_rim() {
    let mut graph = grid(3, 3);
    block(&mut graph, &[4]);
    for kind in AlgorithmKind::ALL {
        let path = kind.create(1.0).calculate_path(&graph, NodeId(0), NodeId(8)).unwrap();
        assert_route(&graph, &path, NodeId(0), NodeId(8));
        assert!(!path.contains(NodeId(4)), "{kind}");
        assert!(!path.waypoints.contains(&Position::new(1.0, 1.0)));
        if kind != AlgorithmKind::ThetaStar {
            assert_eq!(path.length(), 4.0, "{kind}");
        }
    }
}

#[test]
fn severed_chain_is_unreachable_for_everyone() {
    let mut graph = chain(5);
    block(&mut graph, &[2]);
    for kind in AlgorithmKind::ALL {
        let path = kind.create(1.0).calculate_path(&graph, NodeId(0), NodeId(4)).unwrap();
        assert!(path.is_empty(), "{kind} crossed the gap");
        assert_eq!(path.status, SearchStatus::NoPath, "{kind}");
    }
}

#[test]
fn blocking_the_only_corridor_disconnects_the_rooms() {
    let (mut graph, corridor) = two_rooms();
    for kind in AlgorithmKind::ALL {
        let path = kind.create(1.0).calculate_path(&graph, NodeId(0), NodeId(9)).unwrap();
        assert_route(&graph, &path, NodeId(0), NodeId(9));
    }

    graph.set_blocked(corridor, true).unwrap();
    for kind in AlgorithmKind::ALL {
        let path = kind.create(1.0).calculate_path(&graph, NodeId(0), NodeId(9)).unwrap();
        assert!(path.is_empty(), "{kind} found a way through");
    }
}

#[test]
fn every_algorithm_replans_around_a_new_obstacle() {
    let anchors = Anchors {
        agent: NodeId(0),
        target: NodeId(24),
    };
    for kind in AlgorithmKind::ALL {
        let mut graph = grid(5, 5);
        let mut algorithm = kind.create(1.0);
        let first = algorithm.calculate_path(&graph, NodeId(0), NodeId(24)).unwrap();
        let blocked = if first.nodes.len() > 2 {
            first.nodes[first.nodes.len() / 2]
        } else {
            NodeId(12)
        };

        let path = algorithm.handle_blocked(&mut graph, blocked, &anchors).unwrap();
        assert!(graph.is_blocked(blocked));
        assert_route(&graph, &path, NodeId(0), NodeId(24));
        assert!(!path.contains(blocked), "{kind} kept {blocked}");
        if kind != AlgorithmKind::ThetaStar {
            assert_walk(&graph, &path, NodeId(0), NodeId(24));
        }
    }
}

#[test]
fn replanning_without_free_anchor_is_an_error() {
    struct Nowhere;
    impl dynamic_replan::ReplanContext for Nowhere {
        fn closest_node_to_agent(&self, _graph: &dynamic_replan::Graph) -> Option<NodeId> {
            None
        }
        fn closest_node_to_target(&self, _graph: &dynamic_replan::Graph) -> Option<NodeId> {
            None
        }
    }

    let mut graph = chain(3);
    let mut dijkstra = Dijkstra::new();
    let result = dijkstra.handle_blocked(&mut graph, NodeId(1), &Nowhere);
    assert!(matches!(result, Err(PathError::NoAnchorNode(_))));
}

#[test]
fn unknown_nodes_are_rejected_before_searching() {
    let graph = grid(2, 2);
    for kind in AlgorithmKind::ALL {
        let result = kind.create(1.0).calculate_path(&graph, NodeId(0), NodeId(9));
        assert_eq!(result, Err(PathError::UnknownNode(NodeId(9))), "{kind}");
    }
}

#[test]
fn bidirectional_joins_both_trees_once() {
    let graph = grid(6, 6);
    let path = BidirectionalSearch::new()
        .calculate_path(&graph, NodeId(0), NodeId(35))
        .unwrap();
    assert_walk(&graph, &path, NodeId(0), NodeId(35));
    let mut sorted = path.nodes.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), path.nodes.len());
}

#[test]
fn fringe_persisted_state_survives_a_replan() {
    let mut graph = grid(6, 6);
    let mut fringe = FringeSearch::new();
    fringe.calculate_path(&graph, NodeId(0), NodeId(35)).unwrap();
    let anchors = Anchors {
        agent: NodeId(0),
        target: NodeId(35),
    };
    let path = fringe.handle_blocked(&mut graph, NodeId(14), &anchors).unwrap();
    assert_walk(&graph, &path, NodeId(0), NodeId(35));
    assert!(fringe.visited_count() > 0);
}

#[test]
fn seeded_simulation_runs_every_algorithm() {
    let config = <Config as clap::Parser>::parse_from([
        "dynamic-replan",
        "--grid-size",
        "10",
        "--seed",
        "42",
        "--obstacles-per-wave",
        "4",
    ]);
    config.validate().unwrap();
    let scenario = Scenario::generate(&config);
    let reports = Simulation::run_all(&scenario, &AlgorithmKind::ALL).unwrap();
    assert_eq!(reports.len(), 5);
    for report in &reports {
        assert!(report.statistics.total_calls() >= 1, "{}", report.name);
        assert_eq!(
            report.statistics.total_calls(),
            1 + report.statistics.replans + report.statistics.waits,
            "{}",
            report.name
        );
        if report.success {
            assert_eq!(report.final_node, Some(scenario.goal));
        }
    }
}

/// Distance from `point` to the segment `a`-`b`.
fn segment_distance(point: Position, a: Position, b: Position) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return point.distance(a);
    }
    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance(Position::new(a.x + t * dx, a.y + t * dy))
}

fn scenario_strategy() -> impl Strategy<Value = (usize, usize, usize, usize, Vec<usize>)> {
    (2usize..7, 2usize..7).prop_flat_map(|(width, height)| {
        let n = width * height;
        (
            Just(width),
            Just(height),
            0..n,
            0..n,
            prop::collection::vec(0..n, 0..12),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn dijkstra_matches_the_reference_solver(
        (width, height, start, target, blocked) in scenario_strategy()
    ) {
        let mut graph = grid(width, height);
        block(&mut graph, &blocked);
        let (start, target) = (NodeId(start), NodeId(target));
        let path = Dijkstra::new().calculate_path(&graph, start, target).unwrap();
        match graph.reference_shortest_length(start, target) {
            Some(reference) => {
                assert_walk(&graph, &path, start, target);
                prop_assert!((path.length() - reference).abs() < 1e-3);
            }
            None => prop_assert!(path.is_empty()),
        }
    }

    #[test]
    fn theta_star_never_beats_sight_or_loses_to_the_grid(
        (width, height, start, target, blocked) in scenario_strategy()
    ) {
        let mut graph = grid(width, height);
        block(&mut graph, &blocked);
        let (start, target) = (NodeId(start), NodeId(target));
        let sight = ClearanceSight::new(0.5);
        let path = ThetaStar::new(sight).calculate_path(&graph, start, target).unwrap();
        match graph.reference_shortest_length(start, target) {
            Some(reference) => {
                assert_route(&graph, &path, start, target);
                prop_assert!(path.length() <= reference + 1e-3);
                for segment in path.waypoints.windows(2) {
                    for id in graph.blocked_nodes().filter(|&id| id != start) {
                        prop_assert!(
                            segment_distance(graph.position(id), segment[0], segment[1]) > sight.radius,
                            "segment passes {}",
                            id
                        );
                    }
                }
            }
            None => prop_assert!(path.is_empty()),
        }
    }

    #[test]
    fn walkers_agree_on_reachability(
        (width, height, start, target, blocked) in scenario_strategy()
    ) {
        let mut graph = grid(width, height);
        block(&mut graph, &blocked);
        let (start, target) = (NodeId(start), NodeId(target));
        let reachable = graph.reference_shortest_length(start, target).is_some();
        for kind in WALKERS {
            let path = kind.create(1.0).calculate_path(&graph, start, target).unwrap();
            if reachable {
                assert_walk(&graph, &path, start, target);
            } else {
                prop_assert!(path.is_empty(), "{} found a path the reference could not", kind);
            }
        }
    }

    #[test]
    fn d_star_lite_stays_optimal_across_toggles(
        (width, height, start, target, toggles) in scenario_strategy()
    ) {
        let mut graph = grid(width, height);
        let (start, target) = (NodeId(start), NodeId(target));
        let mut d_star = DStarLite::new();
        for toggle in toggles {
            let path = d_star.calculate_path(&graph, start, target).unwrap();
            match graph.reference_shortest_length(start, target) {
                Some(reference) => {
                    assert_walk(&graph, &path, start, target);
                    prop_assert!((path.length() - reference).abs() < 1e-3);
                }
                None => prop_assert!(path.is_empty()),
            }
            let id = NodeId(toggle);
            let was = graph.is_blocked(id);
            graph.set_blocked(id, !was).unwrap();
        }
    }
}
