pub mod bidirectional;
pub mod common;
pub mod d_star_lite;
pub mod dijkstra;
pub mod fringe_search;
pub mod priority_queue;
pub mod theta_star;

use bidirectional::BidirectionalSearch;
use clap::ValueEnum;
use common::PathfindingAlgorithm;
use d_star_lite::DStarLite;
use dijkstra::Dijkstra;
use fringe_search::FringeSearch;
use std::fmt;
use theta_star::{ClearanceSight, ThetaStar};

/// Every search strategy the crate ships, selectable at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum AlgorithmKind {
    Dijkstra,
    ThetaStar,
    Bidirectional,
    FringeSearch,
    DStarLite,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 5] = [
        AlgorithmKind::Dijkstra,
        AlgorithmKind::ThetaStar,
        AlgorithmKind::Bidirectional,
        AlgorithmKind::FringeSearch,
        AlgorithmKind::DStarLite,
    ];

    /// Builds a fresh instance. `spacing` is the node pitch; Theta* treats
    /// blocked nodes as discs of half that width.
    pub fn create(self, spacing: f32) -> Box<dyn PathfindingAlgorithm> {
        match self {
            AlgorithmKind::Dijkstra => Box::new(Dijkstra::new()),
            AlgorithmKind::ThetaStar => Box::new(ThetaStar::new(ClearanceSight::new(spacing * 0.5))),
            AlgorithmKind::Bidirectional => Box::new(BidirectionalSearch::new()),
            AlgorithmKind::FringeSearch => Box::new(FringeSearch::new()),
            AlgorithmKind::DStarLite => Box::new(DStarLite::new()),
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => write!(f, "{}", value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}
