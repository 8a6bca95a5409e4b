use crate::algorithms::AlgorithmKind;
use anyhow::{anyhow, Result};
use clap::builder::PossibleValue;
use clap::{Parser, ValueEnum};

/// Which algorithms a run exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every algorithm on the same scenario, compared side by side.
    All,
    Only(AlgorithmKind),
}

impl Selection {
    pub fn kinds(self) -> Vec<AlgorithmKind> {
        match self {
            Selection::All => AlgorithmKind::ALL.to_vec(),
            Selection::Only(kind) => vec![kind],
        }
    }
}

impl ValueEnum for Selection {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Selection::All,
            Selection::Only(AlgorithmKind::Dijkstra),
            Selection::Only(AlgorithmKind::ThetaStar),
            Selection::Only(AlgorithmKind::Bidirectional),
            Selection::Only(AlgorithmKind::FringeSearch),
            Selection::Only(AlgorithmKind::DStarLite),
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            Selection::All => Some(PossibleValue::new("all").help("Compare every algorithm")),
            Selection::Only(kind) => kind.to_possible_value(),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Replanning agents on a lattice with timed obstacles", long_about = None)]
pub struct Config {
    /// Nodes per side of the square lattice.
    #[arg(long, default_value_t = 20)]
    pub grid_size: usize,

    /// Distance between neighbouring nodes.
    #[arg(long, default_value_t = 1.0)]
    pub spacing: f32,

    /// Also link diagonal neighbours (proximity linking at 1.5 x spacing).
    #[arg(long, default_value_t = false)]
    pub diagonal: bool,

    #[arg(long, value_enum, default_value = "all")]
    pub algorithm: Selection,

    /// Scenario seed; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Steps between obstacle waves.
    #[arg(long, default_value_t = 5)]
    pub obstacle_interval: usize,

    /// Steps an obstacle stays before it clears.
    #[arg(long, default_value_t = 10)]
    pub obstacle_lifespan: usize,

    #[arg(long, default_value_t = 3)]
    pub obstacles_per_wave: usize,

    /// Step cap per run; defaults to four times the node count.
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Default filter when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Only print the final tables.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.grid_size < 2 {
            return Err(anyhow!("grid size must be at least 2, got {}", self.grid_size));
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(anyhow!("spacing must be a positive number, got {}", self.spacing));
        }
        if self.obstacle_interval == 0 {
            return Err(anyhow!("obstacle interval must be at least one step"));
        }
        if self.obstacle_lifespan == 0 {
            return Err(anyhow!("obstacle lifespan must be at least one step"));
        }
        let free_nodes = self.grid_size * self.grid_size - 2;
        if self.obstacles_per_wave > free_nodes {
            return Err(anyhow!(
                "{} obstacles per wave do not fit on {} free nodes",
                self.obstacles_per_wave,
                free_nodes
            ));
        }
        if self.max_steps == Some(0) {
            return Err(anyhow!("max steps must be positive"));
        }
        self.log_level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow!("unknown log level '{}'", self.log_level))?;
        Ok(())
    }

    pub fn step_limit(&self) -> usize {
        self.max_steps
            .unwrap_or(self.grid_size * self.grid_size * 4)
    }

    pub fn node_count(&self) -> usize {
        self.grid_size * self.grid_size
    }
}
