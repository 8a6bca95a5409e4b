use crate::graph::NodeId;
use std::fmt;

/// Which end of a query could not be anchored to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Agent,
    Target,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Agent => write!(f, "agent"),
            Endpoint::Target => write!(f, "target"),
        }
    }
}

/// Failures a caller can act on. "No path" is not one of them: an empty
/// [`Path`](crate::algorithms::common::Path) carries that.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("node {0} is not part of the graph")]
    UnknownNode(NodeId),

    #[error("no unblocked node is available near the {0}")]
    NoAnchorNode(Endpoint),

    #[error("cannot search an empty graph")]
    EmptyGraph,
}

pub type Result<T> = std::result::Result<T, PathError>;
