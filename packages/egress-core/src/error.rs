//! Error taxonomy shared by every core operation.
//!
//! All variants are request-scoped and recoverable. An operation that returns
//! one of them has not mutated any shared state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Fewer usable anchor observations than the chosen strategy needs
    #[error("need at least {required} usable anchors, got {usable}")]
    InsufficientAnchors { usable: usize, required: usize },

    /// Anchors are collinear or coincident; the least-squares system is singular
    #[error("anchor geometry is degenerate (collinear or coincident anchors)")]
    DegenerateGeometry,

    #[error("no safe path from {from} to {to}")]
    NoPathFound { from: String, to: String },

    #[error("no exit has spare capacity")]
    NoExitAvailable,

    #[error("device {0} has no active session")]
    UnknownDevice(String),

    #[error("unknown node {0}")]
    UnknownNode(String),

    #[error("{a} and {b} are not connected")]
    UnknownSegment { a: String, b: String },

    #[error("invalid building graph: {0}")]
    InvalidGraph(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Error {
    /// True for the failures a localization strategy reports when the
    /// observations cannot support a fix.
    pub fn is_localization_failure(&self) -> bool {
        matches!(self, Self::InsufficientAnchors { .. } | Self::DegenerateGeometry)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
