//! Errors raised by the routing domain.

use thiserror::Error;

/// Errors from the catalog, graph, optimizer and analytics layers.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A location id is not part of the catalog
    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    /// Two catalog entries share an id
    #[error("Duplicate location id: {0}")]
    DuplicateLocation(String),

    /// A road references missing locations, loops, or repeats another road
    #[error("Invalid road {from} -> {to}: {reason}")]
    InvalidRoad {
        from: String,
        to: String,
        reason: String,
    },

    /// Source and destination are disconnected in the constructed graph
    #[error("No path from {from} to {to}")]
    NoPath { from: String, to: String },

    /// System analytics requested while nodes are still outstanding
    #[error("Analytics incomplete: {pending} node(s) not yet terminal")]
    AnalyticsIncomplete { pending: usize },

    /// Catalog JSON could not be parsed
    #[error("Catalog parse error: {0}")]
    CatalogParse(#[from] serde_json::Error),
}

impl RouteError {
    /// Creates an invalid-road error.
    pub fn invalid_road(from: &str, to: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRoad {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }
}
