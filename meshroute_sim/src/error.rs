//! Coordinator errors.

use crate::state::Phase;
use meshroute_core::{Region, RouteError};
use meshroute_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Rejected before anything was dispatched
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("All {} regional nodes failed", regions.len())]
    CatastrophicFailure { regions: Vec<Region> },

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("Illegal phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] EnvError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
