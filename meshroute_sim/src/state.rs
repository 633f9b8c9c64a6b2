//! Run lifecycle phases and the per-run simulation state.

use meshroute_core::{
    PerformanceMetrics, Region, RegionNode, RegionNodeAnalytics, RouteResult, Scenario,
    SystemAnalytics, TrafficData,
};
use meshroute_env::RunId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coordinator lifecycle stage.
///
/// ```text
/// idle -> requesting -> processing -> aggregating -> optimizing -> complete
///            |              |                            |
///            +--------------+-----------> error <--------+
/// ```
///
/// Any phase may go back to `idle` through a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Requesting,
    Processing,
    Aggregating,
    Optimizing,
    Complete,
    Error,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Requesting => "requesting",
            Phase::Processing => "processing",
            Phase::Aggregating => "aggregating",
            Phase::Optimizing => "optimizing",
            Phase::Complete => "complete",
            Phase::Error => "error",
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (*self, next),
            (_, Idle)
                | (Idle, Requesting)
                | (Requesting, Processing)
                | (Processing, Aggregating)
                | (Aggregating, Optimizing)
                | (Optimizing, Complete)
                | (Requesting, Error)
                | (Processing, Error)
                | (Optimizing, Error)
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

/// One run-visible log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the run's log (0-based)
    pub seq: u64,
    pub run_id: RunId,

    /// Clock reading at emission (ms)
    pub at_ms: u64,

    pub level: LogLevel,

    /// `coordinator` or a region name
    pub source: String,

    pub message: String,
}

/// Everything one run produced; owned by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub run_id: RunId,
    pub phase: Phase,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub scenario: Scenario,
    pub seed: Option<u64>,
    pub is_running: bool,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,

    pub nodes: BTreeMap<Region, RegionNode>,
    pub traffic: BTreeMap<Region, TrafficData>,
    pub metrics: Option<PerformanceMetrics>,
    pub node_analytics: Vec<RegionNodeAnalytics>,
    pub system_analytics: Option<SystemAnalytics>,
    pub route: Option<RouteResult>,

    pub logs: Vec<LogEntry>,
    pub error: Option<String>,
}

impl SimulationState {
    /// Empty state with one idle node per region.
    pub fn idle(scenario: Scenario, seed: Option<u64>) -> Self {
        Self {
            run_id: RunId::NONE,
            phase: Phase::Idle,
            source: None,
            destination: None,
            scenario,
            seed,
            is_running: false,
            started_at_ms: None,
            finished_at_ms: None,
            nodes: Region::ALL.iter().map(|&r| (r, RegionNode::idle(r))).collect(),
            traffic: BTreeMap::new(),
            metrics: None,
            node_analytics: Vec::new(),
            system_analytics: None,
            route: None,
            logs: Vec::new(),
            error: None,
        }
    }

    pub fn logs_at(&self, level: LogLevel) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter().filter(move |e| e.level == level)
    }
}
