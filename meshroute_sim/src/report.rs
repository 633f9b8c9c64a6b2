//! JSON run report.
//!
//! Snapshots a finished (or failed) run together with the configuration
//! that produced it, for archiving and offline comparison.

use crate::coordinator::CoordinatorConfig;
use crate::state::{LogEntry, Phase, SimulationState};
use meshroute_core::{
    PerformanceMetrics, Region, RegionNode, RegionNodeAnalytics, RouteResult, SystemAnalytics,
    TrafficData,
};
use meshroute_env::RunId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete export of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,

    /// Settings the run was started with
    pub config: CoordinatorConfig,

    pub phase: Phase,
    pub source: Option<String>,
    pub destination: Option<String>,

    /// Clock readings (ms)
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,

    pub nodes: BTreeMap<Region, RegionNode>,
    pub traffic: BTreeMap<Region, TrafficData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,

    pub node_analytics: Vec<RegionNodeAnalytics>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_analytics: Option<SystemAnalytics>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub logs: Vec<LogEntry>,
}

impl RunReport {
    pub fn from_state(config: &CoordinatorConfig, state: &SimulationState) -> Self {
        let config = CoordinatorConfig {
            scenario: state.scenario,
            seed: state.seed,
            ..config.clone()
        };
        Self {
            run_id: state.run_id,
            config,
            phase: state.phase,
            source: state.source.clone(),
            destination: state.destination.clone(),
            started_at_ms: state.started_at_ms,
            finished_at_ms: state.finished_at_ms,
            nodes: state.nodes.clone(),
            traffic: state.traffic.clone(),
            metrics: state.metrics.clone(),
            node_analytics: state.node_analytics.clone(),
            system_analytics: state.system_analytics.clone(),
            route: state.route.clone(),
            error: state.error.clone(),
            logs: state.logs.clone(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json_pretty()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
