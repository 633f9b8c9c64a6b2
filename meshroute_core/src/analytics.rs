//! Per-node telemetry and system-wide roll-up.

use crate::error::RouteError;
use crate::region::{NodeStatus, Region};
use crate::traffic::TrafficData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Telemetry for one node within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionNodeAnalytics {
    pub region: Region,
    pub status: NodeStatus,
    pub latency_ms: Option<u64>,

    /// Road segments processed per second
    pub throughput: f64,

    pub failed: bool,

    /// Always 0: calls are never retried automatically
    pub retries: u32,

    /// Present only when the node returned data
    pub congestion_score: Option<f64>,
    pub average_speed: Option<f64>,
}

impl RegionNodeAnalytics {
    fn idle(region: Region) -> Self {
        Self {
            region,
            status: NodeStatus::Idle,
            latency_ms: None,
            throughput: 0.0,
            failed: false,
            retries: 0,
            congestion_score: None,
            average_speed: None,
        }
    }
}

/// Node tallies at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeCounts {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub processing: usize,
}

/// System-wide aggregates, available once every node is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAnalytics {
    pub nodes_total: usize,
    pub nodes_completed: usize,
    pub nodes_failed: usize,
    pub nodes_processing: usize,

    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,

    /// Sum of node throughputs (segments/s)
    pub total_throughput: f64,

    /// Over successful nodes only; `None` if none succeeded
    pub peak_congestion: Option<f64>,
    pub avg_congestion: Option<f64>,

    /// Percentage of nodes that returned data
    pub success_rate: f64,
}

/// Collects node telemetry as RPCs settle.
#[derive(Debug, Clone)]
pub struct AnalyticsAggregator {
    nodes: BTreeMap<Region, RegionNodeAnalytics>,
}

impl AnalyticsAggregator {
    /// One idle record per region.
    pub fn new(regions: &[Region]) -> Self {
        Self {
            nodes: regions
                .iter()
                .map(|&r| (r, RegionNodeAnalytics::idle(r)))
                .collect(),
        }
    }

    pub fn mark_processing(&mut self, region: Region) {
        if let Some(node) = self.nodes.get_mut(&region) {
            node.status = NodeStatus::Processing;
        }
    }

    pub fn record_success(&mut self, region: Region, latency_ms: u64, data: &TrafficData) {
        if let Some(node) = self.nodes.get_mut(&region) {
            node.status = NodeStatus::Success;
            node.latency_ms = Some(latency_ms);
            node.failed = false;
            node.throughput = if latency_ms > 0 {
                data.roads.len() as f64 / (latency_ms as f64 / 1000.0)
            } else {
                0.0
            };
            node.congestion_score = Some(data.congestion_score);
            node.average_speed = Some(data.average_speed);
        }
    }

    pub fn record_failure(&mut self, region: Region, latency_ms: u64) {
        if let Some(node) = self.nodes.get_mut(&region) {
            node.status = NodeStatus::Failed;
            node.latency_ms = Some(latency_ms);
            node.failed = true;
            node.throughput = 0.0;
        }
    }

    pub fn node(&self, region: Region) -> Option<&RegionNodeAnalytics> {
        self.nodes.get(&region)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RegionNodeAnalytics> {
        self.nodes.values()
    }

    /// Current tallies; `completed + failed + processing <= total` always.
    pub fn counts(&self) -> NodeCounts {
        let mut counts = NodeCounts {
            total: self.nodes.len(),
            ..Default::default()
        };
        for node in self.nodes.values() {
            match node.status {
                NodeStatus::Success => counts.completed += 1,
                NodeStatus::Failed => counts.failed += 1,
                NodeStatus::Processing => counts.processing += 1,
                NodeStatus::Idle => {}
            }
        }
        counts
    }

    pub fn is_complete(&self) -> bool {
        self.nodes.values().all(|n| n.status.is_terminal())
    }

    /// Rolls the node records up.
    ///
    /// Fails while any node is not yet terminal.
    pub fn finalize(&self) -> Result<SystemAnalytics, RouteError> {
        let counts = self.counts();
        let pending = counts.total - counts.completed - counts.failed;
        if pending > 0 {
            return Err(RouteError::AnalyticsIncomplete { pending });
        }

        let latencies: Vec<u64> = self.nodes.values().filter_map(|n| n.latency_ms).collect();
        let congestion: Vec<f64> = self
            .nodes
            .values()
            .filter(|n| n.status == NodeStatus::Success)
            .filter_map(|n| n.congestion_score)
            .collect();

        let avg_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };

        let (peak_congestion, avg_congestion) = if congestion.is_empty() {
            (None, None)
        } else {
            (
                Some(congestion.iter().cloned().fold(f64::MIN, f64::max)),
                Some(congestion.iter().sum::<f64>() / congestion.len() as f64),
            )
        };

        Ok(SystemAnalytics {
            nodes_total: counts.total,
            nodes_completed: counts.completed,
            nodes_failed: counts.failed,
            nodes_processing: counts.processing,
            avg_latency_ms,
            min_latency_ms: latencies.iter().copied().min().unwrap_or(0),
            max_latency_ms: latencies.iter().copied().max().unwrap_or(0),
            total_throughput: self.nodes.values().map(|n| n.throughput).sum(),
            peak_congestion,
            avg_congestion,
            success_rate: if counts.total == 0 {
                0.0
            } else {
                counts.completed as f64 / counts.total as f64 * 100.0
            },
        })
    }
}
