//! meshroute Performance Metrics
//! ============================
//!
//! Compares what the fan-out actually cost with what the same calls would
//! have cost issued one region at a time:
//! - **Parallel time**: clock span from the first dispatch to the last settlement
//! - **Sequential time**: sum of every node's reported processing time
//! - **Speedup**: sequential / parallel
//! - **Efficiency**: speedup per region, as a percentage

use crate::region::Region;
use serde::{Deserialize, Serialize};

/// Processing time reported by one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseLatency {
    pub region: Region,
    pub processing_time_ms: u64,
    pub success: bool,
}

/// Parallel-vs-sequential comparison for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub sequential_time_ms: u64,
    pub parallel_time_ms: u64,

    /// 0 when `parallel_time_ms` is 0
    pub speedup_factor: f64,

    /// Percentage
    pub efficiency: f64,

    /// One entry per region, ordered by region
    pub response_latencies: Vec<ResponseLatency>,

    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
}

impl PerformanceMetrics {
    /// Time saved by running in parallel (ms, saturating).
    pub fn time_saved_ms(&self) -> u64 {
        self.sequential_time_ms.saturating_sub(self.parallel_time_ms)
    }
}

/// Derives [`PerformanceMetrics`] from settled RPC outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceMetricsEngine;

impl PerformanceMetricsEngine {
    pub fn new() -> Self {
        Self
    }

    /// Computes the comparison.
    ///
    /// `parallel_time_ms` is the measured fan-out span; the latencies may
    /// arrive in any order and are sorted by region so the result does not
    /// depend on settlement order.
    pub fn calculate(&self, latencies: &[ResponseLatency], parallel_time_ms: u64) -> PerformanceMetrics {
        let mut response_latencies = latencies.to_vec();
        response_latencies.sort_by_key(|l| l.region);

        let sequential_time_ms: u64 = response_latencies.iter().map(|l| l.processing_time_ms).sum();
        let successful_requests = response_latencies.iter().filter(|l| l.success).count();
        let total_requests = response_latencies.len();

        let speedup_factor = if parallel_time_ms == 0 {
            0.0
        } else {
            sequential_time_ms as f64 / parallel_time_ms as f64
        };

        let efficiency = if total_requests == 0 {
            0.0
        } else {
            speedup_factor / total_requests as f64 * 100.0
        };

        PerformanceMetrics {
            sequential_time_ms,
            parallel_time_ms,
            speedup_factor,
            efficiency,
            response_latencies,
            total_requests,
            successful_requests,
            failed_requests: total_requests - successful_requests,
        }
    }
}
