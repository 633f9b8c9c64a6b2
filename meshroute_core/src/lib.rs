//! meshroute Core - congestion-aware routing over regional worker nodes
//!
//! This library holds the pure, synchronous half of a routing run:
//! 1. **Traffic**: synthetic, seed-reproducible conditions per region
//! 2. **Graph**: catalog roads priced by distance, then by congestion
//! 3. **Route**: Dijkstra with deterministic tie-breaking
//! 4. **Metrics & Analytics**: parallel-vs-sequential comparison and node roll-ups
//!
//! Dispatching the regional calls and owning the run lifecycle lives in
//! `meshroute_sim`.

pub mod analytics;
pub mod catalog;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod optimizer;
pub mod region;
pub mod traffic;

// Re-export key types for convenience
pub use analytics::{AnalyticsAggregator, NodeCounts, RegionNodeAnalytics, SystemAnalytics};
pub use catalog::{Location, LocationCatalog, Road};
pub use error::RouteError;
pub use graph::{congestion_delay, Graph, GraphBuilder, RouteEdge};
pub use metrics::{PerformanceMetrics, PerformanceMetricsEngine, ResponseLatency};
pub use optimizer::{DijkstraRouteOptimizer, RouteResult};
pub use region::{CongestionLevel, NodeStatus, Region, RegionNode, Scenario, ScenarioProfile};
pub use traffic::{RoadSegment, TrafficData, TrafficDataGenerator, FREE_FLOW_SPEED_KMH};
