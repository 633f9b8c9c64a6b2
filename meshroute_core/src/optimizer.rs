//! Shortest path over the refined graph.
//!
//! Costs are quantised to micro-units so that equal-cost paths compare
//! exactly; ties are then broken by the lexicographically smaller sequence
//! of location ids. Graph nodes are sorted by id, so comparing index
//! sequences is the same as comparing id sequences.

use crate::catalog::Location;
use crate::error::RouteError;
use crate::graph::Graph;
use crate::region::{CongestionLevel, Region};
use crate::traffic::{TrafficData, FREE_FLOW_SPEED_KMH};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

const COST_SCALE: f64 = 1_000_000.0;

/// The chosen route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub path: Vec<Location>,
    pub path_ids: Vec<String>,

    /// km
    pub total_distance: f64,

    /// minutes
    pub estimated_time: f64,

    /// Distance-weighted harmonic mean speed along the path (km/h)
    pub average_speed: f64,

    /// Worst congestion band among traversed regions
    pub congestion_level: CongestionLevel,

    /// Regions traversed, in order of first appearance
    pub affected_regions: Vec<Region>,
}

#[derive(Eq, PartialEq)]
struct Candidate {
    cost: u64,
    path: Vec<usize>,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Candidate) -> Ordering {
        // Min-heap on (cost, path)
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.path.cmp(&other.path))
            .reverse()
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Candidate) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra over `dynamic_weight`.
#[derive(Debug, Clone)]
pub struct DijkstraRouteOptimizer {
    /// Speed assumed for regions without traffic data (km/h)
    pub free_flow_speed: f64,
}

impl Default for DijkstraRouteOptimizer {
    fn default() -> Self {
        Self {
            free_flow_speed: FREE_FLOW_SPEED_KMH,
        }
    }
}

impl DijkstraRouteOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the cheapest route from `source` to `destination`.
    pub fn optimize(
        &self,
        graph: &Graph,
        source: &str,
        destination: &str,
        traffic: &BTreeMap<Region, TrafficData>,
    ) -> Result<RouteResult, RouteError> {
        let no_path = || RouteError::NoPath {
            from: source.to_string(),
            to: destination.to_string(),
        };

        let start = graph
            .node_index(source)
            .ok_or_else(|| RouteError::UnknownLocation(source.to_string()))?;
        let target = graph.node_index(destination).ok_or_else(no_path)?;

        let path = Self::search(graph, start, target).ok_or_else(no_path)?;
        Ok(self.summarize(graph, &path, traffic))
    }

    /// Lazy Dijkstra: the first time a node is popped, its (cost, path)
    /// label is minimal, because extending two paths by the same edge
    /// preserves their order.
    fn search(graph: &Graph, start: usize, target: usize) -> Option<Vec<usize>> {
        let mut settled = vec![false; graph.nodes().len()];
        let mut heap = BinaryHeap::new();
        heap.push(Candidate {
            cost: 0,
            path: vec![start],
        });

        while let Some(Candidate { cost, path }) = heap.pop() {
            let Some(&index) = path.last() else {
                continue;
            };
            if settled[index] {
                continue;
            }
            settled[index] = true;

            if index == target {
                return Some(path);
            }

            for edge in graph.outgoing(index) {
                let Some(next) = graph.node_index(&edge.to) else {
                    continue;
                };
                if settled[next] {
                    continue;
                }
                let step = ((edge.dynamic_weight * COST_SCALE).round() as u64).max(1);
                let mut extended = path.clone();
                extended.push(next);
                heap.push(Candidate {
                    cost: cost + step,
                    path: extended,
                });
            }
        }

        None
    }

    fn summarize(
        &self,
        graph: &Graph,
        path: &[usize],
        traffic: &BTreeMap<Region, TrafficData>,
    ) -> RouteResult {
        let mut total_distance = 0.0;
        let mut hours = 0.0;
        let mut congestion_level = CongestionLevel::Low;
        let mut affected_regions: Vec<Region> = Vec::new();

        for pair in path.windows(2) {
            let Some(edge) = graph.edge_between(pair[0], pair[1]) else {
                continue;
            };
            let data = traffic.get(&edge.region);
            let speed = data
                .map(|d| d.average_speed)
                .filter(|s| *s > 0.0)
                .unwrap_or(self.free_flow_speed);

            total_distance += edge.base_weight;
            hours += edge.base_weight / speed;

            if let Some(data) = data {
                congestion_level = congestion_level.max(data.congestion_level());
            }
            if !affected_regions.contains(&edge.region) {
                affected_regions.push(edge.region);
            }
        }

        let average_speed = if hours > 0.0 {
            total_distance / hours
        } else {
            self.free_flow_speed
        };

        let locations: Vec<Location> = path.iter().map(|&i| graph.node(i).clone()).collect();
        RouteResult {
            path_ids: locations.iter().map(|l| l.id.clone()).collect(),
            path: locations,
            total_distance,
            estimated_time: hours * 60.0,
            average_speed,
            congestion_level,
            affected_regions,
        }
    }
}
