//! Congestion-aware road graph.
//!
//! The graph is built in two steps:
//! 1. [`GraphBuilder::build`] keeps the part of the catalog reachable from
//!    the source and prices every edge by distance (`base_weight`).
//! 2. [`Graph::apply_traffic`] folds regional conditions into
//!    `dynamic_weight`:
//!
//! ```text
//! dynamic = base * delay_factor(region) + congestion_delay(score(region))
//! ```
//!
//! Both terms are non-negative and the factor is at least 1, so
//! `dynamic_weight >= base_weight` always holds.

use crate::catalog::{Location, LocationCatalog};
use crate::error::RouteError;
use crate::region::Region;
use crate::traffic::TrafficData;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Extra cost (km-equivalent) per congestion point.
pub const CONGESTION_DELAY_PER_POINT: f64 = 0.5;

/// Additive congestion penalty; monotonically increasing in `score`.
pub fn congestion_delay(score: f64) -> f64 {
    score.clamp(0.0, 100.0) * CONGESTION_DELAY_PER_POINT
}

/// A directed edge of the routing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEdge {
    pub from: String,
    pub to: String,

    /// Region whose traffic prices this edge
    pub region: Region,

    /// Static road length (km)
    pub base_weight: f64,

    /// Cost after folding in traffic
    pub dynamic_weight: f64,
}

/// Routing graph: nodes sorted by id, directed edges with adjacency lists.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Location>,
    edges: Vec<RouteEdge>,
    outgoing: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn nodes(&self) -> &[Location] {
        &self.nodes
    }

    pub fn edges(&self) -> &[RouteEdge] {
        &self.edges
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, index: usize) -> &Location {
        &self.nodes[index]
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Edges leaving the node at `index`.
    pub fn outgoing(&self, index: usize) -> impl Iterator<Item = &RouteEdge> {
        self.outgoing[index].iter().map(move |&e| &self.edges[e])
    }

    /// Edge from `from` to `to`, if any.
    pub fn edge_between(&self, from: usize, to: usize) -> Option<&RouteEdge> {
        let target = &self.nodes[to].id;
        self.outgoing(from).find(|edge| &edge.to == target)
    }

    /// Recomputes every `dynamic_weight` from regional conditions.
    ///
    /// Edges whose region has no data keep their base weight.
    pub fn apply_traffic(&mut self, traffic: &BTreeMap<Region, TrafficData>) {
        for edge in &mut self.edges {
            edge.dynamic_weight = match traffic.get(&edge.region) {
                Some(data) => {
                    let factor = data.delay_factor.max(1.0);
                    edge.base_weight * factor + congestion_delay(data.congestion_score)
                }
                None => edge.base_weight,
            };
        }
    }
}

/// Builds [`Graph`]s from a catalog.
pub struct GraphBuilder<'a> {
    catalog: &'a LocationCatalog,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(catalog: &'a LocationCatalog) -> Self {
        Self { catalog }
    }

    /// Builds the graph of locations reachable from `source`.
    ///
    /// `destination` must exist in the catalog but need not be reachable;
    /// a disconnected destination is reported by the optimizer.
    pub fn build(&self, source: &str, destination: &str) -> Result<Graph, RouteError> {
        for id in [source, destination] {
            if !self.catalog.contains(id) {
                return Err(RouteError::UnknownLocation(id.to_string()));
            }
        }

        let mut neighbours: HashMap<&str, Vec<&str>> = HashMap::new();
        for road in self.catalog.roads() {
            neighbours.entry(road.from.as_str()).or_default().push(road.to.as_str());
            neighbours.entry(road.to.as_str()).or_default().push(road.from.as_str());
        }

        // Breadth-first reachability from the source
        let mut reachable = std::collections::HashSet::new();
        let mut queue = VecDeque::from([source]);
        reachable.insert(source);
        while let Some(current) = queue.pop_front() {
            for &next in neighbours.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                if reachable.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        // Catalog locations are already sorted by id
        let nodes: Vec<Location> = self
            .catalog
            .locations()
            .iter()
            .filter(|loc| reachable.contains(loc.id.as_str()))
            .cloned()
            .collect();
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, loc)| (loc.id.clone(), i))
            .collect();

        let mut edges = Vec::new();
        let mut outgoing = vec![Vec::new(); nodes.len()];
        for road in self.catalog.roads() {
            let (Some(&a), Some(&b)) = (index.get(&road.from), index.get(&road.to)) else {
                continue;
            };
            let region = nodes[a].region;
            let length = self.catalog.road_length(road);

            for (from, to) in [(a, b), (b, a)] {
                outgoing[from].push(edges.len());
                edges.push(RouteEdge {
                    from: nodes[from].id.clone(),
                    to: nodes[to].id.clone(),
                    region,
                    base_weight: length,
                    dynamic_weight: length,
                });
            }
        }

        Ok(Graph {
            nodes,
            edges,
            outgoing,
            index,
        })
    }
}
