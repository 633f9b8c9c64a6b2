//! Static catalog of locations and the roads between them.
//!
//! The catalog is owned by the presentation layer in a full deployment;
//! this module ships a built-in network of Indian cities and accepts
//! custom networks as JSON.

use crate::error::RouteError;
use crate::region::Region;
use geo::{point, HaversineDistance};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Highway length over great-circle distance.
pub const ROAD_FACTOR: f64 = 1.2;

/// A routable location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub region: Region,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(id: &str, name: &str, region: Region, lat: f64, lon: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            region,
            lat,
            lon,
        }
    }

    /// Great-circle distance to another location in kilometres.
    pub fn distance_km(&self, other: &Location) -> f64 {
        let a = point!(x: self.lon, y: self.lat);
        let b = point!(x: other.lon, y: other.lat);
        a.haversine_distance(&b) / 1000.0
    }
}

/// An undirected road between two locations.
///
/// The road belongs to the region of its `from` endpoint; that region's
/// traffic conditions price both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub from: String,
    pub to: String,

    /// Explicit length; derived from coordinates when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl Road {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            distance_km: None,
        }
    }

    pub fn with_distance(mut self, km: f64) -> Self {
        self.distance_km = Some(km);
        self
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    locations: Vec<Location>,
    roads: Vec<Road>,
}

/// Locations sorted by id plus the road list.
#[derive(Debug, Clone)]
pub struct LocationCatalog {
    locations: Vec<Location>,
    roads: Vec<Road>,
    index: HashMap<String, usize>,
}

impl LocationCatalog {
    /// Creates a validated catalog.
    pub fn new(locations: Vec<Location>, roads: Vec<Road>) -> Result<Self, RouteError> {
        let catalog = Self::assemble(locations, roads);
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses a catalog from `{"locations": [...], "roads": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, RouteError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.locations, file.roads)
    }

    fn assemble(mut locations: Vec<Location>, roads: Vec<Road>) -> Self {
        locations.sort_by(|a, b| a.id.cmp(&b.id));
        let index = locations
            .iter()
            .enumerate()
            .map(|(i, loc)| (loc.id.clone(), i))
            .collect();
        Self {
            locations,
            roads,
            index,
        }
    }

    /// Checks ids are unique and every road joins two distinct known
    /// locations at most once.
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.index.len() != self.locations.len() {
            let mut seen = HashSet::new();
            for loc in &self.locations {
                if !seen.insert(loc.id.as_str()) {
                    return Err(RouteError::DuplicateLocation(loc.id.clone()));
                }
            }
        }

        let mut seen_roads = HashSet::new();
        for road in &self.roads {
            if !self.contains(&road.from) || !self.contains(&road.to) {
                return Err(RouteError::invalid_road(&road.from, &road.to, "unknown endpoint"));
            }
            if road.from == road.to {
                return Err(RouteError::invalid_road(&road.from, &road.to, "self loop"));
            }
            if let Some(km) = road.distance_km {
                if !(km > 0.0 && km.is_finite()) {
                    return Err(RouteError::invalid_road(&road.from, &road.to, "non-positive length"));
                }
            }
            let key = if road.from < road.to {
                (road.from.as_str(), road.to.as_str())
            } else {
                (road.to.as_str(), road.from.as_str())
            };
            if !seen_roads.insert(key) {
                return Err(RouteError::invalid_road(&road.from, &road.to, "duplicate road"));
            }
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Location> {
        self.index.get(id).map(|&i| &self.locations[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Locations sorted by id.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    /// Length of a road in kilometres.
    ///
    /// Assumes the road has been validated against this catalog.
    pub fn road_length(&self, road: &Road) -> f64 {
        if let Some(km) = road.distance_km {
            return km;
        }
        match (self.get(&road.from), self.get(&road.to)) {
            (Some(a), Some(b)) => a.distance_km(b) * ROAD_FACTOR,
            _ => 0.0,
        }
    }

    /// The built-in network: sixteen cities across the five regions.
    pub fn india() -> Self {
        let locations = vec![
            Location::new("delhi", "Delhi", Region::North, 28.6139, 77.2090),
            Location::new("jaipur", "Jaipur", Region::North, 26.9124, 75.7873),
            Location::new("lucknow", "Lucknow", Region::North, 26.8467, 80.9462),
            Location::new("chandigarh", "Chandigarh", Region::North, 30.7333, 76.7794),
            Location::new("mumbai", "Mumbai", Region::West, 19.0760, 72.8777),
            Location::new("ahmedabad", "Ahmedabad", Region::West, 23.0225, 72.5714),
            Location::new("pune", "Pune", Region::West, 18.5204, 73.8567),
            Location::new("surat", "Surat", Region::West, 21.1702, 72.8311),
            Location::new("bhopal", "Bhopal", Region::Central, 23.2599, 77.4126),
            Location::new("nagpur", "Nagpur", Region::Central, 21.1458, 79.0882),
            Location::new("kolkata", "Kolkata", Region::East, 22.5726, 88.3639),
            Location::new("patna", "Patna", Region::East, 25.5941, 85.1376),
            Location::new("bhubaneswar", "Bhubaneswar", Region::East, 20.2961, 85.8245),
            Location::new("hyderabad", "Hyderabad", Region::South, 17.3850, 78.4867),
            Location::new("bangalore", "Bangalore", Region::South, 12.9716, 77.5946),
            Location::new("chennai", "Chennai", Region::South, 13.0827, 80.2707),
        ];

        let roads = [
            ("delhi", "chandigarh"),
            ("delhi", "jaipur"),
            ("delhi", "lucknow"),
            ("jaipur", "ahmedabad"),
            ("jaipur", "bhopal"),
            ("lucknow", "patna"),
            ("lucknow", "bhopal"),
            ("patna", "kolkata"),
            ("kolkata", "bhubaneswar"),
            ("kolkata", "nagpur"),
            ("bhubaneswar", "hyderabad"),
            ("ahmedabad", "surat"),
            ("ahmedabad", "bhopal"),
            ("surat", "mumbai"),
            ("mumbai", "pune"),
            ("mumbai", "nagpur"),
            ("bhopal", "nagpur"),
            ("nagpur", "hyderabad"),
            ("pune", "hyderabad"),
            ("pune", "bangalore"),
            ("hyderabad", "bangalore"),
            ("hyderabad", "chennai"),
            ("bangalore", "chennai"),
        ]
        .iter()
        .map(|(a, b)| Road::new(a, b))
        .collect();

        Self::assemble(locations, roads)
    }
}

impl Default for LocationCatalog {
    fn default() -> Self {
        Self::india()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = LocationCatalog::india();
        catalog.validate().unwrap();
        assert_eq!(catalog.locations().len(), 16);
        assert!(catalog.contains("delhi"));
        assert!(catalog.contains("mumbai"));

        // Every region hosts at least one location
        for region in Region::all() {
            assert!(catalog.locations().iter().any(|l| l.region == region));
        }
    }

    #[test]
    fn test_locations_sorted_by_id() {
        let catalog = LocationCatalog::india();
        let ids: Vec<&str> = catalog.locations().iter().map(|l| l.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_haversine_length() {
        let catalog = LocationCatalog::india();
        let delhi = catalog.get("delhi").unwrap();
        let jaipur = catalog.get("jaipur").unwrap();

        // Delhi-Jaipur is roughly 235-240 km as the crow flies
        let km = delhi.distance_km(jaipur);
        assert!(km > 220.0 && km < 250.0, "got {km}");

        let road = Road::new("delhi", "jaipur");
        assert_relative_eq!(catalog.road_length(&road), km * ROAD_FACTOR, epsilon = 1e-9);
        assert_relative_eq!(catalog.road_length(&road.with_distance(10.0)), 10.0);
    }

    #[test]
    fn test_rejects_bad_roads() {
        let locations = vec![
            Location::new("a", "A", Region::North, 0.0, 0.0),
            Location::new("b", "B", Region::South, 0.0, 1.0),
        ];

        let unknown = LocationCatalog::new(locations.clone(), vec![Road::new("a", "z")]);
        assert!(matches!(unknown, Err(RouteError::InvalidRoad { .. })));

        let looped = LocationCatalog::new(locations.clone(), vec![Road::new("a", "a")]);
        assert!(matches!(looped, Err(RouteError::InvalidRoad { .. })));

        let duplicate = LocationCatalog::new(
            locations.clone(),
            vec![Road::new("a", "b"), Road::new("b", "a")],
        );
        assert!(matches!(duplicate, Err(RouteError::InvalidRoad { .. })));

        let mut dup_locations = locations;
        dup_locations.push(Location::new("a", "A again", Region::East, 1.0, 1.0));
        let dup = LocationCatalog::new(dup_locations, vec![]);
        assert!(matches!(dup, Err(RouteError::DuplicateLocation(id)) if id == "a"));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "locations": [
                {"id": "x", "name": "X", "region": "west", "lat": 10.0, "lon": 70.0},
                {"id": "y", "name": "Y", "region": "central", "lat": 11.0, "lon": 71.0}
            ],
            "roads": [{"from": "x", "to": "y", "distance_km": 42.0}]
        }"#;

        let catalog = LocationCatalog::from_json(json).unwrap();
        assert_eq!(catalog.get("x").unwrap().region, Region::West);
        assert_relative_eq!(catalog.road_length(&catalog.roads()[0]), 42.0);

        assert!(matches!(
            LocationCatalog::from_json("{not json"),
            Err(RouteError::CatalogParse(_))
        ));
    }
}
