//! Regions, traffic scenarios and per-node runtime records.

use serde::{Deserialize, Serialize};

/// A regional worker node. The set is closed and fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    North,
    South,
    East,
    West,
    Central,
}

impl Region {
    /// Every region, in dispatch order.
    pub const ALL: [Region; 5] = [
        Region::North,
        Region::South,
        Region::East,
        Region::West,
        Region::Central,
    ];

    /// Returns a list of all regions.
    pub fn all() -> Vec<Region> {
        Self::ALL.to_vec()
    }

    /// Returns the region identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Region::North => "north",
            Region::South => "south",
            Region::East => "east",
            Region::West => "west",
            Region::Central => "central",
        }
    }

    /// Returns a human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Region::North => "North Zone",
            Region::South => "South Zone",
            Region::East => "East Zone",
            Region::West => "West Zone",
            Region::Central => "Central Zone",
        }
    }

    /// Stable numeric tag used when deriving per-region seeds.
    pub fn tag(&self) -> u64 {
        match self {
            Region::North => 1,
            Region::South => 2,
            Region::East => 3,
            Region::West => 4,
            Region::Central => 5,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "north" => Ok(Region::North),
            "south" => Ok(Region::South),
            "east" => Ok(Region::East),
            "west" => Ok(Region::West),
            "central" => Ok(Region::Central),
            _ => Err(format!("Unknown region: {}", s)),
        }
    }
}

/// Named traffic-intensity profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Off-peak, free-flowing roads
    Light,

    /// Typical weekday traffic
    #[default]
    Normal,

    /// Peak commute hours
    Rush,

    /// Incidents blocking lanes, nodes overloaded
    Accident,
}

/// Numeric knobs behind a scenario.
///
/// Congestion figures are in score points (0-100); latency figures in
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioProfile {
    /// Mean segment congestion score
    pub congestion_mean: f64,

    /// Standard deviation of segment congestion score
    pub congestion_spread: f64,

    /// Mean simulated processing delay of a node
    pub latency_mean_ms: f64,

    /// Standard deviation of the processing delay
    pub latency_std_ms: f64,

    /// Lower bound of the processing delay
    pub latency_min_ms: u64,

    /// Upper bound of the processing delay
    pub latency_max_ms: u64,

    /// Probability that a node call fails
    pub failure_probability: f64,
}

impl Scenario {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<Scenario> {
        vec![
            Scenario::Light,
            Scenario::Normal,
            Scenario::Rush,
            Scenario::Accident,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Light => "light",
            Scenario::Normal => "normal",
            Scenario::Rush => "rush",
            Scenario::Accident => "accident",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Light => "Off-peak traffic, fast and reliable nodes",
            Scenario::Normal => "Typical weekday traffic with occasional node hiccups",
            Scenario::Rush => "Peak commute: heavy congestion, slower nodes",
            Scenario::Accident => "Incidents across zones: severe congestion, frequent node failures",
        }
    }

    /// Stable numeric tag used when deriving per-scenario seeds.
    pub fn tag(&self) -> u64 {
        match self {
            Scenario::Light => 11,
            Scenario::Normal => 13,
            Scenario::Rush => 17,
            Scenario::Accident => 19,
        }
    }

    /// Returns the statistical profile for this scenario.
    pub fn profile(&self) -> ScenarioProfile {
        match self {
            Scenario::Light => ScenarioProfile {
                congestion_mean: 15.0,
                congestion_spread: 8.0,
                latency_mean_ms: 400.0,
                latency_std_ms: 100.0,
                latency_min_ms: 150,
                latency_max_ms: 800,
                failure_probability: 0.02,
            },
            Scenario::Normal => ScenarioProfile {
                congestion_mean: 35.0,
                congestion_spread: 10.0,
                latency_mean_ms: 600.0,
                latency_std_ms: 150.0,
                latency_min_ms: 200,
                latency_max_ms: 1200,
                failure_probability: 0.05,
            },
            Scenario::Rush => ScenarioProfile {
                congestion_mean: 62.0,
                congestion_spread: 12.0,
                latency_mean_ms: 1000.0,
                latency_std_ms: 300.0,
                latency_min_ms: 300,
                latency_max_ms: 2200,
                failure_probability: 0.10,
            },
            Scenario::Accident => ScenarioProfile {
                congestion_mean: 78.0,
                congestion_spread: 12.0,
                latency_mean_ms: 1200.0,
                latency_std_ms: 400.0,
                latency_min_ms: 400,
                latency_max_ms: 2800,
                failure_probability: 0.25,
            },
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" | "off_peak" | "offpeak" => Ok(Scenario::Light),
            "normal" | "default" => Ok(Scenario::Normal),
            "rush" | "rush_hour" | "rushhour" | "rush-hour" => Ok(Scenario::Rush),
            "accident" | "incident" => Ok(Scenario::Accident),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

/// Discrete congestion band derived from a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    #[default]
    Low,
    Medium,
    High,
    Severe,
}

impl CongestionLevel {
    /// Maps a score onto the fixed thresholds `<25`, `<50`, `<75`, `>=75`.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            CongestionLevel::Low
        } else if score < 50.0 {
            CongestionLevel::Medium
        } else if score < 75.0 {
            CongestionLevel::High
        } else {
            CongestionLevel::Severe
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CongestionLevel::Low => "low",
            CongestionLevel::Medium => "medium",
            CongestionLevel::High => "high",
            CongestionLevel::Severe => "severe",
        }
    }
}

impl std::fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lifecycle of one node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Failed,
}

impl NodeStatus {
    /// True once the node has settled, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Processing => "processing",
            NodeStatus::Success => "success",
            NodeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runtime record of one regional node during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionNode {
    pub id: Region,
    pub status: NodeStatus,

    /// Share of road capacity in use (0-100)
    pub traffic_load: f64,

    /// Simulated processing time of the node's call
    pub processing_time_ms: Option<u64>,

    /// 0-100
    pub congestion_score: f64,

    /// km/h
    pub average_speed: f64,

    /// >= 1
    pub delay_factor: f64,

    /// Clock reading (ms) of the last mutation
    pub last_updated_ms: Option<u64>,
}

impl RegionNode {
    /// A fresh, idle node.
    pub fn idle(id: Region) -> Self {
        Self {
            id,
            status: NodeStatus::Idle,
            traffic_load: 0.0,
            processing_time_ms: None,
            congestion_score: 0.0,
            average_speed: 0.0,
            delay_factor: 1.0,
            last_updated_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_congestion_thresholds() {
        assert_eq!(CongestionLevel::from_score(0.0), CongestionLevel::Low);
        assert_eq!(CongestionLevel::from_score(24.99), CongestionLevel::Low);
        assert_eq!(CongestionLevel::from_score(25.0), CongestionLevel::Medium);
        assert_eq!(CongestionLevel::from_score(49.9), CongestionLevel::Medium);
        assert_eq!(CongestionLevel::from_score(50.0), CongestionLevel::High);
        assert_eq!(CongestionLevel::from_score(74.9), CongestionLevel::High);
        assert_eq!(CongestionLevel::from_score(75.0), CongestionLevel::Severe);
        assert_eq!(CongestionLevel::from_score(100.0), CongestionLevel::Severe);
    }

    #[test]
    fn test_congestion_level_ordering() {
        assert!(CongestionLevel::Severe > CongestionLevel::High);
        assert!(CongestionLevel::High > CongestionLevel::Medium);
        assert!(CongestionLevel::Medium > CongestionLevel::Low);
    }

    #[test]
    fn test_scenario_parsing() {
        assert_eq!("rush_hour".parse::<Scenario>(), Ok(Scenario::Rush));
        assert_eq!("ACCIDENT".parse::<Scenario>(), Ok(Scenario::Accident));
        assert!("gridlock".parse::<Scenario>().is_err());

        for scenario in Scenario::all() {
            assert_eq!(scenario.name().parse::<Scenario>(), Ok(scenario));
        }
    }

    #[test]
    fn test_scenario_profiles_escalate() {
        let light = Scenario::Light.profile();
        let normal = Scenario::Normal.profile();
        let rush = Scenario::Rush.profile();
        let accident = Scenario::Accident.profile();

        assert!(rush.latency_mean_ms > normal.latency_mean_ms);
        assert!(rush.latency_std_ms > light.latency_std_ms);
        assert!(accident.failure_probability > 4.0 * light.failure_probability);
        assert!(accident.congestion_mean > light.congestion_mean);

        for scenario in Scenario::all() {
            let p = scenario.profile();
            assert!(p.latency_min_ms < p.latency_max_ms);
            assert!((0.0..1.0).contains(&p.failure_probability));
        }
    }

    #[test]
    fn test_region_round_trip_names() {
        for region in Region::all() {
            assert_eq!(region.name().parse::<Region>(), Ok(region));
        }
        assert_eq!(Region::all().len(), 5);
    }

    #[test]
    fn test_node_status_terminal() {
        assert!(!NodeStatus::Idle.is_terminal());
        assert!(!NodeStatus::Processing.is_terminal());
        assert!(NodeStatus::Success.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
    }
}
