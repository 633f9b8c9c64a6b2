//! Simulated RPC fan-out to the regional nodes.
//!
//! ```text
//! Coordinator                 Scheduler                      Node (region)
//!     |-- dispatch(regions) ---->|                                 |
//!     |                          |<-- handle(request) -> response -|
//!     |                          |  progress 25/50/75% ...         |
//!     |<-- Settled(response) ----|  after processing_time          |
//! ```
//!
//! A node's outcome (delay, failure, traffic data) is fixed at dispatch by
//! its [`RegionEndpoint`]; the scheduler makes it arrive after the
//! simulated processing time.

use meshroute_core::{Region, Scenario, TrafficData, TrafficDataGenerator};
use meshroute_env::{mix_seed, CompletionScheduler, RunId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Sender name on every request.
pub const COORDINATOR_ID: &str = "coordinator";

/// Salt separating the RPC stream from the traffic stream of a region.
const RPC_STREAM: u64 = 0x7270_6373;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcMessageType {
    TrafficRequest,
    TrafficResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcPayload {
    pub scenario: Scenario,
    pub seed: Option<u64>,
}

/// Request sent to one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: Uuid,
    pub from: String,
    pub to: Region,
    #[serde(rename = "type")]
    pub message_type: RpcMessageType,
    pub payload: RpcPayload,

    /// Clock reading at dispatch (ms)
    pub timestamp_ms: u64,
}

impl RpcRequest {
    pub fn traffic(to: Region, scenario: Scenario, seed: Option<u64>, timestamp_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: COORDINATOR_ID.to_string(),
            to,
            message_type: RpcMessageType::TrafficRequest,
            payload: RpcPayload { scenario, seed },
            timestamp_ms,
        }
    }
}

/// Outcome reported by one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub request_id: Uuid,
    pub region: Region,
    #[serde(rename = "type")]
    pub message_type: RpcMessageType,
    pub success: bool,
    pub data: Option<TrafficData>,
    pub error: Option<String>,

    /// Simulated processing time, reported for failures too
    pub processing_time_ms: u64,
}

impl RpcResponse {
    pub fn ok(request: &RpcRequest, data: TrafficData, processing_time_ms: u64) -> Self {
        Self {
            request_id: request.id,
            region: request.to,
            message_type: RpcMessageType::TrafficResponse,
            success: true,
            data: Some(data),
            error: None,
            processing_time_ms,
        }
    }

    pub fn failed(request: &RpcRequest, error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            request_id: request.id,
            region: request.to,
            message_type: RpcMessageType::TrafficResponse,
            success: false,
            data: None,
            error: Some(error.into()),
            processing_time_ms,
        }
    }
}

/// Behaviour of a regional node.
///
/// Implementations compute the whole outcome synchronously; the delay in
/// `processing_time_ms` is realised by the scheduler.
pub trait RegionEndpoint: Send + Sync {
    fn handle(&self, request: &RpcRequest) -> RpcResponse;
}

/// Default node: scenario-dependent latency and fault injection around the
/// traffic generator.
///
/// ```text
/// delay = clamp(latency_mean + z * latency_std, latency_min, latency_max)
/// fail  ~ Bernoulli(failure_probability)
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulatedRegionEndpoint {
    generator: TrafficDataGenerator,
}

impl SimulatedRegionEndpoint {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegionEndpoint for SimulatedRegionEndpoint {
    fn handle(&self, request: &RpcRequest) -> RpcResponse {
        let region = request.to;
        let RpcPayload { scenario, seed } = request.payload;
        let profile = scenario.profile();

        let stream = match seed {
            Some(seed) => mix_seed(mix_seed(seed, region.tag()), scenario.tag() ^ RPC_STREAM),
            None => rand::random(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(stream);

        let z: f64 = rng.sample(StandardNormal);
        let delay = (profile.latency_mean_ms + z * profile.latency_std_ms)
            .round()
            .clamp(profile.latency_min_ms as f64, profile.latency_max_ms as f64) as u64;

        if rng.gen_bool(profile.failure_probability) {
            return RpcResponse::failed(
                request,
                format!("{} node unavailable (simulated fault)", region.label()),
                delay,
            );
        }

        let data = self.generator.generate(region, scenario, seed, delay);
        RpcResponse::ok(request, data, delay)
    }
}

/// What a scheduled item means to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcEvent {
    Progress { region: Region, percent: u8 },
    Settled(RpcResponse),
}

/// Scheduled item tagged with the run that dispatched it.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcEnvelope {
    pub run_id: RunId,
    pub event: RpcEvent,
}

/// Offset at which a call `percent` done reports progress.
fn checkpoint_offset(delay: Duration, percent: u8) -> Duration {
    let percent = u32::from(percent);
    match delay.checked_mul(percent) {
        Some(scaled) => scaled / 100,
        None => delay / 100 * percent,
    }
}

/// Fans requests out through a scheduler.
#[derive(Clone)]
pub struct RpcSimulationLayer {
    endpoint: Arc<dyn RegionEndpoint>,
    checkpoints: Vec<u8>,
}

impl RpcSimulationLayer {
    pub fn new(endpoint: Arc<dyn RegionEndpoint>) -> Self {
        Self {
            endpoint,
            checkpoints: vec![25, 50, 75],
        }
    }

    /// Percentages (exclusive of 0 and 100) at which progress is reported.
    pub fn with_checkpoints(mut self, checkpoints: Vec<u8>) -> Self {
        self.checkpoints = checkpoints.into_iter().filter(|p| (1..100).contains(p)).collect();
        self.checkpoints.sort_unstable();
        self.checkpoints.dedup();
        self
    }

    /// Issues one request per region without waiting on any of them.
    pub fn dispatch<S>(
        &self,
        scheduler: &mut S,
        run_id: RunId,
        regions: &[Region],
        scenario: Scenario,
        seed: Option<u64>,
    ) -> Vec<RpcRequest>
    where
        S: CompletionScheduler<RpcEnvelope> + ?Sized,
    {
        let timestamp_ms = scheduler.now().as_millis() as u64;

        regions
            .iter()
            .map(|&region| {
                let request = RpcRequest::traffic(region, scenario, seed, timestamp_ms);
                let response = self.endpoint.handle(&request);
                let delay = Duration::from_millis(response.processing_time_ms);
                debug!(
                    %run_id,
                    region = %region,
                    request = %request.id,
                    delay_ms = response.processing_time_ms,
                    "Dispatched traffic request"
                );

                for &percent in &self.checkpoints {
                    scheduler.schedule(
                        checkpoint_offset(delay, percent),
                        RpcEnvelope {
                            run_id,
                            event: RpcEvent::Progress { region, percent },
                        },
                    );
                }
                scheduler.schedule(
                    delay,
                    RpcEnvelope {
                        run_id,
                        event: RpcEvent::Settled(response),
                    },
                );

                request
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use crate::scheduler::VirtualScheduler;

    fn handle(region: Region, scenario: Scenario, seed: Option<u64>) -> RpcResponse {
        let request = RpcRequest::traffic(region, scenario, seed, 0);
        SimulatedRegionEndpoint::new().handle(&request)
    }

    #[test]
    fn test_request_shape() {
        let request = RpcRequest::traffic(Region::East, Scenario::Rush, Some(9), 120);
        assert_eq!(request.from, "coordinator");
        assert_eq!(request.to, Region::East);
        assert_eq!(request.message_type, RpcMessageType::TrafficRequest);
        assert_eq!(request.payload.seed, Some(9));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "TRAFFIC_REQUEST");
        assert_eq!(json["to"], "east");
    }

    #[test]
    fn test_delay_within_bounds() {
        for scenario in Scenario::all() {
            let profile = scenario.profile();
            for seed in 0..50 {
                for region in Region::all() {
                    let response = handle(region, scenario, Some(seed));
                    assert!(response.processing_time_ms >= profile.latency_min_ms);
                    assert!(response.processing_time_ms <= profile.latency_max_ms);
                    assert_eq!(response.success, response.data.is_some());
                    assert_eq!(response.success, response.error.is_none());
                }
            }
        }
    }

    #[test]
    fn test_seeded_outcome_is_reproducible() {
        for region in Region::all() {
            let a = handle(region, Scenario::Accident, Some(42));
            let b = handle(region, Scenario::Accident, Some(42));
            assert_eq!(a.success, b.success);
            assert_eq!(a.processing_time_ms, b.processing_time_ms);
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn test_accident_fails_more_than_light() {
        let failures = |scenario: Scenario| {
            (0..200u64)
                .flat_map(|seed| Region::all().into_iter().map(move |r| (seed, r)))
                .filter(|&(seed, region)| !handle(region, scenario, Some(seed)).success)
                .count()
        };
        assert!(failures(Scenario::Accident) > failures(Scenario::Light) * 3);
    }

    #[test]
    fn test_data_timestamp_is_processing_time() {
        let response = (0..20)
            .map(|seed| handle(Region::South, Scenario::Light, Some(seed)))
            .find(|r| r.success)
            .unwrap();
        assert_eq!(response.data.unwrap().timestamp_ms, response.processing_time_ms);
    }

    #[tokio::test]
    async fn test_dispatch_schedules_progress_then_settlement() {
        let mut scheduler = VirtualScheduler::new(SimContext::new());
        let layer = RpcSimulationLayer::new(Arc::new(SimulatedRegionEndpoint::new()));
        let run = RunId(1);

        let requests = layer.dispatch(&mut scheduler, run, &Region::ALL, Scenario::Normal, Some(3));
        assert_eq!(requests.len(), 5);
        assert_eq!(scheduler.pending(), 5 * 4);

        let mut settled = Vec::new();
        let mut last_progress = std::collections::HashMap::new();
        while let Some(done) = scheduler.next_before(Duration::from_secs(60)).await.unwrap() {
            assert_eq!(done.item.run_id, run);
            match done.item.event {
                RpcEvent::Progress { region, percent } => {
                    assert!(!settled.contains(&region), "progress after settlement");
                    let previous = last_progress.insert(region, percent).unwrap_or(0);
                    assert!(percent > previous);
                }
                RpcEvent::Settled(response) => {
                    assert_eq!(done.settled_at, Duration::from_millis(response.processing_time_ms));
                    settled.push(response.region);
                }
            }
        }
        assert_eq!(settled.len(), 5);
    }

    #[test]
    fn test_checkpoints_sanitised() {
        let layer = RpcSimulationLayer::new(Arc::new(SimulatedRegionEndpoint::new()))
            .with_checkpoints(vec![0, 90, 10, 100, 90]);
        assert_eq!(layer.checkpoints, vec![10, 90]);
    }

    #[test]
    fn test_checkpoint_offset_never_overflows() {
        assert_eq!(checkpoint_offset(Duration::from_millis(400), 25), Duration::from_millis(100));
        let slowest = Duration::from_millis(u64::MAX);
        let offset = checkpoint_offset(slowest, 75);
        assert!(offset < slowest);
        assert!(offset > checkpoint_offset(slowest, 50));
    }

    #[tokio::test]
    async fn test_dispatch_accepts_unbounded_processing_time() {
        struct Stalled;
        impl RegionEndpoint for Stalled {
            fn handle(&self, request: &RpcRequest) -> RpcResponse {
                RpcResponse::failed(request, "stalled", u64::MAX)
            }
        }

        let mut scheduler = VirtualScheduler::new(SimContext::new());
        let layer = RpcSimulationLayer::new(Arc::new(Stalled));
        layer.dispatch(&mut scheduler, RunId(1), &[Region::East], Scenario::Rush, None);
        assert_eq!(scheduler.pending(), 4);

        let next = scheduler.next_before(Duration::from_secs(10)).await.unwrap();
        assert!(next.is_none());
        assert_eq!(scheduler.now(), Duration::from_secs(10));
    }
}
