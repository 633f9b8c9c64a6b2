//! Simulation coordinator - owns one run from dispatch to route.
//!
//! ```text
//!  start_simulation ──► requesting ──► processing ──► aggregating ──► optimizing ──► complete
//!                                          │  ▲             │               │
//!                      settle_next() ──────┘  │         metrics +       graph + Dijkstra
//!                      (one item at a time) ──┘         analytics
//! ```
//!
//! Regional calls run concurrently behind a [`CompletionScheduler`], but
//! their settlements are drained here one by one, so every mutation of the
//! run state happens on a single logical thread. Each scheduled item carries
//! the [`RunId`] of the run that dispatched it; anything from an older run is
//! dropped without touching the current state.

use crate::context::SimContext;
use crate::error::SimError;
use crate::observer::{NoopObserver, SimulationObserver};
use crate::rpc::{
    RegionEndpoint, RpcEnvelope, RpcEvent, RpcResponse, RpcSimulationLayer,
    SimulatedRegionEndpoint, COORDINATOR_ID,
};
use crate::scheduler::VirtualScheduler;
use crate::state::{LogEntry, LogLevel, Phase, SimulationState};

use meshroute_core::{
    AnalyticsAggregator, DijkstraRouteOptimizer, GraphBuilder, LocationCatalog, NodeStatus,
    PerformanceMetricsEngine, Region, ResponseLatency, Scenario,
};
use meshroute_env::{Completion, CompletionScheduler, RealtimeScheduler, RunId, TokioContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Run settings. Scenario and seed apply to the next run started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub scenario: Scenario,

    /// `None` draws fresh randomness for every run
    pub seed: Option<u64>,

    /// Upper bound on the processing phase (ms after dispatch)
    pub processing_deadline_ms: u64,

    /// Intermediate progress percentages reported per call
    pub progress_checkpoints: Vec<u8>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::Normal,
            seed: None,
            processing_deadline_ms: 10_000,
            progress_checkpoints: vec![25, 50, 75],
        }
    }
}

impl CoordinatorConfig {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_processing_deadline(mut self, deadline: Duration) -> Self {
        self.processing_deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_progress_checkpoints(mut self, checkpoints: Vec<u8>) -> Self {
        self.progress_checkpoints = checkpoints;
        self
    }

    pub fn processing_deadline(&self) -> Duration {
        Duration::from_millis(self.processing_deadline_ms)
    }
}

/// Coordinator over the deterministic virtual clock.
pub type VirtualCoordinator = Coordinator<VirtualScheduler<RpcEnvelope>>;

/// Coordinator over tokio timers.
pub type RealtimeCoordinator = Coordinator<RealtimeScheduler<TokioContext, RpcEnvelope>>;

/// Drives runs and owns their [`SimulationState`].
pub struct Coordinator<S: CompletionScheduler<RpcEnvelope>> {
    config: CoordinatorConfig,
    catalog: Arc<LocationCatalog>,
    scheduler: S,
    rpc: RpcSimulationLayer,
    observer: Box<dyn SimulationObserver>,
    state: SimulationState,

    /// Last id handed out; never reused
    last_run: RunId,

    analytics: AnalyticsAggregator,
    latencies: Vec<ResponseLatency>,
    dispatched_at: Duration,
    last_settled_at: Duration,
    deadline: Duration,
    stale_settlements: u64,
}

impl VirtualCoordinator {
    /// Coordinator whose clock only moves as settlements are drained.
    pub fn virtual_clock(config: CoordinatorConfig, catalog: Arc<LocationCatalog>) -> Self {
        Self::new(config, catalog, VirtualScheduler::new(SimContext::new()))
    }

    /// Moves the virtual clock forward by `duration`, delivering every item
    /// that falls due on the way.
    ///
    /// While processing, the clock stops at the run's deadline. Returns the
    /// number of items delivered, stale ones included.
    pub fn advance(&mut self, duration: Duration) -> usize {
        let step = if self.state.phase == Phase::Processing {
            duration.min(self.deadline.saturating_sub(self.scheduler.now()))
        } else {
            duration
        };

        let due = self.scheduler.advance(step);
        let delivered = due.len();
        for completion in due {
            self.deliver(completion);
        }
        delivered
    }
}

impl RealtimeCoordinator {
    /// Coordinator whose calls really sleep for their processing time.
    pub fn realtime(config: CoordinatorConfig, catalog: Arc<LocationCatalog>) -> Self {
        Self::new(config, catalog, RealtimeScheduler::new(TokioContext::shared()))
    }
}

impl<S: CompletionScheduler<RpcEnvelope>> Coordinator<S> {
    pub fn new(config: CoordinatorConfig, catalog: Arc<LocationCatalog>, scheduler: S) -> Self {
        let rpc = RpcSimulationLayer::new(Arc::new(SimulatedRegionEndpoint::new()))
            .with_checkpoints(config.progress_checkpoints.clone());
        let state = SimulationState::idle(config.scenario, config.seed);
        Self {
            config,
            catalog,
            scheduler,
            rpc,
            observer: Box::new(NoopObserver),
            state,
            last_run: RunId::NONE,
            analytics: AnalyticsAggregator::new(&Region::ALL),
            latencies: Vec::new(),
            dispatched_at: Duration::ZERO,
            last_settled_at: Duration::ZERO,
            deadline: Duration::ZERO,
            stale_settlements: 0,
        }
    }

    /// Replaces the node behaviour (e.g. with a test double).
    pub fn with_endpoint(mut self, endpoint: Arc<dyn RegionEndpoint>) -> Self {
        self.rpc = RpcSimulationLayer::new(endpoint)
            .with_checkpoints(self.config.progress_checkpoints.clone());
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn SimulationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Swaps the single active observer.
    pub fn set_observer(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observer = observer;
    }

    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.config.scenario = scenario;
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.config.seed = seed;
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LocationCatalog {
        &self.catalog
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Settlements dropped because their run had been superseded.
    pub fn stale_settlements(&self) -> u64 {
        self.stale_settlements
    }

    /// Starts a run and dispatches every regional call.
    ///
    /// A rejected request leaves the phase where it was and only sets the
    /// error field. An accepted one resets the coordinator first, abandoning
    /// any in-flight run.
    pub fn start_simulation(&mut self, source: &str, destination: &str) -> Result<RunId, SimError> {
        if let Err(e) = self.validate(source, destination) {
            return Err(self.reject(e));
        }
        if self.state.phase != Phase::Idle {
            self.reset();
        }

        let run_id = self.last_run.next();
        self.last_run = run_id;
        self.begin_run(run_id, source, destination);

        self.transition(Phase::Requesting)?;
        self.log(
            LogLevel::Info,
            COORDINATOR_ID,
            format!(
                "Starting simulation {} -> {} ({} traffic{})",
                source,
                destination,
                self.config.scenario,
                self.config
                    .seed
                    .map(|s| format!(", seed {}", s))
                    .unwrap_or_default()
            ),
        );

        self.dispatched_at = self.scheduler.now();
        self.last_settled_at = self.dispatched_at;
        self.deadline = self
            .dispatched_at
            .saturating_add(self.config.processing_deadline());

        let requests = self.rpc.dispatch(
            &mut self.scheduler,
            run_id,
            &Region::ALL,
            self.config.scenario,
            self.config.seed,
        );

        let at_ms = self.now_ms();
        for request in &requests {
            let region = request.to;
            if let Some(node) = self.state.nodes.get_mut(&region) {
                node.status = NodeStatus::Processing;
                node.last_updated_ms = Some(at_ms);
            }
            self.analytics.mark_processing(region);
            self.log(
                LogLevel::Debug,
                region.name(),
                format!("TRAFFIC_REQUEST {} sent to {}", request.id, region.label()),
            );
            self.observer
                .on_node_status_change(region, NodeStatus::Processing, None);
            self.observer.on_node_progress(region, 0);
        }
        self.log(
            LogLevel::Info,
            COORDINATOR_ID,
            format!("Dispatched {} regional requests in parallel", requests.len()),
        );

        self.transition(Phase::Processing)?;
        Ok(run_id)
    }

    /// Delivers the next scheduled item, if one settles before the deadline.
    ///
    /// Returns `Ok(false)` when there is nothing left to deliver for the
    /// processing phase.
    pub async fn settle_next(&mut self) -> Result<bool, SimError> {
        if self.state.phase != Phase::Processing {
            return Ok(false);
        }

        match self.scheduler.next_before(self.deadline).await {
            Ok(Some(completion)) => {
                self.deliver(completion);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Applies one drained item to the current run, dropping it if its run
    /// has been superseded.
    fn deliver(&mut self, completion: Completion<RpcEnvelope>) {
        let RpcEnvelope { run_id, event } = completion.item;
        if run_id != self.state.run_id {
            self.stale_settlements += 1;
            debug!(stale = %run_id, current = %self.state.run_id, "Dropped stale completion");
            return;
        }

        match event {
            RpcEvent::Progress { region, percent } => {
                let processing = self
                    .state
                    .nodes
                    .get(&region)
                    .map_or(false, |n| n.status == NodeStatus::Processing);
                if processing {
                    self.observer.on_node_progress(region, percent);
                }
            }
            RpcEvent::Settled(response) => self.apply_settlement(response, completion.settled_at),
        }
    }

    /// Drains settlements, then aggregates and optimizes.
    ///
    /// Returns the error the run ended in, if any.
    pub async fn run_to_completion(&mut self) -> Result<(), SimError> {
        if self.state.phase != Phase::Processing {
            return Ok(());
        }

        while !self.all_nodes_terminal() {
            if !self.settle_next().await? {
                break;
            }
        }
        self.expire_outstanding();

        self.aggregate()?;
        self.optimize()
    }

    /// `start_simulation` followed by `run_to_completion`.
    pub async fn run(&mut self, source: &str, destination: &str) -> Result<RunId, SimError> {
        let run_id = self.start_simulation(source, destination)?;
        self.run_to_completion().await?;
        Ok(run_id)
    }

    /// Back to idle; anything still in flight is ignored from now on.
    pub fn reset(&mut self) {
        let was = self.state.phase;
        self.state = SimulationState::idle(self.config.scenario, self.config.seed);
        self.analytics = AnalyticsAggregator::new(&Region::ALL);
        self.latencies.clear();

        if was != Phase::Idle {
            info!(from = %was, "Coordinator reset");
            self.observer.on_phase_change(Phase::Idle);
        }
    }

    fn validate(&self, source: &str, destination: &str) -> Result<(), SimError> {
        if source.trim().is_empty() || destination.trim().is_empty() {
            return Err(SimError::validation("Source and destination are both required"));
        }
        for id in [source, destination] {
            if !self.catalog.contains(id) {
                return Err(SimError::validation(format!("Unknown location: {}", id)));
            }
        }
        if source == destination {
            return Err(SimError::validation(format!(
                "Source and destination must differ (both '{}')",
                source
            )));
        }
        Ok(())
    }

    fn begin_run(&mut self, run_id: RunId, source: &str, destination: &str) {
        let mut state = SimulationState::idle(self.config.scenario, self.config.seed);
        state.run_id = run_id;
        state.source = Some(source.to_string());
        state.destination = Some(destination.to_string());
        state.is_running = true;
        state.started_at_ms = Some(self.now_ms());
        self.state = state;

        self.analytics = AnalyticsAggregator::new(&Region::ALL);
        self.latencies.clear();
    }

    fn apply_settlement(&mut self, response: RpcResponse, settled_at: Duration) {
        let region = response.region;
        let ms = response.processing_time_ms;
        let at_ms = settled_at.as_millis() as u64;

        let still_processing = self
            .state
            .nodes
            .get(&region)
            .map_or(false, |n| n.status == NodeStatus::Processing);
        if !still_processing {
            debug!(region = %region, "Ignoring duplicate settlement");
            return;
        }

        self.last_settled_at = self.last_settled_at.max(settled_at);
        self.latencies.push(ResponseLatency {
            region,
            processing_time_ms: ms,
            success: response.success,
        });
        self.observer.on_node_progress(region, 100);

        let data = if response.success { response.data } else { None };
        match data {
            Some(data) => {
                if let Some(node) = self.state.nodes.get_mut(&region) {
                    node.status = NodeStatus::Success;
                    node.processing_time_ms = Some(ms);
                    node.traffic_load = data.traffic_load();
                    node.congestion_score = data.congestion_score;
                    node.average_speed = data.average_speed;
                    node.delay_factor = data.delay_factor;
                    node.last_updated_ms = Some(at_ms);
                }
                self.analytics.record_success(region, ms, &data);
                self.log(
                    LogLevel::Success,
                    region.name(),
                    format!(
                        "{} responded in {} ms: {:.1} km/h, congestion {:.0}% ({})",
                        region.label(),
                        ms,
                        data.average_speed,
                        data.congestion_score,
                        data.congestion_level()
                    ),
                );
                self.observer
                    .on_node_status_change(region, NodeStatus::Success, Some(ms));
                self.observer.on_traffic_data_received(region, &data);
                self.state.traffic.insert(region, data);
            }
            None => {
                let reason = response
                    .error
                    .unwrap_or_else(|| "response carried no traffic data".to_string());
                self.mark_failed(region, ms, at_ms, &reason);
            }
        }
    }

    fn mark_failed(&mut self, region: Region, ms: u64, at_ms: u64, reason: &str) {
        if let Some(node) = self.state.nodes.get_mut(&region) {
            node.status = NodeStatus::Failed;
            node.processing_time_ms = Some(ms);
            node.last_updated_ms = Some(at_ms);
        }
        self.analytics.record_failure(region, ms);
        self.log(
            LogLevel::Warning,
            region.name(),
            format!("{} failed after {} ms: {}", region.label(), ms, reason),
        );
        self.observer
            .on_node_status_change(region, NodeStatus::Failed, Some(ms));
    }

    /// Fails every call that did not settle before the deadline.
    fn expire_outstanding(&mut self) {
        let outstanding: Vec<Region> = self
            .state
            .nodes
            .values()
            .filter(|n| !n.status.is_terminal())
            .map(|n| n.id)
            .collect();
        if outstanding.is_empty() {
            return;
        }

        let now = self.scheduler.now();
        let waited_ms = now.saturating_sub(self.dispatched_at).as_millis() as u64;
        let at_ms = now.as_millis() as u64;
        self.last_settled_at = self.last_settled_at.max(now);

        for region in outstanding {
            self.latencies.push(ResponseLatency {
                region,
                processing_time_ms: waited_ms,
                success: false,
            });
            self.mark_failed(region, waited_ms, at_ms, "timed out");
        }
    }

    fn aggregate(&mut self) -> Result<(), SimError> {
        self.state.node_analytics = self.analytics.nodes().cloned().collect();
        match self.analytics.finalize() {
            Ok(system) => self.state.system_analytics = Some(system),
            Err(e) => warn!(error = %e, "System analytics unavailable"),
        }

        let failed: Vec<Region> = self
            .state
            .nodes
            .values()
            .filter(|n| n.status == NodeStatus::Failed)
            .map(|n| n.id)
            .collect();
        if failed.len() == self.state.nodes.len() {
            return Err(self.fail(SimError::CatastrophicFailure { regions: failed }));
        }

        self.transition(Phase::Aggregating)?;

        let parallel = self.last_settled_at.saturating_sub(self.dispatched_at);
        let metrics =
            PerformanceMetricsEngine::new().calculate(&self.latencies, parallel.as_millis() as u64);
        self.log(
            LogLevel::Info,
            COORDINATOR_ID,
            format!(
                "Parallel {} ms vs sequential {} ms: {:.2}x speedup, {:.0}% efficiency",
                metrics.parallel_time_ms,
                metrics.sequential_time_ms,
                metrics.speedup_factor,
                metrics.efficiency
            ),
        );
        if metrics.failed_requests > 0 {
            self.log(
                LogLevel::Warning,
                COORDINATOR_ID,
                format!(
                    "{} of {} regions failed; routing with partial traffic data",
                    metrics.failed_requests, metrics.total_requests
                ),
            );
        }
        self.observer.on_metrics_calculated(&metrics);
        self.state.metrics = Some(metrics);
        Ok(())
    }

    fn optimize(&mut self) -> Result<(), SimError> {
        self.transition(Phase::Optimizing)?;

        let (Some(source), Some(destination)) =
            (self.state.source.clone(), self.state.destination.clone())
        else {
            return Err(self.fail(SimError::validation("Run has no endpoints")));
        };

        let routed = GraphBuilder::new(&self.catalog)
            .build(&source, &destination)
            .and_then(|mut graph| {
                graph.apply_traffic(&self.state.traffic);
                DijkstraRouteOptimizer::new().optimize(
                    &graph,
                    &source,
                    &destination,
                    &self.state.traffic,
                )
            });
        let route = match routed {
            Ok(route) => route,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.log(
            LogLevel::Success,
            COORDINATOR_ID,
            format!(
                "Route {}: {:.0} km, {:.0} min at {:.1} km/h ({} congestion)",
                route.path_ids.join(" -> "),
                route.total_distance,
                route.estimated_time,
                route.average_speed,
                route.congestion_level
            ),
        );
        self.observer.on_route_calculated(&route);
        self.state.route = Some(route);

        // Requests rejected while this run was in flight do not taint it
        self.state.error = None;
        self.transition(Phase::Complete)?;
        self.finish();
        Ok(())
    }

    fn transition(&mut self, next: Phase) -> Result<(), SimError> {
        let from = self.state.phase;
        if !from.can_transition_to(next) {
            return Err(SimError::InvalidTransition { from, to: next });
        }
        self.state.phase = next;
        info!(run = %self.state.run_id, "Phase {} -> {}", from, next);
        self.observer.on_phase_change(next);
        Ok(())
    }

    /// Ends the current run in `error`.
    fn fail(&mut self, error: SimError) -> SimError {
        if self.transition(Phase::Error).is_ok() {
            self.finish();
        }
        self.reject(error)
    }

    /// Records `error` once in the log and once through `on_error`
    /// without touching the phase.
    fn reject(&mut self, error: SimError) -> SimError {
        let message = error.to_string();
        self.state.error = Some(message.clone());
        self.log(LogLevel::Error, COORDINATOR_ID, message.clone());
        self.observer.on_error(&message);
        error
    }

    fn finish(&mut self) {
        self.state.is_running = false;
        self.state.finished_at_ms = Some(self.now_ms());
    }

    fn all_nodes_terminal(&self) -> bool {
        self.state.nodes.values().all(|n| n.status.is_terminal())
    }

    fn now_ms(&self) -> u64 {
        self.scheduler.now().as_millis() as u64
    }

    /// Appends a run-visible entry and mirrors it to tracing.
    fn log(&mut self, level: LogLevel, source: &str, message: String) {
        let entry = LogEntry {
            seq: self.state.logs.len() as u64,
            run_id: self.state.run_id,
            at_ms: self.now_ms(),
            level,
            source: source.to_string(),
            message,
        };

        let run = entry.run_id;
        match level {
            LogLevel::Debug => debug!(%run, source, "{}", entry.message),
            LogLevel::Info | LogLevel::Success => info!(%run, source, "{}", entry.message),
            LogLevel::Warning => warn!(%run, source, "{}", entry.message),
            LogLevel::Error => error!(%run, source, "{}", entry.message),
        }

        self.observer.on_log(&entry);
        self.state.logs.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::EventRecorder;
    use crate::rpc::RpcRequest;

    fn coordinator(scenario: Scenario, seed: u64) -> VirtualCoordinator {
        Coordinator::virtual_clock(
            CoordinatorConfig::new(scenario).with_seed(seed),
            Arc::new(LocationCatalog::india()),
        )
    }

    /// Fixed delays, fails the listed regions.
    struct ScriptedEndpoint {
        failing: Vec<Region>,
    }

    impl RegionEndpoint for ScriptedEndpoint {
        fn handle(&self, request: &RpcRequest) -> RpcResponse {
            let delay = 100 * (request.to.tag() + 1);
            if self.failing.contains(&request.to) {
                return RpcResponse::failed(request, "scripted failure", delay);
            }
            let data = meshroute_core::TrafficDataGenerator::new().generate(
                request.to,
                request.payload.scenario,
                Some(1),
                delay,
            );
            RpcResponse::ok(request, data, delay)
        }
    }

    #[test]
    fn test_config_builders() {
        let config = CoordinatorConfig::new(Scenario::Rush)
            .with_seed(7)
            .with_processing_deadline(Duration::from_secs(3))
            .with_progress_checkpoints(vec![50]);
        assert_eq!(config.scenario, Scenario::Rush);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.processing_deadline(), Duration::from_secs(3));
        assert_eq!(config.progress_checkpoints, vec![50]);

        let default = CoordinatorConfig::default();
        assert_eq!(default.scenario, Scenario::Normal);
        assert_eq!(default.processing_deadline_ms, 10_000);
    }

    #[test]
    fn test_validation_keeps_phase() {
        let mut c = coordinator(Scenario::Normal, 1);
        let recorder = EventRecorder::new();
        c.set_observer(Box::new(recorder.clone()));

        for (src, dst) in [("", "mumbai"), ("delhi", "atlantis"), ("pune", "pune")] {
            let err = c.start_simulation(src, dst).unwrap_err();
            assert!(matches!(err, SimError::Validation(_)));
            assert_eq!(c.state().phase, Phase::Idle);
            assert!(c.state().error.is_some());
        }
        assert_eq!(recorder.errors().len(), 3);
        assert!(recorder.phases().is_empty());
        assert_eq!(c.scheduler().pending(), 0);
    }

    #[test]
    fn test_start_moves_to_processing() {
        let mut c = coordinator(Scenario::Normal, 1);
        let run = c.start_simulation("delhi", "chennai").unwrap();

        assert_eq!(run, RunId(1));
        assert_eq!(c.state().phase, Phase::Processing);
        assert!(c.state().is_running);
        assert!(c
            .state()
            .nodes
            .values()
            .all(|n| n.status == NodeStatus::Processing));
        assert_eq!(c.scheduler().pending(), Region::ALL.len() * 4);
    }

    #[tokio::test]
    async fn test_partial_failure_still_routes() {
        let mut c = coordinator(Scenario::Rush, 5).with_endpoint(Arc::new(ScriptedEndpoint {
            failing: vec![Region::East, Region::South],
        }));

        c.run("delhi", "mumbai").await.unwrap();
        let state = c.state();
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.nodes[&Region::East].status, NodeStatus::Failed);
        assert_eq!(state.traffic.len(), 3);

        let metrics = state.metrics.as_ref().unwrap();
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.successful_requests, 3);
        // Delays are 200..=600 ms, all dispatched together
        assert_eq!(metrics.parallel_time_ms, 600);
        assert_eq!(metrics.sequential_time_ms, 200 + 300 + 400 + 500 + 600);
        assert!(state.logs_at(LogLevel::Warning).count() >= 2);
    }

    #[tokio::test]
    async fn test_deadline_expires_slow_nodes() {
        let mut c = Coordinator::virtual_clock(
            CoordinatorConfig::new(Scenario::Normal)
                .with_seed(2)
                .with_processing_deadline(Duration::from_millis(350)),
            Arc::new(LocationCatalog::india()),
        )
        .with_endpoint(Arc::new(ScriptedEndpoint { failing: vec![] }));

        c.run("delhi", "jaipur").await.unwrap();
        let state = c.state();

        // Only north (200 ms) and south (300 ms) settle in time
        let succeeded: Vec<Region> = state
            .nodes
            .values()
            .filter(|n| n.status == NodeStatus::Success)
            .map(|n| n.id)
            .collect();
        assert_eq!(succeeded, vec![Region::North, Region::South]);
        assert_eq!(state.metrics.as_ref().unwrap().parallel_time_ms, 350);
        assert!(state
            .logs
            .iter()
            .any(|l| l.level == LogLevel::Warning && l.message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_settle_next_outside_processing_is_noop() {
        let mut c = coordinator(Scenario::Light, 3);
        assert!(!c.settle_next().await.unwrap());
        c.run_to_completion().await.unwrap();
        assert_eq!(c.state().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_log_sequence_is_dense() {
        let mut c = coordinator(Scenario::Normal, 11);
        c.run("jaipur", "kolkata").await.unwrap();

        let logs = &c.state().logs;
        assert!(!logs.is_empty());
        for (i, entry) in logs.iter().enumerate() {
            assert_eq!(entry.seq, i as u64);
            assert_eq!(entry.run_id, RunId(1));
        }
        assert!(logs.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));
    }

    #[tokio::test]
    async fn test_advance_drives_a_whole_run() {
        let mut c = coordinator(Scenario::Normal, 8)
            .with_endpoint(Arc::new(ScriptedEndpoint { failing: vec![] }));
        c.start_simulation("delhi", "mumbai").unwrap();

        assert_eq!(c.advance(Duration::from_secs(5)), Region::ALL.len() * 4);
        assert!(c
            .state()
            .nodes
            .values()
            .all(|n| n.status == NodeStatus::Success));
        assert_eq!(c.state().traffic.len(), 5);

        c.run_to_completion().await.unwrap();
        let state = c.state();
        assert_eq!(state.phase, Phase::Complete);
        let metrics = state.metrics.as_ref().unwrap();
        assert_eq!(metrics.successful_requests, 5);
        assert_eq!(metrics.parallel_time_ms, 600);
        assert!(!state.logs.iter().any(|l| l.message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_stepwise_advance_matches_drained_run() {
        let mut drained = coordinator(Scenario::Rush, 13);
        drained.run("lucknow", "bangalore").await.unwrap();

        let recorder = EventRecorder::new();
        let mut stepped = coordinator(Scenario::Rush, 13);
        stepped.set_observer(Box::new(recorder.clone()));
        stepped.start_simulation("lucknow", "bangalore").unwrap();
        for _ in 0..1_000 {
            if stepped.all_nodes_terminal() {
                break;
            }
            stepped.advance(Duration::from_millis(50));
        }
        stepped.run_to_completion().await.unwrap();

        assert_eq!(stepped.state().phase, Phase::Complete);
        assert_eq!(stepped.state().route, drained.state().route);
        assert_eq!(stepped.state().metrics, drained.state().metrics);
        assert_eq!(stepped.state().traffic, drained.state().traffic);
        assert_eq!(stepped.state().nodes, drained.state().nodes);
        assert_eq!(stepped.stale_settlements(), 0);
    }

    #[tokio::test]
    async fn test_advance_stops_at_deadline() {
        let mut c = Coordinator::virtual_clock(
            CoordinatorConfig::new(Scenario::Normal).with_processing_deadline(Duration::from_millis(350)),
            Arc::new(LocationCatalog::india()),
        )
        .with_endpoint(Arc::new(ScriptedEndpoint { failing: vec![] }));
        c.start_simulation("delhi", "jaipur").unwrap();

        c.advance(Duration::from_secs(5));
        assert_eq!(c.scheduler().now(), Duration::from_millis(350));
        assert_eq!(
            c.state()
                .nodes
                .values()
                .filter(|n| n.status == NodeStatus::Processing)
                .count(),
            3
        );

        c.run_to_completion().await.unwrap();
        assert_eq!(c.state().metrics.as_ref().unwrap().parallel_time_ms, 350);
    }

    #[test]
    fn test_advance_when_idle_only_moves_clock() {
        let mut c = coordinator(Scenario::Light, 2);
        assert_eq!(c.advance(Duration::from_secs(1)), 0);
        assert_eq!(c.scheduler().now(), Duration::from_secs(1));
        assert_eq!(c.state().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_stalled_region_times_out() {
        struct Stalled(ScriptedEndpoint);
        impl RegionEndpoint for Stalled {
            fn handle(&self, request: &RpcRequest) -> RpcResponse {
                let response = self.0.handle(request);
                if request.to == Region::West {
                    return RpcResponse { processing_time_ms: u64::MAX, ..response };
                }
                response
            }
        }

        let mut c = coordinator(Scenario::Normal, 4)
            .with_endpoint(Arc::new(Stalled(ScriptedEndpoint { failing: vec![] })));
        c.run("delhi", "mumbai").await.unwrap();

        let state = c.state();
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.nodes[&Region::West].status, NodeStatus::Failed);
        assert_eq!(state.traffic.len(), 4);
        assert_eq!(
            state.metrics.as_ref().unwrap().parallel_time_ms,
            CoordinatorConfig::default().processing_deadline_ms
        );
    }

    #[test]
    fn test_unbounded_deadline_saturates() {
        let config = CoordinatorConfig::new(Scenario::Light).with_processing_deadline(Duration::MAX);
        assert_eq!(config.processing_deadline_ms, u64::MAX);

        let mut c = Coordinator::virtual_clock(config, Arc::new(LocationCatalog::india()));
        c.advance(Duration::from_secs(3));
        c.start_simulation("delhi", "pune").unwrap();
        assert_eq!(c.state().phase, Phase::Processing);
    }
}
