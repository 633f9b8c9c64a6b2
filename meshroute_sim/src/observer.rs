//! Observer interface for run events.
//!
//! The coordinator holds exactly one observer and notifies it
//! synchronously from its single update path. Observers only ever see
//! shared references.

use crate::state::{LogEntry, Phase};
use meshroute_core::{NodeStatus, PerformanceMetrics, Region, RouteResult, TrafficData};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Receives run events. Every method defaults to a no-op.
pub trait SimulationObserver: Send {
    fn on_phase_change(&mut self, _phase: Phase) {}

    fn on_log(&mut self, _entry: &LogEntry) {}

    fn on_node_progress(&mut self, _region: Region, _percent: u8) {}

    fn on_node_status_change(
        &mut self,
        _region: Region,
        _status: NodeStatus,
        _processing_time_ms: Option<u64>,
    ) {
    }

    fn on_traffic_data_received(&mut self, _region: Region, _data: &TrafficData) {}

    fn on_metrics_calculated(&mut self, _metrics: &PerformanceMetrics) {}

    fn on_route_calculated(&mut self, _route: &RouteResult) {}

    fn on_error(&mut self, _message: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SimulationObserver for NoopObserver {}

/// Optional closures, one per event; unset ones are skipped.
///
/// ```ignore
/// let observer = ObserverBundle {
///     on_phase_change: Some(Box::new(|phase| println!("-> {phase}"))),
///     ..Default::default()
/// };
/// coordinator.set_observer(Box::new(observer));
/// ```
#[derive(Default)]
#[allow(clippy::type_complexity)]
pub struct ObserverBundle {
    pub on_phase_change: Option<Box<dyn FnMut(Phase) + Send>>,
    pub on_log: Option<Box<dyn FnMut(&LogEntry) + Send>>,
    pub on_node_progress: Option<Box<dyn FnMut(Region, u8) + Send>>,
    pub on_node_status_change: Option<Box<dyn FnMut(Region, NodeStatus, Option<u64>) + Send>>,
    pub on_traffic_data_received: Option<Box<dyn FnMut(Region, &TrafficData) + Send>>,
    pub on_metrics_calculated: Option<Box<dyn FnMut(&PerformanceMetrics) + Send>>,
    pub on_route_calculated: Option<Box<dyn FnMut(&RouteResult) + Send>>,
    pub on_error: Option<Box<dyn FnMut(&str) + Send>>,
}

impl SimulationObserver for ObserverBundle {
    fn on_phase_change(&mut self, phase: Phase) {
        if let Some(f) = self.on_phase_change.as_mut() {
            f(phase);
        }
    }

    fn on_log(&mut self, entry: &LogEntry) {
        if let Some(f) = self.on_log.as_mut() {
            f(entry);
        }
    }

    fn on_node_progress(&mut self, region: Region, percent: u8) {
        if let Some(f) = self.on_node_progress.as_mut() {
            f(region, percent);
        }
    }

    fn on_node_status_change(
        &mut self,
        region: Region,
        status: NodeStatus,
        processing_time_ms: Option<u64>,
    ) {
        if let Some(f) = self.on_node_status_change.as_mut() {
            f(region, status, processing_time_ms);
        }
    }

    fn on_traffic_data_received(&mut self, region: Region, data: &TrafficData) {
        if let Some(f) = self.on_traffic_data_received.as_mut() {
            f(region, data);
        }
    }

    fn on_metrics_calculated(&mut self, metrics: &PerformanceMetrics) {
        if let Some(f) = self.on_metrics_calculated.as_mut() {
            f(metrics);
        }
    }

    fn on_route_calculated(&mut self, route: &RouteResult) {
        if let Some(f) = self.on_route_calculated.as_mut() {
            f(route);
        }
    }

    fn on_error(&mut self, message: &str) {
        if let Some(f) = self.on_error.as_mut() {
            f(message);
        }
    }
}

/// A recorded observer notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    PhaseChange {
        phase: Phase,
    },
    Log {
        entry: LogEntry,
    },
    NodeProgress {
        region: Region,
        percent: u8,
    },
    NodeStatusChange {
        region: Region,
        status: NodeStatus,
        processing_time_ms: Option<u64>,
    },
    TrafficDataReceived {
        region: Region,
        congestion_score: f64,
    },
    MetricsCalculated {
        speedup_factor: f64,
    },
    RouteCalculated {
        path_ids: Vec<String>,
    },
    Error {
        message: String,
    },
}

/// Observer that records every notification.
///
/// Clones share one buffer, so a test can keep a handle while the
/// coordinator owns the boxed observer.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimEvent>> {
        // A panicking observer elsewhere must not hide what was recorded
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: SimEvent) {
        self.lock().push(event);
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().clone()
    }

    /// Phases in the order they were entered.
    pub fn phases(&self) -> Vec<Phase> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SimEvent::PhaseChange { phase } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SimEvent::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl SimulationObserver for EventRecorder {
    fn on_phase_change(&mut self, phase: Phase) {
        self.push(SimEvent::PhaseChange { phase });
    }

    fn on_log(&mut self, entry: &LogEntry) {
        self.push(SimEvent::Log {
            entry: entry.clone(),
        });
    }

    fn on_node_progress(&mut self, region: Region, percent: u8) {
        self.push(SimEvent::NodeProgress { region, percent });
    }

    fn on_node_status_change(
        &mut self,
        region: Region,
        status: NodeStatus,
        processing_time_ms: Option<u64>,
    ) {
        self.push(SimEvent::NodeStatusChange {
            region,
            status,
            processing_time_ms,
        });
    }

    fn on_traffic_data_received(&mut self, region: Region, data: &TrafficData) {
        self.push(SimEvent::TrafficDataReceived {
            region,
            congestion_score: data.congestion_score,
        });
    }

    fn on_metrics_calculated(&mut self, metrics: &PerformanceMetrics) {
        self.push(SimEvent::MetricsCalculated {
            speedup_factor: metrics.speedup_factor,
        });
    }

    fn on_route_calculated(&mut self, route: &RouteResult) {
        self.push(SimEvent::RouteCalculated {
            path_ids: route.path_ids.clone(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.push(SimEvent::Error {
            message: message.to_string(),
        });
    }
}
