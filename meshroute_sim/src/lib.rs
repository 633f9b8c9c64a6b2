//! meshroute Simulation Coordinator
//!
//! Runs one routing query across the regional worker nodes:
//! every region is asked for its traffic conditions in parallel, the
//! answers are folded into performance metrics and node analytics, and the
//! route is computed over the congestion-weighted road graph.
//!
//! # Core Principle: One Owner, Many Calls
//!
//! - **Calls** are concurrent; each settles after its simulated processing time
//! - **Settlements** are funneled through one scheduler and applied in order
//! - **Runs** are tagged with a `RunId`; late results of an abandoned run are dropped
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Coordinator                          │
//! │  SimulationState ◄── settle_next() ◄── CompletionScheduler   │
//! │        │                                   ▲                 │
//! │        │                     ┌─────────────┴──────────┐      │
//! │        ▼                     │ VirtualScheduler (sim) │      │
//! │  SimulationObserver          │ RealtimeScheduler      │      │
//! │                              └─────────────▲──────────┘      │
//! │                                            │                 │
//! │                              RpcSimulationLayer              │
//! │             ┌──────┬──────┬──────┬──────┐  │                 │
//! │             │North │South │East  │West  │Central             │
//! │             └──────┴──────┴──────┴──────┘  RegionEndpoint    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use meshroute_sim::{Coordinator, CoordinatorConfig};
//! use meshroute_core::{LocationCatalog, Scenario};
//! use std::sync::Arc;
//!
//! let config = CoordinatorConfig::new(Scenario::Rush).with_seed(42);
//! let mut coordinator = Coordinator::virtual_clock(config, Arc::new(LocationCatalog::india()));
//! coordinator.run("delhi", "mumbai").await?;
//! println!("{:?}", coordinator.state().route);
//! ```

mod context;
pub mod coordinator;
mod error;
pub mod observer;
mod report;
pub mod rpc;
mod scheduler;
pub mod state;

pub use context::SimContext;
pub use coordinator::{
    Coordinator, CoordinatorConfig, RealtimeCoordinator, VirtualCoordinator,
};
pub use error::SimError;
pub use observer::{EventRecorder, NoopObserver, ObserverBundle, SimEvent, SimulationObserver};
pub use report::RunReport;
pub use rpc::{
    RegionEndpoint, RpcEnvelope, RpcEvent, RpcRequest, RpcResponse, RpcSimulationLayer,
    SimulatedRegionEndpoint,
};
pub use scheduler::VirtualScheduler;
pub use state::{LogEntry, LogLevel, Phase, SimulationState};
