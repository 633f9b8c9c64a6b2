//! meshroute Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the routing
//! coordinator run against **real time** (tokio) or a **virtual clock**
//! (`meshroute_sim::SimContext`).
//!
//! # Core Concept: Fan-out, single-owner fan-in
//!
//! Remote calls are modelled as scheduled completions:
//! - Time (`now()`, `sleep()`) comes from a [`MeshContext`]
//! - Work is handed to a [`CompletionScheduler`] with a completion offset
//! - The owner drains completions one at a time, in due-time order
//!
//! Seeded components derive their streams from one 64-bit master seed via
//! [`mix_seed`], so any run becomes reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use meshroute_env::{CompletionScheduler, RealtimeScheduler, TokioContext};
//!
//! let mut scheduler = RealtimeScheduler::new(TokioContext::shared());
//! scheduler.schedule(Duration::from_millis(250), "north");
//! while let Some(done) = scheduler.next_before(deadline).await? {
//!     handle(done.item);
//! }
//! ```

mod context;
mod error;
mod scheduler;
mod tokio_impl;
mod types;

pub use context::{mix_seed, MeshContext};
pub use error::EnvError;
pub use scheduler::{Completion, CompletionScheduler, RealtimeScheduler};
pub use tokio_impl::TokioContext;
pub use types::RunId;
