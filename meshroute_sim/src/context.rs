//! Simulation context implementing MeshContext for deterministic testing.

use async_trait::async_trait;
use meshroute_env::MeshContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Saturating conversion to the clock's nanosecond representation.
pub(crate) fn as_clock_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Simulation context backed by a virtual clock.
///
/// This implements `MeshContext` using:
/// - A virtual clock that only moves when advanced
/// - Simulated sleep that advances virtual time
///
/// Clones share the same clock.
#[derive(Clone, Default)]
pub struct SimContext {
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,
}

impl SimContext {
    /// Creates a new SimContext at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances virtual time by the given duration, saturating at the
    /// end of the clock.
    pub fn advance_time(&self, duration: Duration) {
        let step = as_clock_ns(duration);
        let _ = self
            .virtual_time_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(step))
            });
    }

    /// Moves virtual time forward to `time_ns`; never moves it backwards.
    pub fn set_time(&self, time_ns: u64) {
        self.virtual_time_ns.fetch_max(time_ns, Ordering::SeqCst);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeshContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // In simulation, sleep advances virtual time
        self.advance_time(duration);
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let _name = name.to_string();
        tokio::spawn(future);
    }
}
