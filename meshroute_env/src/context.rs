//! Core environment context trait for meshroute components.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the coordinator and its
/// schedulers can run both interactively (tokio) and under a virtual clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Simulation**: `SimContext` (in `meshroute_sim`) - manually advanced clock
///
/// Seeds are not part of the context: seeded components derive their
/// streams from the run seed with [`mix_seed`].
#[async_trait]
pub trait MeshContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Mixes a master seed with an extension value.
///
/// Shared by every seeded component so that the same `(seed, extension)`
/// pair always lands on the same stream.
pub fn mix_seed(seed: u64, extension: u64) -> u64 {
    let mut z = seed.wrapping_mul(0x517cc1b727220a95) ^ extension.wrapping_mul(0x9e3779b97f4a7c15);
    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}
