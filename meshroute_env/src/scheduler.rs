//! Completion schedulers: deliver fanned-out work back to a single owner.
//!
//! A scheduler accepts items tagged with a completion offset and hands them
//! back one at a time, in due-time order, to whoever drains it. The
//! coordinator is the only drainer, so every mutation triggered by a
//! settlement happens on one logical thread.
//!
//! ```text
//! owner ── schedule(offset, item) ──► [ pending set ] ── next_before(deadline) ──► owner
//! ```
//!
//! Two implementations satisfy the same ordering contract:
//! - [`RealtimeScheduler`] - one spawned task per item, sleeping on a
//!   [`MeshContext`]
//! - `VirtualScheduler` (in `meshroute_sim`) - a priority queue over a
//!   manually advanced clock

use crate::error::EnvError;
use crate::MeshContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// An item handed back by a scheduler once its offset elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T> {
    /// Scheduler clock reading when the item settled
    pub settled_at: Duration,

    /// The scheduled payload
    pub item: T,
}

/// Ordering contract shared by the real-time and virtual schedulers.
///
/// Items are delivered in order of `schedule time + offset`. The virtual
/// implementation breaks ties by scheduling order; the real-time one makes
/// no promise for exact ties.
#[async_trait]
pub trait CompletionScheduler<T: Send + 'static>: Send {
    /// Current reading of the scheduler's clock.
    fn now(&self) -> Duration;

    /// Registers `item` to settle `offset` after now.
    fn schedule(&mut self, offset: Duration, item: T);

    /// Number of scheduled items not yet delivered.
    fn pending(&self) -> usize;

    /// Waits for the next settled item.
    ///
    /// Returns `Ok(None)` if nothing is pending or nothing settles before
    /// the absolute clock reading `deadline`.
    async fn next_before(&mut self, deadline: Duration) -> Result<Option<Completion<T>>, EnvError>;
}

/// Real-time scheduler: each item sleeps in its own task on the context.
pub struct RealtimeScheduler<C: MeshContext, T> {
    ctx: Arc<C>,
    tx: mpsc::UnboundedSender<Completion<T>>,
    rx: mpsc::UnboundedReceiver<Completion<T>>,
    pending: usize,
}

impl<C: MeshContext, T: Send + 'static> RealtimeScheduler<C, T> {
    /// Creates a scheduler driven by the given context.
    pub fn new(ctx: Arc<C>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            tx,
            rx,
            pending: 0,
        }
    }
}

#[async_trait]
impl<C: MeshContext, T: Send + 'static> CompletionScheduler<T> for RealtimeScheduler<C, T> {
    fn now(&self) -> Duration {
        self.ctx.now()
    }

    fn schedule(&mut self, offset: Duration, item: T) {
        self.pending += 1;
        let ctx = Arc::clone(&self.ctx);
        let tx = self.tx.clone();
        self.ctx.spawn("scheduled-completion", async move {
            ctx.sleep(offset).await;
            // Receiver lives as long as the scheduler; a send error only
            // means the owner is gone.
            let _ = tx.send(Completion {
                settled_at: ctx.now(),
                item,
            });
        });
    }

    fn pending(&self) -> usize {
        self.pending
    }

    async fn next_before(&mut self, deadline: Duration) -> Result<Option<Completion<T>>, EnvError> {
        if self.pending == 0 {
            return Ok(None);
        }

        let budget = deadline.saturating_sub(self.ctx.now());
        match tokio::time::timeout(budget, self.rx.recv()).await {
            Ok(Some(completion)) => {
                self.pending -= 1;
                Ok(Some(completion))
            }
            Ok(None) => Err(EnvError::closed("all senders dropped")),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokioContext;

    #[tokio::test]
    async fn test_realtime_delivers_in_due_order() {
        let mut scheduler = RealtimeScheduler::new(TokioContext::shared());
        scheduler.schedule(Duration::from_millis(120), "slow");
        scheduler.schedule(Duration::from_millis(10), "fast");
        scheduler.schedule(Duration::from_millis(60), "medium");
        assert_eq!(scheduler.pending(), 3);

        let deadline = scheduler.now() + Duration::from_secs(5);
        let mut order = Vec::new();
        while let Some(done) = scheduler.next_before(deadline).await.unwrap() {
            order.push(done.item);
        }

        assert_eq!(order, vec!["fast", "medium", "slow"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_realtime_deadline_expires() {
        let mut scheduler = RealtimeScheduler::new(TokioContext::shared());
        scheduler.schedule(Duration::from_secs(10), 1u32);

        let deadline = scheduler.now() + Duration::from_millis(20);
        let next = scheduler.next_before(deadline).await.unwrap();

        assert!(next.is_none());
        assert_eq!(scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn test_realtime_empty_returns_none() {
        let mut scheduler: RealtimeScheduler<TokioContext, u8> =
            RealtimeScheduler::new(TokioContext::shared());
        let next = scheduler.next_before(Duration::from_secs(1)).await.unwrap();
        assert!(next.is_none());
    }
}
