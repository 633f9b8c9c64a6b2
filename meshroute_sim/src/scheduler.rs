//! Virtual-clock completion scheduler.
//!
//! Items wait in a priority queue keyed by `(due time, scheduling order)`.
//! Draining the queue moves the shared [`SimContext`] clock to each item's
//! due time, so a whole fan-out settles instantly in wall time while the
//! virtual clock records exactly how long it "took".

use crate::context::{as_clock_ns, SimContext};
use async_trait::async_trait;
use meshroute_env::{Completion, CompletionScheduler, EnvError, MeshContext};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

struct Entry<T> {
    due: Duration,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest due first, then first scheduled
        (self.due, self.seq).cmp(&(other.due, other.seq)).reverse()
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deterministic scheduler over a manually advanced clock.
pub struct VirtualScheduler<T> {
    ctx: SimContext,
    queue: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T: Send + 'static> VirtualScheduler<T> {
    pub fn new(ctx: SimContext) -> Self {
        Self {
            ctx,
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Due time of the earliest pending item.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.peek().map(|e| e.due)
    }

    /// Advances the clock by `duration` and returns every item that fell
    /// due, in delivery order.
    pub fn advance(&mut self, duration: Duration) -> Vec<Completion<T>> {
        let target = self.ctx.now().saturating_add(duration);
        let mut settled = Vec::new();
        while self.queue.peek().map_or(false, |e| e.due <= target) {
            if let Some(entry) = self.queue.pop() {
                settled.push(self.settle(entry));
            }
        }
        self.ctx.set_time(as_clock_ns(target));
        settled
    }

    fn settle(&self, entry: Entry<T>) -> Completion<T> {
        self.ctx.set_time(as_clock_ns(entry.due));
        Completion {
            settled_at: self.ctx.now(),
            item: entry.item,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> CompletionScheduler<T> for VirtualScheduler<T> {
    fn now(&self) -> Duration {
        self.ctx.now()
    }

    fn schedule(&mut self, offset: Duration, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry {
            due: self.ctx.now().saturating_add(offset),
            seq,
            item,
        });
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    async fn next_before(&mut self, deadline: Duration) -> Result<Option<Completion<T>>, EnvError> {
        let Some(due) = self.next_due() else {
            return Ok(None);
        };
        if due > deadline {
            self.ctx.set_time(as_clock_ns(deadline));
            return Ok(None);
        }
        Ok(self.queue.pop().map(|entry| self.settle(entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_in_due_order_and_moves_clock() {
        let mut scheduler = VirtualScheduler::new(SimContext::new());
        scheduler.schedule(Duration::from_millis(300), "c");
        scheduler.schedule(Duration::from_millis(100), "a");
        scheduler.schedule(Duration::from_millis(200), "b");

        let far = Duration::from_secs(60);
        let first = scheduler.next_before(far).await.unwrap().unwrap();
        assert_eq!(first.item, "a");
        assert_eq!(first.settled_at, Duration::from_millis(100));
        assert_eq!(scheduler.now(), Duration::from_millis(100));

        let rest: Vec<_> = [
            scheduler.next_before(far).await.unwrap().unwrap(),
            scheduler.next_before(far).await.unwrap().unwrap(),
        ]
        .into_iter()
        .map(|c| (c.item, c.settled_at))
        .collect();
        assert_eq!(
            rest,
            vec![("b", Duration::from_millis(200)), ("c", Duration::from_millis(300))]
        );
        assert!(scheduler.next_before(far).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ties_follow_scheduling_order() {
        let mut scheduler = VirtualScheduler::new(SimContext::new());
        for i in 0..5u32 {
            scheduler.schedule(Duration::from_millis(50), i);
        }

        let mut order = Vec::new();
        while let Some(done) = scheduler.next_before(Duration::from_secs(1)).await.unwrap() {
            order.push(done.item);
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_deadline_stops_at_deadline() {
        let mut scheduler = VirtualScheduler::new(SimContext::new());
        scheduler.schedule(Duration::from_secs(30), ());

        let next = scheduler.next_before(Duration::from_secs(10)).await.unwrap();
        assert!(next.is_none());
        assert_eq!(scheduler.now(), Duration::from_secs(10));
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_harness_advance() {
        let mut scheduler = VirtualScheduler::new(SimContext::new());
        scheduler.schedule(Duration::from_millis(100), 1);
        scheduler.schedule(Duration::from_millis(400), 2);

        assert_eq!(scheduler.next_due(), Some(Duration::from_millis(100)));

        let settled = scheduler.advance(Duration::from_millis(250));
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].item, 1);
        assert_eq!(settled[0].settled_at, Duration::from_millis(100));
        assert_eq!(scheduler.now(), Duration::from_millis(250));

        // Offsets are relative to the advanced clock
        scheduler.schedule(Duration::from_millis(100), 3);
        let settled: Vec<i32> = scheduler
            .advance(Duration::from_millis(200))
            .into_iter()
            .map(|c| c.item)
            .collect();
        assert_eq!(settled, vec![3, 2]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_unbounded_offsets_do_not_overflow() {
        let mut scheduler = VirtualScheduler::new(SimContext::new());
        scheduler.schedule(Duration::from_millis(100), "near");
        scheduler.schedule(Duration::MAX, "never");

        let settled = scheduler.advance(Duration::MAX);
        let items: Vec<_> = settled.iter().map(|c| c.item).collect();
        assert_eq!(items, vec!["near", "never"]);
        assert_eq!(scheduler.now(), Duration::from_nanos(u64::MAX));

        // The clock is pinned at its end; later offsets saturate too
        scheduler.schedule(Duration::from_secs(1), "late");
        let next = scheduler.next_before(Duration::MAX).await.unwrap().unwrap();
        assert_eq!(next.item, "late");
    }
}
