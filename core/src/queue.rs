//! bounded FIFO with back-pressure, shared by ingestion intake and the
//! outtake of per-worker request messages (spec §4.4).

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use tokio::sync::Notify;

use crate::error::{Error, Result};

/// `None` means disabled (unbounded, submit never blocks).
pub type Capacity = Option<usize>;

struct State<T> {
    items: VecDeque<T>,
    capacity: Capacity,
    closed: bool,
}

/// bounded FIFO. items are dequeued in submission order within a single
/// producer; with multiple producers, per-producer order is preserved but
/// global interleaving is unspecified (spec §4.4 invariant).
pub struct Queue<T> {
    state: Mutex<State<T>>,
    not_full: Notify,
    not_empty: Notify,
}

impl<T> Queue<T> {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            state: Mutex::new(State { items: VecDeque::new(), capacity, closed: false }),
            not_full: Notify::new(),
            not_empty: Notify::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// non-blocking when there is room, otherwise blocks until room or
    /// cancellation (`shutdown`), which fails the submit with `Interrupted`.
    pub async fn submit(&self, item: T) -> Result<()> {
        let mut item = Some(item);
        loop {
            {
                let mut st = self.state.lock().unwrap();
                if st.closed {
                    return Err(Error::Interrupted);
                }
                if st.capacity.is_none_or(|cap| st.items.len() < cap) {
                    st.items.push_back(item.take().unwrap());
                    drop(st);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }
            self.not_full.notified().await;
        }
    }

    /// blocks up to `timeout`; returns `Ok(true)` if accepted within the
    /// deadline, `Ok(false)` if the deadline elapsed with no room, and
    /// `Err(Interrupted)` on shutdown.
    pub async fn submit_timeout(&self, item: T, timeout: Duration) -> Result<bool> {
        match tokio::time::timeout(timeout, self.submit(item)).await {
            Ok(result) => result.map(|()| true),
            Err(_elapsed) => Ok(false),
        }
    }

    /// dequeue the oldest item, waiting if the queue is empty. returns `None`
    /// once the queue is shut down and drained.
    pub async fn dequeue(&self) -> Option<T> {
        loop {
            {
                let mut st = self.state.lock().unwrap();
                if let Some(item) = st.items.pop_front() {
                    drop(st);
                    self.not_full.notify_one();
                    return Some(item);
                }
                if st.closed {
                    return None;
                }
            }
            self.not_empty.notified().await;
        }
    }

    /// non-blocking attempt to pop one item, if any is immediately available.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut st = self.state.lock().unwrap();
        let item = st.items.pop_front();
        drop(st);
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// wake every blocked submitter/dequeuer; submits fail with `Interrupted`
    /// from this point on. already-queued items remain available to drain.
    pub fn shutdown(&self) {
        self.state.lock().unwrap().closed = true;
        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// drain whatever remains, in FIFO order, without waiting.
    pub fn drain(&self) -> Vec<T> {
        self.state.lock().unwrap().items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn disabled_queue_never_blocks() {
        let q: Queue<u32> = Queue::new(None);
        for i in 0..1000 {
            q.submit(i).await.unwrap();
        }
        assert_eq!(q.len(), 1000);
    }

    #[tokio::test]
    async fn fifo_order_single_producer() {
        let q: Queue<u32> = Queue::new(Some(10));
        for i in 0..5 {
            q.submit(i).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(q.dequeue().await, Some(i));
        }
    }

    /// S3 from spec §8: capacity 2, three submits, no consumer -> third
    /// submit with 50ms timeout returns `TimedOut` (modeled as `Ok(false)`
    /// from `submit_timeout`, which the facade maps to `Error::TimedOut`).
    #[tokio::test(start_paused = true)]
    async fn s3_back_pressure_times_out() {
        let q: Arc<Queue<u32>> = Arc::new(Queue::new(Some(2)));
        q.submit(1).await.unwrap();
        q.submit(2).await.unwrap();
        let accepted = q.submit_timeout(3, Duration::from_millis(50)).await.unwrap();
        assert!(!accepted);
        assert_eq!(q.len(), 2);
    }

    #[tokio::test]
    async fn size_never_exceeds_capacity() {
        let q: Arc<Queue<u32>> = Arc::new(Queue::new(Some(2)));
        q.submit(1).await.unwrap();
        q.submit(2).await.unwrap();
        let q2 = q.clone();
        let blocked = tokio::spawn(async move { q2.submit(3).await });
        tokio::task::yield_now().await;
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue().await, Some(1));
        blocked.await.unwrap().unwrap();
        assert_eq!(q.len(), 2);
    }

    /// S6 from spec §8: cancellation wakes blocked submits/dequeues with
    /// `Interrupted`.
    #[tokio::test]
    async fn shutdown_wakes_blocked_submit_with_interrupted() {
        let q: Arc<Queue<u32>> = Arc::new(Queue::new(Some(1)));
        q.submit(1).await.unwrap();
        let q2 = q.clone();
        let blocked = tokio::spawn(async move { q2.submit(2).await });
        tokio::task::yield_now().await;
        q.shutdown();
        let err = blocked.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }
}
