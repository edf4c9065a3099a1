//! [apps/control-plane/src/services/llm_queue.rs]
//! Bounded-concurrency LLM request queue. Priority+FIFO dispatch over a
//! shared heap, a per-user sliding-window rate limiter, and a hard
//! queue-depth cap. Dispatch waits on a `Notify` rather than polling on a
//! fixed sleep.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use nyx_domain_models::NyxError;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{instrument, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

struct Entry {
    id: u64,
    priority: Priority,
    enqueued_at: Instant,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Entry {}

/// `BinaryHeap` is a max-heap; ordering makes "greatest" mean "dispatch
/// next": higher priority wins, ties broken by earliest enqueue time.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct QueueCounters {
    pub submitted: u64,
    pub completed: u64,
    pub rejected: u64,
    pub timed_out: u64,
}

struct Inner {
    heap: BinaryHeap<Entry>,
    active: usize,
}

pub struct LlmQueue {
    max_concurrent: usize,
    rate_per_min: u32,
    timeout: Duration,
    queue_max: usize,

    inner: Mutex<Inner>,
    notify: Notify,
    next_id: AtomicU64,
    counters: Mutex<QueueCounters>,
    rate_windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

/// Held while an LLM call is in flight; dropping it frees the concurrency
/// slot and wakes the next waiter.
pub struct LlmPermit<'a> {
    queue: &'a LlmQueue,
}

impl Drop for LlmPermit<'_> {
    fn drop(&mut self) {
        let queue = self.queue;
        tokio::spawn(async move {
            let mut inner = queue.inner.lock().await;
            inner.active = inner.active.saturating_sub(1);
            drop(inner);
            let mut counters = queue.counters.lock().await;
            counters.completed += 1;
            drop(counters);
            queue.notify.notify_waiters();
        });
    }
}

/// Guards a single heap `Entry` from submission until it is either
/// dispatched or times out. If the `submit()` future is dropped while
/// still waiting — the caller's task aborted, a `select!` raced it out —
/// `Drop` sweeps the entry out of the heap so it doesn't sit at the top
/// blocking every later waiter forever. `disarm()` is called on the two
/// paths that already take the entry out themselves (dispatch, timeout),
/// so the sweep only ever runs for an actual cancellation.
struct HeapGuard<'a> {
    queue: &'a LlmQueue,
    entry_id: u64,
    armed: bool,
}

impl HeapGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for HeapGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let queue = self.queue;
        let entry_id = self.entry_id;
        tokio::spawn(async move {
            let mut inner = queue.inner.lock().await;
            inner.heap.retain(|e| e.id != entry_id);
            drop(inner);
            queue.notify.notify_waiters();
        });
    }
}

impl LlmQueue {
    pub fn new(max_concurrent: usize, rate_per_min: u32, timeout_s: u64, queue_max: usize) -> Self {
        Self {
            max_concurrent,
            rate_per_min,
            timeout: Duration::from_secs(timeout_s),
            queue_max,
            inner: Mutex::new(Inner { heap: BinaryHeap::new(), active: 0 }),
            notify: Notify::new(),
            next_id: AtomicU64::new(0),
            counters: Mutex::new(QueueCounters::default()),
            rate_windows: Mutex::new(HashMap::new()),
        }
    }

    /// Sliding 60-second window per user. Records the attempt on
    /// acceptance; the window is pruned lazily on each check.
    #[instrument(skip(self))]
    async fn check_rate_limit(&self, user_id: &str) -> Result<(), NyxError> {
        let now = Instant::now();
        let mut windows = self.rate_windows.lock().await;
        let window = windows.entry(user_id.to_string()).or_default();
        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= Duration::from_secs(60) {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() as u32 >= self.rate_per_min {
            let oldest = *window.front().expect("window is non-empty when at capacity");
            let retry_after = Duration::from_secs(60).saturating_sub(now.duration_since(oldest));
            warn!("🚦 [LLM_QUEUE]: user {user_id} over rate budget, retry in {:?}", retry_after);
            return Err(NyxError::RateLimited { retry_after_s: retry_after.as_secs().max(1) });
        }

        window.push_back(now);
        Ok(())
    }

    /// `submit(user_id, priority)`: enqueues and waits for a dispatch
    /// slot, honoring priority-desc/enqueue-asc ordering and the overall
    /// `REQUEST_TIMEOUT` budget.
    #[instrument(skip(self))]
    pub async fn submit(&self, user_id: &str, priority: u8) -> Result<LlmPermit<'_>, NyxError> {
        self.check_rate_limit(user_id).await?;

        let entry_id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let start = Instant::now();

        {
            let mut inner = self.inner.lock().await;
            if inner.heap.len() >= self.queue_max {
                self.counters.lock().await.rejected += 1;
                return Err(NyxError::QueueFull);
            }
            inner.heap.push(Entry { id: entry_id, priority: Priority(priority), enqueued_at: start });
            self.counters.lock().await.submitted += 1;
        }
        self.notify.notify_waiters();
        let mut guard = HeapGuard { queue: self, entry_id, armed: true };

        loop {
            {
                let mut inner = self.inner.lock().await;
                if inner.active < self.max_concurrent {
                    if let Some(top) = inner.heap.peek() {
                        if top.id == entry_id {
                            inner.heap.pop();
                            inner.active += 1;
                            guard.disarm();
                            return Ok(LlmPermit { queue: self });
                        }
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                let mut inner = self.inner.lock().await;
                inner.heap.retain(|e| e.id != entry_id);
                drop(inner);
                guard.disarm();
                self.counters.lock().await.timed_out += 1;
                return Err(NyxError::QueueTimeout);
            }

            let remaining = self.timeout - elapsed;
            let _ = tokio::time::timeout(remaining.min(POLL_INTERVAL), self.notify.notified()).await;
        }
    }

    pub async fn counters(&self) -> QueueCounters {
        *self.counters.lock().await
    }

    pub async fn queue_depth(&self) -> usize {
        self.inner.lock().await.heap.len()
    }

    pub async fn active(&self) -> usize {
        self.inner.lock().await.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn at_most_max_concurrent_permits_are_outstanding() {
        let queue = LlmQueue::new(1, 100, 5, 10);
        let first = queue.submit("ana", 0).await.unwrap();
        assert_eq!(queue.active().await, 1);
        drop(first);
        // Drop spawns the release; give it a turn to run.
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn queue_full_rejects_beyond_the_cap() {
        let queue = std::sync::Arc::new(LlmQueue::new(0, 100, 5, 1));
        // max_concurrent=0 means this waiter never dispatches; it stays
        // parked in the heap until the background task drops it.
        let parked = tokio::spawn({
            let queue = queue.clone();
            async move { queue.submit("ana", 0).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(queue.queue_depth().await, 1);

        let err = queue.submit("ivan", 0).await.unwrap_err();
        assert!(matches!(err, NyxError::QueueFull));
        parked.abort();
    }

    #[tokio::test]
    async fn cancelling_a_parked_submit_frees_its_heap_slot() {
        let queue = std::sync::Arc::new(LlmQueue::new(0, 100, 5, 1));
        let parked = tokio::spawn({
            let queue = queue.clone();
            async move { queue.submit("ana", 0).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(queue.queue_depth().await, 1);

        // Simulate a caller whose task gets aborted mid-wait (e.g. a
        // WebSocket handler racing a disconnect): the future is dropped
        // without ever reaching a return path inside submit().
        parked.abort();
        let _ = parked.await;
        // The guard's Drop spawns its own cleanup task; give it a turn.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(queue.queue_depth().await, 0);
        // A later submission must be able to take the freed slot rather
        // than being rejected as `QueueFull` by a stranded entry.
        let later = tokio::spawn({
            let queue = queue.clone();
            async move { queue.submit("ivan", 0).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(queue.queue_depth().await, 1);
        later.abort();
    }

    #[tokio::test]
    async fn rate_limit_trips_after_the_per_minute_cap() {
        let queue = LlmQueue::new(5, 2, 5, 10);
        let _a = queue.submit("ivan", 0).await.unwrap();
        let _b = queue.submit("ivan", 0).await.unwrap();
        let err = queue.check_rate_limit("ivan").await.unwrap_err();
        assert!(matches!(err, NyxError::RateLimited { .. }));
    }
}
