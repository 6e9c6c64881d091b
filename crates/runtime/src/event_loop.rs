//! Task queue, delayed-event heap, and the worker pool.
//!
//! Channels push tasks for immediate dispatch and schedule events for
//! delayed delivery.  A fixed pool of worker tasks drains the FIFO task
//! queue; the caller of [`EventLoop::run`] drives event dispatch in
//! expiration order.  Shutdown is cooperative: the shared flag is
//! checked between tasks and before every dispatch.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use cq_domain::error::{Error, Result};
use cq_domain::shutdown::ShutdownFlag;

/// Fixed worker pool size.
pub const WORKER_COUNT: usize = 4;

/// Dispatcher sleep when no event is pending.
const IDLE_POLL: Duration = Duration::from_millis(50);
/// Bounds on the dispatcher's wait for the earliest pending event.
const MIN_EVENT_WAIT: Duration = Duration::from_millis(1);
const MAX_EVENT_WAIT: Duration = Duration::from_millis(100);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tasks and events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An immediate, non-time-ordered unit of work.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub payload: Vec<u8>,
    /// Originating channel tag, e.g. `"console"` or `"telegram"`.
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Custom,
    Shutdown,
}

/// A time-delayed unit of work with an absolute expiration.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub payload: Option<Vec<u8>>,
    /// Absolute expiration computed at scheduling time.
    pub due: Instant,
}

struct ScheduledEvent {
    /// Insertion sequence; breaks expiration ties first-in-first-out.
    seq: u64,
    event: Event,
}

impl ScheduledEvent {
    fn due(&self) -> Instant {
        self.event.due
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.due() == other.due() && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    /// Reversed so `BinaryHeap` (a max-heap) pops the earliest
    /// `(due, seq)` first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.due(), other.seq).cmp(&(self.due(), self.seq))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dispatched on a worker for every dequeued task.
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: Task) -> Result<()>;
}

/// Dispatched on the run loop for every due event.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventLoop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Inner {
    tasks: Mutex<VecDeque<Task>>,
    task_notify: Notify,
    pending_tasks: AtomicUsize,

    events: Mutex<BinaryHeap<ScheduledEvent>>,
    event_seq: AtomicU64,

    /// Generic offset used by polling channels to remember the last
    /// external id they saw.  Two's-complement wrapping; a channel that
    /// observes an upstream id reset simply stores the new value.
    offset: AtomicI64,

    shutdown: ShutdownFlag,
    running: AtomicBool,

    task_handler: Mutex<Option<Arc<dyn TaskHandler>>>,
    event_handler: Mutex<Option<Arc<dyn EventHandler>>>,
}

/// The scheduler: a FIFO task queue drained by [`WORKER_COUNT`] workers
/// plus a min-heap of delayed events drained by the run loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Arc<Inner>,
}

impl EventLoop {
    pub fn new(shutdown: ShutdownFlag) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(VecDeque::new()),
                task_notify: Notify::new(),
                pending_tasks: AtomicUsize::new(0),
                events: Mutex::new(BinaryHeap::new()),
                event_seq: AtomicU64::new(0),
                offset: AtomicI64::new(0),
                shutdown,
                running: AtomicBool::new(false),
                task_handler: Mutex::new(None),
                event_handler: Mutex::new(None),
            }),
        }
    }

    // ── Handler wiring (before `run` only) ─────────────────────────

    pub fn set_task_handler(&self, handler: Arc<dyn TaskHandler>) -> Result<()> {
        if self.inner.running.load(Ordering::SeqCst) {
            return Err(Error::Config(
                "task handler must be set before run()".into(),
            ));
        }
        *self.inner.task_handler.lock() = Some(handler);
        Ok(())
    }

    pub fn set_event_handler(&self, handler: Arc<dyn EventHandler>) -> Result<()> {
        if self.inner.running.load(Ordering::SeqCst) {
            return Err(Error::Config(
                "event handler must be set before run()".into(),
            ));
        }
        *self.inner.event_handler.lock() = Some(handler);
        Ok(())
    }

    // ── Producer API ───────────────────────────────────────────────

    /// Queue a task for immediate dispatch and wake one worker.
    pub fn submit_task(&self, id: &str, payload: &[u8], source: &str) {
        let task = Task {
            id: id.to_owned(),
            payload: payload.to_vec(),
            source: source.to_owned(),
        };
        self.inner.tasks.lock().push_back(task);
        self.inner.pending_tasks.fetch_add(1, Ordering::SeqCst);
        self.inner.task_notify.notify_one();
    }

    /// Schedule an event for delivery `delay` from now.  Never wakes
    /// workers; the run loop picks it up on its next pass.
    pub fn schedule_event(
        &self,
        id: &str,
        kind: EventKind,
        payload: Option<&[u8]>,
        delay: Duration,
    ) {
        let scheduled = ScheduledEvent {
            seq: self.inner.event_seq.fetch_add(1, Ordering::SeqCst),
            event: Event {
                id: id.to_owned(),
                kind,
                payload: payload.map(|p| p.to_vec()),
                due: Instant::now() + delay,
            },
        };
        self.inner.events.lock().push(scheduled);
    }

    /// Tasks queued but not yet dispatched.
    pub fn pending_tasks(&self) -> usize {
        self.inner.pending_tasks.load(Ordering::SeqCst)
    }

    // ── Offset (polling channels) ──────────────────────────────────

    pub fn offset(&self) -> i64 {
        self.inner.offset.load(Ordering::SeqCst)
    }

    pub fn update_offset(&self, value: i64) {
        self.inner.offset.store(value, Ordering::SeqCst);
    }

    // ── Shutdown ───────────────────────────────────────────────────

    /// Set the shutdown flag and release any blocked workers.
    /// Idempotent: repeated calls leave the flag set and broadcast
    /// harmlessly.
    pub fn request_shutdown(&self) {
        self.inner.shutdown.trigger();
        self.inner.task_notify.notify_waiters();
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.inner.shutdown.clone()
    }

    // ── Run loop ───────────────────────────────────────────────────

    /// Spawn the worker pool and drive event dispatch until shutdown.
    ///
    /// Events at or past their expiration dispatch in ascending
    /// expiration order, ties in insertion order.  When the earliest
    /// event is not yet due the loop sleeps until it is, bounded to
    /// [1 ms, 100 ms]; with no events pending it sleeps 50 ms.
    pub async fn run(&self) {
        self.inner.running.store(true, Ordering::SeqCst);

        let workers: Vec<_> = (0..WORKER_COUNT)
            .map(|worker_id| {
                let inner = self.inner.clone();
                tokio::spawn(worker_loop(inner, worker_id))
            })
            .collect();

        while !self.inner.shutdown.is_triggered() {
            let next_due = self.drain_due_events().await;

            if self.inner.shutdown.is_triggered() {
                break;
            }
            match next_due {
                Some(due) => {
                    let wait = due
                        .saturating_duration_since(Instant::now())
                        .clamp(MIN_EVENT_WAIT, MAX_EVENT_WAIT);
                    tokio::time::sleep(wait).await;
                }
                None => tokio::time::sleep(IDLE_POLL).await,
            }
        }

        // Release blocked workers so they observe the flag and exit.
        self.inner.task_notify.notify_waiters();
        for worker in workers {
            let _ = worker.await;
        }
    }

    /// Dispatch every due event; return the next pending expiration.
    async fn drain_due_events(&self) -> Option<Instant> {
        loop {
            let now = Instant::now();
            let popped = {
                let mut heap = self.inner.events.lock();
                match heap.peek().map(|scheduled| scheduled.due()) {
                    Some(due) if due <= now => heap.pop(),
                    Some(due) => return Some(due),
                    None => return None,
                }
            };

            let Some(scheduled) = popped else { return None };
            let is_shutdown = scheduled.event.kind == EventKind::Shutdown;
            let event_id = scheduled.event.id.clone();

            let handler = self.inner.event_handler.lock().clone();
            if let Some(handler) = handler {
                if let Err(e) = handler.handle(scheduled.event).await {
                    tracing::warn!(event_id = %event_id, error = %e, "event handler failed");
                }
            }

            // A scheduled shutdown event is a delayed request_shutdown.
            if is_shutdown {
                self.request_shutdown();
                return None;
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn worker_loop(inner: Arc<Inner>, worker_id: usize) {
    loop {
        if inner.shutdown.is_triggered() {
            break;
        }

        // Register interest before re-checking the queue, so a wakeup
        // arriving between the check and the await is not lost.
        let notified = inner.task_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let task = inner.tasks.lock().pop_front();
        match task {
            Some(task) => {
                inner.pending_tasks.fetch_sub(1, Ordering::SeqCst);
                let task_id = task.id.clone();

                let handler = inner.task_handler.lock().clone();
                match handler {
                    Some(handler) => {
                        if let Err(e) = handler.handle(task).await {
                            tracing::warn!(
                                worker_id,
                                task_id = %task_id,
                                error = %e,
                                "task handler failed"
                            );
                        }
                    }
                    None => {
                        tracing::warn!(task_id = %task_id, "no task handler registered, dropping task");
                    }
                }
            }
            None => {
                if inner.shutdown.is_triggered() {
                    break;
                }
                notified.await;
            }
        }
    }

    tracing::debug!(worker_id, "worker exited");
}
