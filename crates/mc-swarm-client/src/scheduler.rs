//! Per-connection task scheduler.
//!
//! Tasks receive the connection context explicitly and always run on the
//! connection worker, between ticks. Any thread may submit through a
//! [`SchedulerHandle`]; blocking work goes through [`SchedulerHandle::run_async`]
//! or [`SchedulerHandle::supply_async`] and reports back by scheduling again.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, Instrument};

use crate::error::BotError;

/// A unit of work run against the context `C`.
pub type Task<C> = Box<dyn FnMut(&mut C) -> Result<(), BotError> + Send>;

/// Shortest period accepted for repeating tasks.
const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    Once,
    FixedRate(Duration),
    FixedDelay(Duration),
}

struct Submission<C> {
    due: Instant,
    repeat: Repeat,
    task: Task<C>,
}

struct Scheduled<C> {
    due: Instant,
    seq: u64,
    repeat: Repeat,
    task: Task<C>,
}

impl<C> PartialEq for Scheduled<C> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<C> Eq for Scheduled<C> {}

impl<C> PartialOrd for Scheduled<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the earliest deadline first.
impl<C> Ord for Scheduled<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct SchedulerFlags {
    blocked: AtomicBool,
    shutdown: AtomicBool,
}

/// Cloneable submission side of a [`BotScheduler`].
pub struct SchedulerHandle<C> {
    tx: mpsc::UnboundedSender<Submission<C>>,
    flags: Arc<SchedulerFlags>,
}

impl<C> Clone for SchedulerHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            flags: Arc::clone(&self.flags),
        }
    }
}

impl<C> std::fmt::Debug for SchedulerHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("flags", &self.flags)
            .finish()
    }
}

impl<C: 'static> SchedulerHandle<C> {
    /// Run on the next worker iteration.
    pub fn schedule<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut C) -> Result<(), BotError> + Send + 'static,
    {
        self.schedule_delayed(Duration::ZERO, task)
    }

    pub fn schedule_delayed<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce(&mut C) -> Result<(), BotError> + Send + 'static,
    {
        let mut task = Some(task);
        self.submit(
            delay,
            Repeat::Once,
            Box::new(move |ctx| match task.take() {
                Some(task) => task(ctx),
                None => Ok(()),
            }),
        )
    }

    /// Run every `period`, measured between deadlines. Missed runs are
    /// caught up on the next worker iteration.
    pub fn schedule_at_fixed_rate<F>(&self, initial_delay: Duration, period: Duration, task: F) -> bool
    where
        F: FnMut(&mut C) -> Result<(), BotError> + Send + 'static,
    {
        self.submit(
            initial_delay,
            Repeat::FixedRate(period.max(MIN_PERIOD)),
            Box::new(task),
        )
    }

    /// Run repeatedly, waiting `delay` after each run.
    pub fn schedule_with_fixed_delay<F>(&self, initial_delay: Duration, delay: Duration, task: F) -> bool
    where
        F: FnMut(&mut C) -> Result<(), BotError> + Send + 'static,
    {
        self.submit(
            initial_delay,
            Repeat::FixedDelay(delay.max(MIN_PERIOD)),
            Box::new(task),
        )
    }

    fn submit(&self, delay: Duration, repeat: Repeat, task: Task<C>) -> bool {
        if self.is_blocked() {
            debug!("Scheduler is not accepting new tasks");
            return false;
        }
        let submission = Submission {
            due: Instant::now() + delay,
            repeat,
            task,
        };
        self.tx.send(submission).is_ok()
    }

    /// Run blocking work on the blocking pool. Errors and panics are logged.
    pub fn run_async<F>(&self, task: F) -> bool
    where
        F: FnOnce() -> Result<(), BotError> + Send + 'static,
    {
        if self.is_blocked() {
            debug!("Scheduler is not accepting new tasks");
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("run_async called outside of a tokio runtime");
            return false;
        };
        let span = tracing::Span::current();
        runtime.spawn_blocking(move || {
            let _entered = span.enter();
            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Error in async task: {e}"),
                Err(panic) => error!("Error in async task: {}", BotError::from_panic(panic)),
            }
        });
        true
    }

    /// Compute a value on the blocking pool. The receiver fails if the task
    /// was refused or panicked.
    pub fn supply_async<T, F>(&self, task: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.run_async(move || {
            let _ = tx.send(task());
            Ok(())
        });
        rx
    }

    /// Refuse further submissions. Already queued tasks still run.
    pub fn block_new_tasks(&self) {
        self.flags.blocked.store(true, AtomicOrdering::SeqCst);
    }

    /// Refuse further submissions and drop everything still queued.
    pub fn shutdown(&self) {
        self.block_new_tasks();
        self.flags.shutdown.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_blocked(&self) -> bool {
        self.flags.blocked.load(AtomicOrdering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.flags.shutdown.load(AtomicOrdering::SeqCst)
    }
}

/// Worker side: owns the queue and runs due tasks against the context.
pub struct BotScheduler<C> {
    rx: mpsc::UnboundedReceiver<Submission<C>>,
    queue: BinaryHeap<Scheduled<C>>,
    next_seq: u64,
    handle: SchedulerHandle<C>,
}

impl<C: 'static> Default for BotScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> BotScheduler<C> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            queue: BinaryHeap::new(),
            next_seq: 0,
            handle: SchedulerHandle {
                tx,
                flags: Arc::new(SchedulerFlags::default()),
            },
        }
    }

    pub fn handle(&self) -> SchedulerHandle<C> {
        self.handle.clone()
    }

    /// Tasks waiting for their deadline.
    pub fn pending(&self) -> usize {
        self.queue.len() + self.rx.len()
    }

    fn push(&mut self, submission: Submission<C>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled {
            due: submission.due,
            seq,
            repeat: submission.repeat,
            task: submission.task,
        });
    }

    fn drain_submissions(&mut self) {
        while let Ok(submission) = self.rx.try_recv() {
            self.push(submission);
        }
    }

    /// Wait until a task is submitted or the earliest deadline passes.
    pub async fn wait(&mut self) {
        let next = self.queue.peek().map(|t| t.due);
        let received = tokio::select! {
            received = self.rx.recv() => received,
            _ = sleep_until(next) => None,
        };
        if let Some(submission) = received {
            self.push(submission);
        }
    }

    /// Run every task due now. Returns how many ran.
    pub fn run_due(&mut self, ctx: &mut C) -> usize {
        self.run_due_at(ctx, Instant::now())
    }

    pub fn run_due_at(&mut self, ctx: &mut C, now: Instant) -> usize {
        self.drain_submissions();
        let mut ran = 0;
        loop {
            if self.handle.is_shutdown() {
                if !self.queue.is_empty() {
                    debug!("Dropping {} scheduled tasks on shutdown", self.queue.len());
                    self.queue.clear();
                }
                break;
            }
            match self.queue.peek() {
                Some(next) if next.due <= now => {}
                _ => break,
            }
            let Some(mut scheduled) = self.queue.pop() else {
                break;
            };

            match catch_unwind(AssertUnwindSafe(|| (scheduled.task)(ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Error in scheduled task: {e}"),
                Err(panic) => error!("Error in scheduled task: {}", BotError::from_panic(panic)),
            }
            ran += 1;

            let next_due = match scheduled.repeat {
                Repeat::Once => None,
                Repeat::FixedRate(period) => Some(scheduled.due + period),
                Repeat::FixedDelay(delay) => Some(now + delay),
            };
            if let Some(due) = next_due {
                if !self.handle.is_shutdown() {
                    scheduled.due = due;
                    scheduled.seq = self.next_seq;
                    self.next_seq += 1;
                    self.queue.push(scheduled);
                }
            }
        }
        ran
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending::<()>().await,
    }
}

/// Spawn a future carrying the current span, for fire and forget work tied
/// to one connection.
pub fn spawn_in_span<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.instrument(tracing::Span::current()))
}
