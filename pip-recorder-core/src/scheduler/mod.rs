//! Single-threaded cooperative timer scheduler.
//!
//! Drives the compositor's render step and the recorder's chunk emission on a
//! virtual monotonic clock. The host event loop (or a test) calls
//! [`Scheduler::advance`]; every due tick runs to completion before the next
//! one starts, so timed steps never interleave.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// A periodic task. Runs with the scheduler unlocked, so it may clear timers.
pub type TimerTask = Box<dyn FnMut() + Send + 'static>;

/// Shortest accepted interval.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle returned by [`Scheduler::set_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    period: Duration,
    next_due: Duration,
    /// `None` while the task is executing.
    task: Option<TimerTask>,
}

struct SchedulerInner {
    now: Duration,
    next_id: u64,
    timers: Vec<Timer>,
}

/// Cloneable handle to a shared timer queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Mutex<SchedulerInner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner {
                now: Duration::ZERO,
                next_id: 0,
                timers: Vec::new(),
            })),
        }
    }

    /// Current virtual time since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Run `task` every `period`, first at `now + period`.
    pub fn set_interval<F>(&self, period: Duration, task: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.next_id += 1;
        let id = TimerId(inner.next_id);
        inner.timers.push(Timer {
            id,
            period,
            next_due: inner.now + period,
            task: Some(Box::new(task)),
        });
        log::debug!("Scheduled timer {:?} every {:?}", id, period);
        id
    }

    /// Cancel a timer. Returns `false` if it was already cleared.
    pub fn clear(&self, id: TimerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.timers.len();
        inner.timers.retain(|t| t.id != id);
        let removed = inner.timers.len() != before;
        if removed {
            log::debug!("Cleared timer {:?}", id);
        }
        removed
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.inner.lock().timers.iter().any(|t| t.id == id)
    }

    pub fn active_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }

    /// Advance the clock by `by`, running every tick that falls due in
    /// deadline order (ties in registration order). Returns the number of
    /// ticks executed.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.inner.lock().now + by;
        let mut fired = 0;

        loop {
            let (id, mut task) = {
                let mut guard = self.inner.lock();
                let inner = &mut *guard;
                let next = inner
                    .timers
                    .iter_mut()
                    .filter(|t| t.task.is_some() && t.next_due <= target)
                    .min_by_key(|t| (t.next_due, t.id));
                let Some(timer) = next else {
                    break;
                };
                let due = timer.next_due;
                timer.next_due += timer.period;
                let id = timer.id;
                let Some(task) = timer.task.take() else {
                    break;
                };
                inner.now = due;
                (id, task)
            };

            task();
            fired += 1;

            // Put the task back unless it was cleared while running.
            let mut inner = self.inner.lock();
            if let Some(timer) = inner.timers.iter_mut().find(|t| t.id == id) {
                timer.task = Some(task);
            }
        }

        let mut inner = self.inner.lock();
        if inner.now < target {
            inner.now = target;
        }
        fired
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("timers", &inner.timers.len())
            .finish()
    }
}
