//! Timer primitives behind the value adjuster.
//!
//! Every timer hands back a [`CancellationToken`]; cancelling it guarantees
//! the task will not run again.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Time elapsed since the scheduler was created
    fn now(&self) -> Duration;

    /// Run `task` once after `delay`
    fn after(&self, delay: Duration, task: Task) -> CancellationToken;

    /// Run `task` every `period`, first one period from now
    fn every(&self, period: Duration, task: RepeatingTask) -> CancellationToken;
}

/// Timers on the tokio runtime. Must be used from within a runtime.
pub struct TokioScheduler {
    epoch: tokio::time::Instant,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            epoch: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn after(&self, delay: Duration, task: Task) -> CancellationToken {
        let token = CancellationToken::new();
        let guard = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(delay) => task(),
            }
        });
        token
    }

    fn every(&self, period: Duration, mut task: RepeatingTask) -> CancellationToken {
        let token = CancellationToken::new();
        let guard = token.clone();
        // interval_at panics on a zero period
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = guard.cancelled() => break,
                    _ = ticker.tick() => task(),
                }
            }
        });
        token
    }
}

enum TimerTask {
    Once(Task),
    Repeating(RepeatingTask, Duration),
}

struct Timer {
    id: u64,
    due: Duration,
    token: CancellationToken,
    task: TimerTask,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_id: u64,
    timers: Vec<Timer>,
}

/// Virtual clock that only moves when [`ManualScheduler::advance`] is called.
/// Due timers fire synchronously, in due order, on the caller's thread.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<Clock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, delay: Duration, task: TimerTask) -> CancellationToken {
        let token = CancellationToken::new();
        let mut clock = self.clock();
        let id = clock.next_id;
        clock.next_id += 1;
        let due = clock.now + delay;
        clock.timers.push(Timer {
            id,
            due,
            token: token.clone(),
            task,
        });
        token
    }

    /// Timers that are scheduled and not cancelled
    pub fn pending(&self) -> usize {
        self.clock()
            .timers
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Moves the clock forward, firing everything that comes due on the way
    pub fn advance(&self, by: Duration) {
        let target = self.clock().now + by;

        loop {
            // The lock is released before a task runs, tasks may schedule more
            let timer = {
                let mut clock = self.clock();
                clock.timers.retain(|t| !t.token.is_cancelled());
                let next = clock
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(i, _)| i);

                match next {
                    Some(index) => {
                        let timer = clock.timers.remove(index);
                        clock.now = timer.due;
                        timer
                    }
                    None => {
                        clock.now = target;
                        break;
                    }
                }
            };

            match timer.task {
                TimerTask::Once(task) => task(),
                TimerTask::Repeating(mut task, period) => {
                    task();
                    if !timer.token.is_cancelled() {
                        let mut clock = self.clock();
                        clock.timers.push(Timer {
                            id: timer.id,
                            due: timer.due + period,
                            token: timer.token,
                            task: TimerTask::Repeating(task, period),
                        });
                    }
                }
            }
        }
    }

    pub fn advance_ms(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.clock().now
    }

    fn after(&self, delay: Duration, task: Task) -> CancellationToken {
        self.push(delay, TimerTask::Once(task))
    }

    fn every(&self, period: Duration, task: RepeatingTask) -> CancellationToken {
        // A zero period would never let `advance` finish
        let period = period.max(Duration::from_millis(1));
        self.push(period, TimerTask::Repeating(task, period))
    }
}
