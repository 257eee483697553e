//! Press-and-hold stepping for numeric controls.
//!
//! A press nudges the value by one fine step right away. If the press is
//! still held after the hold delay the control switches to coarse steps on a
//! fixed period until it is released:
//!
//! ```text
//! Idle --press--> Armed --hold delay--> Accelerating
//!   ^               |                        |
//!   +----release----+-----------release------+
//! ```
//!
//! Each [`ValueAdjuster`] owns at most one session. Releasing, pressing
//! again, tearing down or dropping the adjuster cancels every timer of the
//! current session.

pub mod scheduler;

pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};

use crate::filters::Radius;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    fn signum(&self) -> i64 {
        match self {
            Direction::Increase => 1,
            Direction::Decrease => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    Accelerating,
}

/// Step sizes, timing and bounds of one control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjusterProfile {
    pub fine_step: i64,
    pub coarse_step: i64,
    pub hold_delay: Duration,
    pub repeat_period: Duration,
    pub min: i64,
    pub max: i64,
}

impl AdjusterProfile {
    /// Profile of the amenity radius controls
    pub fn radius() -> Self {
        Self {
            fine_step: 5,
            coarse_step: 10,
            hold_delay: Duration::from_millis(500),
            repeat_period: Duration::from_millis(100),
            min: Radius::MIN as i64,
            max: Radius::MAX as i64,
        }
    }
}

/// The value a control adjusts. `current` is read again before every step.
pub trait AdjustTarget: Send + Sync {
    fn current(&self) -> i64;
    fn apply(&self, value: i64);
}

/// `current + delta`, pinned to `[min, max]`
pub fn step_value(current: i64, delta: i64, min: i64, max: i64) -> i64 {
    current.saturating_add(delta).clamp(min, max)
}

struct Session {
    id: u64,
    direction: Direction,
    phase: Phase,
    started_at: Duration,
    hold_timer: CancellationToken,
    repeat_timer: Option<CancellationToken>,
}

impl Session {
    fn cancel(&self) {
        self.hold_timer.cancel();
        if let Some(timer) = &self.repeat_timer {
            timer.cancel();
        }
    }
}

struct Inner {
    label: String,
    profile: AdjusterProfile,
    scheduler: Arc<dyn Scheduler>,
    target: Arc<dyn AdjustTarget>,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Callers hold the session lock so no step can land after a release
    fn step(&self, direction: Direction, size: i64) {
        let current = self.target.current();
        let next = step_value(
            current,
            direction.signum() * size,
            self.profile.min,
            self.profile.max,
        );
        if next != current {
            trace!(control = %self.label, "{} -> {}", current, next);
            self.target.apply(next);
        }
    }

    fn begin_repeat(self: &Arc<Self>, id: u64) {
        let mut guard = self.session();
        let Some(session) = guard.as_mut() else {
            return;
        };
        if session.id != id || session.phase != Phase::Armed {
            return;
        }

        debug!(control = %self.label, "Hold detected, accelerating");
        session.phase = Phase::Accelerating;

        let weak = Arc::downgrade(self);
        session.repeat_timer = Some(self.scheduler.every(
            self.profile.repeat_period,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.repeat(id);
                }
            }),
        ));
    }

    fn repeat(&self, id: u64) {
        let guard = self.session();
        if let Some(session) = guard.as_ref() {
            if session.id == id && session.phase == Phase::Accelerating {
                self.step(session.direction, self.profile.coarse_step);
            }
        }
    }

    fn end(&self, reason: &str) {
        let ended = self.session().take();
        if let Some(session) = ended {
            session.cancel();
            let held = self.scheduler.now().saturating_sub(session.started_at);
            debug!(
                control = %self.label,
                phase = ?session.phase,
                held_ms = held.as_millis() as u64,
                "Gesture ended ({})",
                reason
            );
        }
    }
}

/// Accelerating press-and-hold controller for one control instance
pub struct ValueAdjuster {
    inner: Arc<Inner>,
}

impl ValueAdjuster {
    pub fn new(
        label: impl Into<String>,
        profile: AdjusterProfile,
        scheduler: Arc<dyn Scheduler>,
        target: Arc<dyn AdjustTarget>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                profile,
                scheduler,
                target,
                session: Mutex::new(None),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// Gesture start (press or touch-start)
    pub fn press(&self, direction: Direction) {
        let inner = &self.inner;
        let mut guard = inner.session();

        if let Some(previous) = guard.take() {
            debug!(control = %inner.label, "Press while active, restarting gesture");
            previous.cancel();
        }

        let id = inner.next_session.fetch_add(1, Ordering::Relaxed);
        inner.step(direction, inner.profile.fine_step);

        let weak: Weak<Inner> = Arc::downgrade(inner);
        let hold_timer = inner.scheduler.after(
            inner.profile.hold_delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.begin_repeat(id);
                }
            }),
        );

        *guard = Some(Session {
            id,
            direction,
            phase: Phase::Armed,
            started_at: inner.scheduler.now(),
            hold_timer,
            repeat_timer: None,
        });
    }

    /// Gesture end (release, pointer-leave, touch-end)
    pub fn release(&self) {
        self.inner.end("release");
    }

    /// The owning control is going away
    pub fn teardown(&self) {
        self.inner.end("teardown");
    }

    pub fn phase(&self) -> Phase {
        self.inner
            .session()
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or(Phase::Idle)
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl Drop for ValueAdjuster {
    fn drop(&mut self) {
        self.teardown();
    }
}
