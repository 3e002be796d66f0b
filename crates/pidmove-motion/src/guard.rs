//! [`RunGuard`] – timeout, tick budget and cancellation for control loops.
//!
//! Every movement primitive's run loop polls its stop condition until it
//! becomes true.  A guard bounds that loop: it is checked once per tick,
//! and when its deadline or tick budget is exhausted, or its
//! [`CancelToken`] is set, the behavior holds both drive motors and returns
//! [`MotionError::Timeout`] or [`MotionError::Cancelled`].
//!
//! [`RunGuard::default`] is unbounded: the loop runs until its stop
//! condition is met.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pidmove_motion::guard::{CancelToken, RunGuard};
//!
//! let cancel = CancelToken::new();
//! let guard = RunGuard::default()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_max_ticks(5_000)
//!     .with_cancel(cancel.clone());
//!
//! assert!(!cancel.is_cancelled());
//! cancel.cancel();
//! assert!(cancel.is_cancelled());
//! # let _ = guard;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use pidmove_hal::TwoWheelDrive;
use pidmove_types::{Behavior, MotionError};
use tracing::warn;

// ────────────────────────────────────────────────────────────────────────────
// CancelToken
// ────────────────────────────────────────────────────────────────────────────

/// A shared flag that asks a running behavior to stop.
///
/// Clones share the same flag, so one clone can be handed to a signal
/// handler while another is attached to a [`RunGuard`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for the next behavior.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RunGuard
// ────────────────────────────────────────────────────────────────────────────

/// Limits applied to a single run loop.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    timeout: Option<Duration>,
    max_ticks: Option<u64>,
    cancel: Option<CancelToken>,
}

impl RunGuard {
    /// Abort with [`MotionError::Timeout`] once `timeout` of wall-clock time
    /// has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort with [`MotionError::Timeout`] before starting tick
    /// `max_ticks + 1`.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn max_ticks(&self) -> Option<u64> {
        self.max_ticks
    }

    /// Begin a guarded run of `behavior`.  The clock starts now.
    pub fn start(&self, behavior: Behavior) -> GuardedRun<'_> {
        GuardedRun {
            guard: self,
            behavior,
            started: Instant::now(),
            ticks: 0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GuardedRun
// ────────────────────────────────────────────────────────────────────────────

/// Tick counter and clock of one run loop.
pub struct GuardedRun<'a> {
    guard: &'a RunGuard,
    behavior: Behavior,
    started: Instant,
    ticks: u64,
}

impl GuardedRun<'_> {
    /// Account for one more control tick.
    ///
    /// Call this before issuing the tick's motor commands.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::Cancelled`] or [`MotionError::Timeout`] when
    /// the guard has fired.  `drive` has already been commanded to hold when
    /// this happens.
    pub fn tick(&mut self, drive: &TwoWheelDrive) -> Result<(), MotionError> {
        if let Err(e) = self.check() {
            warn!(behavior = %self.behavior, ticks = self.ticks, error = %e, "run loop aborted, holding motors");
            if let Err(hold_err) = drive.hold() {
                warn!(behavior = %self.behavior, error = %hold_err, "hold after abort failed");
            }
            return Err(e);
        }
        self.ticks += 1;
        Ok(())
    }

    fn check(&self) -> Result<(), MotionError> {
        if self
            .guard
            .cancel
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
        {
            return Err(MotionError::Cancelled {
                behavior: self.behavior,
                ticks: self.ticks,
            });
        }

        let over_budget = self.guard.max_ticks.is_some_and(|max| self.ticks >= max);
        let elapsed = self.started.elapsed();
        let over_time = self.guard.timeout.is_some_and(|t| elapsed >= t);
        if over_budget || over_time {
            return Err(MotionError::Timeout {
                behavior: self.behavior,
                ticks: self.ticks,
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    /// Ticks accounted so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            elapsed: self.started.elapsed(),
        }
    }
}

/// How long a completed run loop took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub elapsed: Duration,
}
