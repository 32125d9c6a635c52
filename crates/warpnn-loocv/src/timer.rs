//! Explicit-state stopwatch and the cancellation token checked between rounds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::LoocvError;

/// Whether a [`StopWatch`] is currently accumulating time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not running.
    Disabled,
    /// Running since the given instant.
    Enabled {
        /// When the current interval began.
        since: Instant,
    },
}

/// Accumulating stopwatch. Misuse (double enable, double disable) is an error.
#[derive(Debug, Clone)]
pub struct StopWatch {
    name: &'static str,
    state: TimerState,
    accumulated_nanos: u64,
}

impl StopWatch {
    /// Create a disabled stopwatch with zero accumulated time.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_elapsed(name, 0)
    }

    /// Create a disabled stopwatch that resumes from `nanos` of prior time.
    #[must_use]
    pub fn with_elapsed(name: &'static str, nanos: u64) -> Self {
        Self {
            name,
            state: TimerState::Disabled,
            accumulated_nanos: nanos,
        }
    }

    /// Start accumulating.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::TimerAlreadyEnabled`] if already running.
    pub fn enable(&mut self) -> Result<(), LoocvError> {
        match self.state {
            TimerState::Enabled { .. } => Err(LoocvError::TimerAlreadyEnabled { timer: self.name }),
            TimerState::Disabled => {
                self.state = TimerState::Enabled {
                    since: Instant::now(),
                };
                Ok(())
            }
        }
    }

    /// Stop accumulating and fold the running interval into the total.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::TimerAlreadyDisabled`] if not running.
    pub fn disable(&mut self) -> Result<(), LoocvError> {
        match self.state {
            TimerState::Disabled => Err(LoocvError::TimerAlreadyDisabled { timer: self.name }),
            TimerState::Enabled { since } => {
                self.accumulated_nanos = self.accumulated_nanos.saturating_add(nanos_since(since));
                self.state = TimerState::Disabled;
                Ok(())
            }
        }
    }

    /// Require the stopwatch to be stopped.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::TimerAlreadyEnabled`] if running.
    pub fn check_disabled(&self) -> Result<(), LoocvError> {
        match self.state {
            TimerState::Disabled => Ok(()),
            TimerState::Enabled { .. } => Err(LoocvError::TimerAlreadyEnabled { timer: self.name }),
        }
    }

    /// Total accumulated time, including the running interval if enabled.
    #[must_use]
    pub fn elapsed_nanos(&self) -> u64 {
        match self.state {
            TimerState::Disabled => self.accumulated_nanos,
            TimerState::Enabled { since } => {
                self.accumulated_nanos.saturating_add(nanos_since(since))
            }
        }
    }

    /// Return the current state.
    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }
}

fn nanos_since(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Cooperative cancellation flag shared between the engine and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Honoured at the next round boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return true once [`cancel`][Self::cancel] has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
