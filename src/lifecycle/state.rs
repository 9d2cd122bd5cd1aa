//! Lifecycle state machine.
//!
//! # States
//! ```text
//! NotStarted → Starting → Running → Draining → Stopped
//!                  │                              ▲
//!                  └──────── (init failure) ──────┘
//! ```
//!
//! Transitions are compare-and-swap, so `Running → Draining` can only
//! succeed once no matter how many callers race on it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Where the service is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    NotStarted = 0,
    Starting = 1,
    Running = 2,
    Draining = 3,
    Stopped = 4,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, cloneable view of the lifecycle state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<AtomicU8>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(LifecycleState::NotStarted as u8)),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move `from → to` if the current state is `from`.
    ///
    /// Returns `false` when another caller got there first.
    pub fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if moved {
            tracing::debug!(from = %from, to = %to, "Lifecycle transition");
        }
        moved
    }

    /// `Running → Draining`. True only for the first caller.
    pub fn begin_drain(&self) -> bool {
        self.transition(LifecycleState::Running, LifecycleState::Draining)
    }

    /// Enter the terminal state from wherever we are.
    pub fn stop(&self) {
        let previous = LifecycleState::from_u8(
            self.state.swap(LifecycleState::Stopped as u8, Ordering::SeqCst),
        );
        if previous != LifecycleState::Stopped {
            tracing::debug!(from = %previous, to = %LifecycleState::Stopped, "Lifecycle transition");
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::NotStarted);

        assert!(lifecycle.transition(LifecycleState::NotStarted, LifecycleState::Starting));
        assert!(lifecycle.transition(LifecycleState::Starting, LifecycleState::Running));
        assert!(lifecycle.begin_drain());
        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn rejects_out_of_order_transition() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.transition(LifecycleState::Starting, LifecycleState::Running));
        assert!(!lifecycle.begin_drain());
        assert_eq!(lifecycle.state(), LifecycleState::NotStarted);
    }

    #[test]
    fn drain_begins_once_across_threads() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::NotStarted, LifecycleState::Starting);
        lifecycle.transition(LifecycleState::Starting, LifecycleState::Running);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                std::thread::spawn(move || lifecycle.begin_drain())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(lifecycle.state(), LifecycleState::Draining);
    }

    #[test]
    fn failed_startup_stops() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::NotStarted, LifecycleState::Starting);
        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        assert!(!lifecycle.begin_drain());
    }
}
