//! Debounced restore passes.
//!
//! Hosts report tree mutations with [`RestoreScheduler::notify`] and ask
//! [`RestoreScheduler::poll`] whether a pass should run now. The clock is
//! injected so the behaviour is deterministic in tests.

use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A pass is due once the window has passed without new signals
    Pending { due: Instant },
    /// A pass is in flight; `requeued` records a signal seen meanwhile
    Running { requeued: bool },
}

#[derive(Debug, Clone)]
pub struct RestoreScheduler {
    window: Duration,
    state: SchedulerState,
}

impl Default for RestoreScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl RestoreScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Record a mutation signal. Signals inside the window push the pass back;
    /// signals during a pass queue exactly one follow-up.
    pub fn notify(&mut self, now: Instant) {
        self.state = match self.state {
            SchedulerState::Idle | SchedulerState::Pending { .. } => SchedulerState::Pending {
                due: now + self.window,
            },
            SchedulerState::Running { .. } => SchedulerState::Running { requeued: true },
        };
    }

    /// Whether a pass should start now. Returning `true` marks it running.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            SchedulerState::Pending { due } if now >= due => {
                self.state = SchedulerState::Running { requeued: false };
                true
            }
            _ => false,
        }
    }

    /// Mark the running pass as done.
    pub fn finish(&mut self, now: Instant) {
        self.state = match self.state {
            SchedulerState::Running { requeued: true } => SchedulerState::Pending {
                due: now + self.window,
            },
            SchedulerState::Running { requeued: false } => SchedulerState::Idle,
            other => other,
        };
    }

    /// Run `pass` if one is due and mark it finished afterwards.
    pub fn run_due<R>(&mut self, now: Instant, pass: impl FnOnce() -> R) -> Option<R> {
        if !self.poll(now) {
            return None;
        }
        let result = pass();
        self.finish(now);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_burst_of_signals_yields_one_pass() {
        let start = Instant::now();
        let mut scheduler = RestoreScheduler::new(ms(250));

        for offset in [0, 50, 100, 200] {
            scheduler.notify(start + ms(offset));
        }

        assert!(!scheduler.poll(start + ms(300)));
        assert!(scheduler.poll(start + ms(450)));
        assert!(!scheduler.poll(start + ms(460)));
    }

    #[test]
    fn test_signal_during_pass_requeues_once() {
        let start = Instant::now();
        let mut scheduler = RestoreScheduler::new(ms(250));
        scheduler.notify(start);
        assert!(scheduler.poll(start + ms(250)));

        scheduler.notify(start + ms(260));
        scheduler.notify(start + ms(270));
        assert_eq!(scheduler.state(), SchedulerState::Running { requeued: true });
        scheduler.finish(start + ms(300));

        assert_eq!(
            scheduler.state(),
            SchedulerState::Pending {
                due: start + ms(550)
            }
        );
        assert!(scheduler.poll(start + ms(550)));
        scheduler.finish(start + ms(560));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_run_due_skips_when_nothing_pending() {
        let mut scheduler = RestoreScheduler::default();
        let mut runs = 0;

        let result = scheduler.run_due(Instant::now(), || runs += 1);

        assert_eq!(result, None);
        assert_eq!(runs, 0);
    }

    #[test]
    fn test_run_due_runs_and_returns_to_idle() {
        let start = Instant::now();
        let mut scheduler = RestoreScheduler::new(ms(10));
        scheduler.notify(start);

        let result = scheduler.run_due(start + ms(10), || "ran");

        assert_eq!(result, Some("ran"));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
