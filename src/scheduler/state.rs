//! The scheduler's state machine.
//!
//! Pure and synchronous: each event returns the actions the driver must
//! perform (arm or cancel the debounce timer, start a pass). The
//! single-in-flight invariant lives here. A pass is only started from
//! `Idle` or `Scheduled`, and the machine only leaves `Running` or
//! `QueuedWhileRunning` when the driver reports the pass complete.

use crate::provider::{ChangeNotice, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    /// A debounce timer is pending
    Scheduled,
    /// A pass is in flight
    Running,
    /// A pass is in flight and more work arrived meanwhile
    QueuedWhileRunning,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Scheduled => "scheduled",
            SchedulerState::Running => "running",
            SchedulerState::QueuedWhileRunning => "queued-while-running",
        };
        write!(f, "{}", name)
    }
}

/// What the driver must do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start or restart the debounce timer
    ArmTimer,
    CancelTimer,
    StartPass(Scope),
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub notifications: u64,
    pub passes_started: u64,
    pub passes_completed: u64,
    pub full_passes: u64,
    pub incremental_passes: u64,
    pub failed_passes: u64,
}

#[derive(Debug, Clone)]
pub struct SchedulerCore {
    state: SchedulerState,
    queued: BTreeSet<String>,
    bulk: bool,
    has_baseline: bool,
    /// An explicit run request is waiting for the in-flight pass to finish
    explicit_pending: bool,
    running: Option<Scope>,
    stats: SchedulerStats,
}

impl SchedulerCore {
    pub fn new(has_baseline: bool) -> Self {
        Self {
            state: SchedulerState::Idle,
            queued: BTreeSet::new(),
            bulk: false,
            has_baseline,
            explicit_pending: false,
            running: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn queued(&self) -> &BTreeSet<String> {
        &self.queued
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// A change notification from the surface.
    pub fn on_change(&mut self, notice: ChangeNotice) -> Vec<Action> {
        self.stats.notifications += 1;
        self.enqueue(notice);

        match self.state {
            SchedulerState::Idle | SchedulerState::Scheduled => {
                self.state = SchedulerState::Scheduled;
                vec![Action::ArmTimer]
            }
            SchedulerState::Running | SchedulerState::QueuedWhileRunning => {
                self.state = SchedulerState::QueuedWhileRunning;
                Vec::new()
            }
        }
    }

    /// The debounce timer fired.
    pub fn on_timer(&mut self) -> Vec<Action> {
        match self.state {
            SchedulerState::Scheduled => vec![self.start_pass()],
            // A timer that outlived its cycle.
            _ => Vec::new(),
        }
    }

    /// An explicit run request. `None` asks for a full pass.
    ///
    /// Skips the debounce, but while a pass is in flight the request is
    /// queued and served by the next pass.
    pub fn on_request(&mut self, elements: Option<BTreeSet<String>>) -> Vec<Action> {
        match elements {
            None => self.bulk = true,
            Some(ids) if ids.is_empty() => self.bulk = true,
            Some(ids) => self.queued.extend(ids),
        }

        match self.state {
            SchedulerState::Idle => vec![self.start_pass()],
            SchedulerState::Scheduled => vec![Action::CancelTimer, self.start_pass()],
            SchedulerState::Running | SchedulerState::QueuedWhileRunning => {
                self.explicit_pending = true;
                self.state = SchedulerState::QueuedWhileRunning;
                Vec::new()
            }
        }
    }

    /// The in-flight pass finished. A failed pass re-queues its scope so the
    /// next trigger retries it.
    pub fn on_pass_complete(&mut self, succeeded: bool) -> Vec<Action> {
        let Some(scope) = self.running.take() else {
            return Vec::new();
        };

        if succeeded {
            self.stats.passes_completed += 1;
            if scope == Scope::All {
                self.has_baseline = true;
            }
        } else {
            self.stats.failed_passes += 1;
            match scope {
                Scope::All => self.bulk = true,
                Scope::Elements(ids) => self.queued.extend(ids),
            }
        }

        match self.state {
            SchedulerState::QueuedWhileRunning if self.explicit_pending => {
                self.explicit_pending = false;
                vec![self.start_pass()]
            }
            SchedulerState::QueuedWhileRunning => {
                self.state = SchedulerState::Scheduled;
                vec![Action::ArmTimer]
            }
            _ => {
                self.state = SchedulerState::Idle;
                Vec::new()
            }
        }
    }

    fn enqueue(&mut self, notice: ChangeNotice) {
        match notice {
            ChangeNotice::Bulk => self.bulk = true,
            ChangeNotice::Element(id) => {
                self.queued.insert(id);
            }
        }
    }

    /// Full when a bulk change was seen, nothing specific is queued, or no
    /// baseline exists yet; otherwise incremental over the queue.
    fn start_pass(&mut self) -> Action {
        let full = self.bulk || self.queued.is_empty() || !self.has_baseline;
        let queued = std::mem::take(&mut self.queued);
        self.bulk = false;

        let scope = if full {
            self.stats.full_passes += 1;
            Scope::All
        } else {
            self.stats.incremental_passes += 1;
            Scope::Elements(queued)
        };

        self.stats.passes_started += 1;
        self.state = SchedulerState::Running;
        self.running = Some(scope.clone());
        Action::StartPass(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str) -> ChangeNotice {
        ChangeNotice::Element(id.to_string())
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_changes_rearm_timer_while_scheduled() {
        let mut core = SchedulerCore::new(true);
        assert_eq!(core.on_change(element("a")), vec![Action::ArmTimer]);
        assert_eq!(core.on_change(element("b")), vec![Action::ArmTimer]);
        assert_eq!(core.state(), SchedulerState::Scheduled);

        assert_eq!(
            core.on_timer(),
            vec![Action::StartPass(Scope::Elements(ids(&["a", "b"])))]
        );
        assert_eq!(core.state(), SchedulerState::Running);
        assert!(core.queued().is_empty());
    }

    #[test]
    fn test_first_pass_is_full() {
        let mut core = SchedulerCore::new(false);
        core.on_change(element("a"));
        assert_eq!(core.on_timer(), vec![Action::StartPass(Scope::All)]);
        core.on_pass_complete(true);

        core.on_change(element("b"));
        assert_eq!(
            core.on_timer(),
            vec![Action::StartPass(Scope::Elements(ids(&["b"])))]
        );
    }

    #[test]
    fn test_bulk_change_forces_full_pass() {
        let mut core = SchedulerCore::new(true);
        core.on_change(element("a"));
        core.on_change(ChangeNotice::Bulk);
        assert_eq!(core.on_timer(), vec![Action::StartPass(Scope::All)]);
    }

    #[test]
    fn test_change_while_running_is_queued_not_started() {
        let mut core = SchedulerCore::new(true);
        core.on_change(element("a"));
        core.on_timer();

        assert!(core.on_change(element("b")).is_empty());
        assert_eq!(core.state(), SchedulerState::QueuedWhileRunning);
        // Timer leftovers must not start a second pass.
        assert!(core.on_timer().is_empty());

        assert_eq!(core.on_pass_complete(true), vec![Action::ArmTimer]);
        assert_eq!(core.state(), SchedulerState::Scheduled);
        assert_eq!(
            core.on_timer(),
            vec![Action::StartPass(Scope::Elements(ids(&["b"])))]
        );
    }

    #[test]
    fn test_explicit_request_skips_debounce() {
        let mut core = SchedulerCore::new(true);
        core.on_change(element("a"));
        assert_eq!(
            core.on_request(None),
            vec![Action::CancelTimer, Action::StartPass(Scope::All)]
        );

        assert!(core.on_request(Some(ids(&["x"]))).is_empty());
        assert_eq!(
            core.on_pass_complete(true),
            vec![Action::StartPass(Scope::Elements(ids(&["x"])))]
        );
    }

    #[test]
    fn test_failed_pass_requeues_scope() {
        let mut core = SchedulerCore::new(true);
        core.on_change(element("a"));
        core.on_timer();

        assert!(core.on_pass_complete(false).is_empty());
        assert_eq!(core.state(), SchedulerState::Idle);
        assert!(core.queued().contains("a"));
        assert_eq!(core.stats().failed_passes, 1);

        core.on_change(element("b"));
        assert_eq!(
            core.on_timer(),
            vec![Action::StartPass(Scope::Elements(ids(&["a", "b"])))]
        );
    }

    #[test]
    fn test_failed_first_pass_keeps_no_baseline() {
        let mut core = SchedulerCore::new(false);
        core.on_request(None);
        core.on_pass_complete(false);

        core.on_change(element("a"));
        assert_eq!(core.on_timer(), vec![Action::StartPass(Scope::All)]);
    }

    #[test]
    fn test_completion_without_pass_is_ignored() {
        let mut core = SchedulerCore::new(true);
        assert!(core.on_pass_complete(true).is_empty());
        assert_eq!(core.stats().passes_completed, 0);
    }
}
