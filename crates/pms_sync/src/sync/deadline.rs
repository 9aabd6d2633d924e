//! Wall-clock budget for a run.

use std::time::{Duration, Instant};

/// Start time and budget of a run, checked before each entity.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started_at: Instant,
    budget: Duration,
    /// `None` when the budget is too large to represent.
    deadline_at: Option<Instant>,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self::starting_at(Instant::now(), budget)
    }

    pub fn starting_at(started_at: Instant, budget: Duration) -> Self {
        Self {
            started_at,
            budget,
            deadline_at: started_at.checked_add(budget),
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline_at
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Whether the budget was already spent at `now`.
    pub fn is_exceeded_at(&self, now: Instant) -> bool {
        self.deadline_at.is_some_and(|deadline| now > deadline)
    }

    pub fn is_exceeded(&self) -> bool {
        self.is_exceeded_at(Instant::now())
    }
}
