//! Inactivity monitor: one idle deadline per registered identity.
//!
//! `touch` replaces any pending deadline for a name with `now + timeout`, so
//! there is never more than one entry per name and the most recent touch
//! always wins. Every touch bumps a generation counter; an [`Expiry`] carries
//! the generation it was scheduled under, which lets callers tell a fresh
//! expiry from one that has since been superseded.
//!
//! The monitor does not run timers itself. The driver asks for
//! [`InactivityMonitor::next_deadline`], sleeps until then, and calls
//! [`InactivityMonitor::expire`] with the current time.

use std::{collections::HashMap, ops::Add, time::Duration};

use crate::error::MonitorError;

/// Default idle timeout before a named connection is disconnected.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// A deadline that has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry<I> {
    /// Identity whose deadline passed
    pub name: String,
    /// Generation of the touch that scheduled this deadline
    pub generation: u64,
    /// When the deadline was due
    pub deadline: I,
}

#[derive(Debug, Clone, Copy)]
struct Pending<I> {
    deadline: I,
    generation: u64,
}

/// Per-identity idle deadlines.
///
/// Generic over `Instant` to support both real and virtual time.
#[derive(Debug)]
pub struct InactivityMonitor<I> {
    timeout: Duration,
    pending: HashMap<String, Pending<I>>,
    next_generation: u64,
}

impl<I> InactivityMonitor<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create a monitor that expires identities after `timeout` of silence.
    ///
    /// # Errors
    ///
    /// - `MonitorError::ZeroTimeout` if `timeout` is zero
    pub fn new(timeout: Duration) -> Result<Self, MonitorError> {
        if timeout.is_zero() {
            return Err(MonitorError::ZeroTimeout(timeout));
        }

        Ok(Self { timeout, pending: HashMap::new(), next_generation: 1 })
    }

    /// Configured idle timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record activity for `name`, (re)scheduling its deadline at
    /// `now + timeout`. Returns the generation of the new deadline.
    pub fn touch(&mut self, name: &str, now: I) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;

        let pending = Pending { deadline: now + self.timeout, generation };
        match self.pending.get_mut(name) {
            Some(slot) => *slot = pending,
            None => {
                self.pending.insert(name.to_string(), pending);
            },
        }

        generation
    }

    /// Cancel any pending deadline for `name`.
    ///
    /// Returns `true` if a deadline was pending.
    pub fn cancel(&mut self, name: &str) -> bool {
        self.pending.remove(name).is_some()
    }

    /// Pending deadline for `name`. `None` if not monitored.
    pub fn deadline(&self, name: &str) -> Option<I> {
        self.pending.get(name).map(|p| p.deadline)
    }

    /// Generation of the pending deadline for `name`.
    pub fn generation(&self, name: &str) -> Option<u64> {
        self.pending.get(name).map(|p| p.generation)
    }

    /// Whether `generation` is still the live deadline for `name`.
    pub fn is_current(&self, name: &str, generation: u64) -> bool {
        self.generation(name) == Some(generation)
    }

    /// Earliest pending deadline across all names.
    pub fn next_deadline(&self) -> Option<I> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return every entry whose deadline is at or before `now`.
    ///
    /// Ordered by deadline, then name, so replays are deterministic.
    pub fn expire(&mut self, now: I) -> Vec<Expiry<I>> {
        let mut expired: Vec<Expiry<I>> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(name, p)| Expiry {
                name: name.clone(),
                generation: p.generation,
                deadline: p.deadline,
            })
            .collect();

        for expiry in &expired {
            self.pending.remove(&expiry.name);
        }

        expired.sort_by(|a, b| a.deadline.cmp(&b.deadline).then_with(|| a.name.cmp(&b.name)));
        expired
    }

    /// Number of monitored names.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is monitored.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `name` has a pending deadline.
    pub fn contains(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }
}
