// ABOUTME: Caller-supplied deadlines for write operations
// ABOUTME: Checked right before commit so an expired request never persists anything

use std::time::{Duration, Instant};

use thiserror::Error;

/// Returned when an operation runs past its deadline
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Operation deadline exceeded")]
pub struct DeadlineExceeded;

/// Point in time after which an operation must not commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline; the operation may take as long as storage needs
    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// Keep whichever of the two deadlines expires first
    pub fn min(self, other: Deadline) -> Deadline {
        match (self.at, other.at) {
            (Some(a), Some(b)) => Deadline::at(a.min(b)),
            (Some(_), None) => self,
            (None, _) => other,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.at, Some(at) if Instant::now() >= at)
    }

    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        if self.is_expired() {
            Err(DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}
