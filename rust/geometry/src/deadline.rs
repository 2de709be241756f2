// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deadlines and cooperative cancellation for exact kernel calls.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Expiry instant plus a shared cancel flag.
///
/// Clones share the flag, so cancelling one cancels every pairwise check
/// that was handed a clone of the same deadline.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// A deadline that never expires (can still be cancelled)
    pub fn none() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Expire at a fixed instant
    pub fn at(instant: Instant) -> Self {
        Self {
            expires_at: Some(instant),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal every holder of this deadline to stop
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once cancelled or past the expiry instant
    #[inline]
    pub fn is_expired(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Fail with [`Error::Timeout`] when expired
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(Error::Timeout)
        } else {
            Ok(())
        }
    }

    /// Time left before expiry, `None` for unbounded deadlines
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_deadline_never_expires() {
        let deadline = Deadline::none();
        assert!(deadline.check().is_ok());
        assert!(deadline.remaining().is_none());
    }

    #[test]
    fn test_elapsed_deadline_times_out() {
        let deadline = Deadline::after(Duration::ZERO);
        assert_eq!(deadline.check(), Err(Error::Timeout));
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let deadline = Deadline::none();
        let worker_copy = deadline.clone();
        deadline.cancel();
        assert!(worker_copy.is_expired());
    }
}
