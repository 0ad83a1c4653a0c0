//! Sliding-window rate limiter.
//!
//! Keeps a log of request instants per (caller, operation). Old instants are
//! pruned on access and idle keys are swept once the map grows past
//! [`SWEEP_THRESHOLD`] entries.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use z_ledger_core::LedgerError;

use crate::config::RateLimitRule;

/// Map size that triggers a sweep of idle keys.
const SWEEP_THRESHOLD: usize = 10_000;

/// Guarded operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Spendable balance transfer.
    Transfer,
    /// Withdrawal request.
    Withdrawal,
    /// Admin credit grant.
    AdminCredit,
}

type Key = (String, Operation);

/// In-memory sliding-window limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<Key, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request by `caller` now, or reject it.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` once `rule.max_requests` fall inside the window.
    pub fn check(&self, caller: &str, op: Operation, rule: RateLimitRule) -> Result<(), LedgerError> {
        self.check_at(caller, op, rule, Instant::now())
    }

    /// [`Self::check`] at an explicit instant.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` once `rule.max_requests` fall inside the window.
    pub fn check_at(
        &self,
        caller: &str,
        op: Operation,
        rule: RateLimitRule,
        now: Instant,
    ) -> Result<(), LedgerError> {
        let window = Duration::from_secs(rule.window_seconds);
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, log| log.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let log = windows.entry((caller.to_string(), op)).or_default();
        while log
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            log.pop_front();
        }

        if log.len() >= rule.max_requests {
            let oldest = log.front().copied().unwrap_or(now);
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            tracing::warn!(caller, operation = ?op, "Rate limit exceeded");
            return Err(LedgerError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        log.push_back(now);
        Ok(())
    }
}
