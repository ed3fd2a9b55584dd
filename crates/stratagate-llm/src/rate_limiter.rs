//! Tokens-per-minute admission control.
//!
//! [`RateLimiter`] keeps a sliding 60-second window of `(timestamp, tokens)`
//! entries. `acquire` admits a request when the window total plus the
//! request's estimate fits the budget; otherwise it waits for the oldest
//! entries to age out.
//!
//! The window and the last-429 timestamp live under one mutex. The mutex is
//! never held across an `.await`; waiting happens on a timer keyed to when
//! enough entries will expire, capped at the poll interval so capacity
//! freed by other means is noticed promptly.
//!
//! Timestamps are [`tokio::time::Instant`], so tests can drive the window
//! with a paused clock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stratagate_types::config::RateLimitConfig;
use stratagate_types::usage::UsageSnapshot;

use crate::error::Result;
use crate::retry::sleep_or_cancel;

/// Length of the usage window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// A 429 older than this no longer escalates backoff.
const BACKOFF_MEMORY: Duration = Duration::from_secs(60);

/// Cap on the doubling exponent of the 429 backoff.
const MAX_BACKOFF_EXPONENT: u32 = 3;

#[derive(Debug, Default)]
struct WindowState {
    entries: VecDeque<(Instant, u64)>,
    last_429: Option<Instant>,
}

impl WindowState {
    /// Drop entries that have left the window. Entries are appended in
    /// time order, so expired ones are always at the front.
    fn prune(&mut self, now: Instant) {
        while let Some(&(ts, _)) = self.entries.front() {
            if now.saturating_duration_since(ts) >= WINDOW {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn total(&self) -> u64 {
        self.entries.iter().map(|(_, t)| *t).sum()
    }

    /// How long until enough entries expire for `needed` more tokens to fit.
    /// `None` when even an empty window would not fit them.
    fn wait_until_fits(&self, needed: u64, max_tpm: u64, now: Instant) -> Option<Duration> {
        if needed > max_tpm {
            return None;
        }
        let mut remaining = self.total();
        for &(ts, tokens) in &self.entries {
            remaining -= tokens;
            if remaining + needed <= max_tpm {
                return Some((ts + WINDOW).saturating_duration_since(now));
            }
        }
        Some(Duration::ZERO)
    }
}

/// Process-wide sliding-window token budget with 429 backoff.
#[derive(Debug)]
pub struct RateLimiter {
    max_tpm: u64,
    backoff_base: Duration,
    poll_interval: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// A limiter with the default 3 s backoff base and 0.5 s poll interval.
    pub fn new(max_tpm: u64) -> Self {
        Self {
            max_tpm,
            backoff_base: Duration::from_secs(3),
            poll_interval: Duration::from_millis(500),
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_tpm)
            .with_backoff_base(config.backoff_base())
            .with_poll_interval(config.poll_interval())
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn max_tpm(&self) -> u64 {
        self.max_tpm
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backoff owed for a 429 seen `since` ago:
    /// `base * 2^min(3, floor(secs / 10))`, or nothing once it is stale.
    fn backoff_after(&self, since: Duration) -> Option<Duration> {
        if since >= BACKOFF_MEMORY {
            return None;
        }
        let exponent = ((since.as_secs() / 10) as u32).min(MAX_BACKOFF_EXPONENT);
        Some(self.backoff_base.saturating_mul(2u32.pow(exponent)))
    }

    /// Wait for room for `estimated_tokens`, giving up after `timeout`.
    ///
    /// Returns `false` on timeout. A timeout too large to be represented as
    /// a deadline (such as `Duration::MAX`) waits without limit.
    pub async fn acquire(&self, estimated_tokens: u32, timeout: Duration) -> bool {
        self.acquire_with_cancel(estimated_tokens, timeout, &CancellationToken::new())
            .await
            .unwrap_or(false)
    }

    /// Cancellable [`acquire`](Self::acquire).
    ///
    /// A 429 seen within the last minute is honoured first by sleeping the
    /// owed backoff; the `timeout` budget starts after that sleep.
    pub async fn acquire_with_cancel(
        &self,
        estimated_tokens: u32,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let pending = {
            let state = self.lock();
            state
                .last_429
                .and_then(|t| self.backoff_after(Instant::now().saturating_duration_since(t)))
        };
        if let Some(delay) = pending {
            debug!(delay_ms = delay.as_millis() as u64, "applying pending 429 backoff");
            sleep_or_cancel(delay, cancel).await?;
        }

        let needed = u64::from(estimated_tokens);
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let wait = {
                let mut state = self.lock();
                let now = Instant::now();
                state.prune(now);
                let current = state.total();
                if current + needed <= self.max_tpm {
                    return Ok(true);
                }
                state.wait_until_fits(needed, self.max_tpm, now)
            };

            let mut sleep_for = wait.unwrap_or(self.poll_interval).min(self.poll_interval);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    warn!(
                        estimated_tokens,
                        max_tpm = self.max_tpm,
                        "rate limit capacity not available before timeout"
                    );
                    return Ok(false);
                }
                sleep_for = sleep_for.min(deadline - now);
            }
            let sleep_for = sleep_for.max(Duration::from_millis(1));
            sleep_or_cancel(sleep_for, cancel).await?;
        }
    }

    /// Record tokens actually consumed.
    pub fn record_tokens(&self, tokens: u32) {
        let mut state = self.lock();
        let now = Instant::now();
        state.entries.push_back((now, u64::from(tokens)));
        state.prune(now);
    }

    /// React to an HTTP 429 from a provider.
    ///
    /// If the previous 429 was under a minute ago, sleep the escalating
    /// backoff. Either way this 429 becomes the new reference point.
    pub async fn handle_429_error(&self) {
        let _ = self
            .handle_429_error_with_cancel(&CancellationToken::new())
            .await;
    }

    /// Cancellable [`handle_429_error`](Self::handle_429_error).
    pub async fn handle_429_error_with_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        let delay = {
            let state = self.lock();
            state
                .last_429
                .and_then(|t| self.backoff_after(Instant::now().saturating_duration_since(t)))
        };

        let slept = match delay {
            Some(delay) => {
                warn!(delay_ms = delay.as_millis() as u64, "repeated 429, backing off");
                sleep_or_cancel(delay, cancel).await
            }
            None => Ok(()),
        };

        self.lock().last_429 = Some(Instant::now());
        slept
    }

    /// Snapshot of the trailing-minute usage.
    pub fn get_current_usage(&self) -> UsageSnapshot {
        let mut state = self.lock();
        state.prune(Instant::now());
        UsageSnapshot::new(state.total(), self.max_tpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn usage_sums_only_trailing_window() {
        let limiter = RateLimiter::new(10_000);
        limiter.record_tokens(100);
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.record_tokens(200);
        assert_eq!(limiter.get_current_usage().current_tpm, 300);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(limiter.get_current_usage().current_tpm, 200);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.get_current_usage().current_tpm, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_respects_budget() {
        let limiter = RateLimiter::new(1000);
        limiter.record_tokens(600);

        assert!(!limiter.acquire(500, Duration::from_millis(100)).await);
        assert!(limiter.acquire(300, Duration::from_millis(100)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_window_to_drain() {
        let limiter = RateLimiter::new(1000);
        limiter.record_tokens(900);

        let started = Instant::now();
        assert!(limiter.acquire(500, Duration::from_secs(90)).await);
        let waited = started.elapsed();
        assert!(waited >= WINDOW, "waited {waited:?}");
        assert!(waited < WINDOW + Duration::from_secs(1), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_request_times_out() {
        let limiter = RateLimiter::new(100);
        assert!(!limiter.acquire(101, Duration::from_secs(2)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_admits_when_capacity_is_free() {
        let limiter = RateLimiter::new(1000);
        assert!(limiter.acquire(10, Duration::MAX).await);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_waits_for_window_to_drain() {
        let limiter = RateLimiter::new(1000);
        limiter.record_tokens(1000);

        let started = Instant::now();
        assert!(limiter.acquire(10, Duration::MAX).await);
        assert!(started.elapsed() >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_fails_fast_when_full() {
        let limiter = RateLimiter::new(1000);
        limiter.record_tokens(1000);

        let started = Instant::now();
        assert!(!limiter.acquire(1, Duration::ZERO).await);
        assert!(started.elapsed() < Duration::from_millis(1));
        assert!(limiter.acquire(0, Duration::ZERO).await);
    }

    #[tokio::test(start_paused = true)]
    async fn exact_fit_is_admitted() {
        let limiter = RateLimiter::new(1000);
        limiter.record_tokens(600);
        assert!(limiter.acquire(400, Duration::ZERO).await);
    }

    #[test]
    fn huge_backoff_base_saturates() {
        let limiter = RateLimiter::new(1000).with_backoff_base(Duration::MAX);
        assert_eq!(
            limiter.backoff_after(Duration::from_secs(30)),
            Some(Duration::MAX)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_fields() {
        let limiter = RateLimiter::new(1000);
        limiter.record_tokens(250);
        let snap = limiter.get_current_usage();
        assert_eq!(snap.max_tpm, 1000);
        assert_eq!(snap.available_tpm, 750);
        assert!((snap.usage_percent - 25.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn first_429_does_not_sleep() {
        let limiter = RateLimiter::new(1000);
        let started = Instant::now();
        limiter.handle_429_error().await;
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_429_escalates() {
        let limiter = RateLimiter::new(1000);
        limiter.handle_429_error().await;

        // 5 s later: floor(5/10) = 0, so the base 3 s.
        tokio::time::advance(Duration::from_secs(5)).await;
        let started = Instant::now();
        limiter.handle_429_error().await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));

        // 25 s after that one: floor(25/10) = 2, so 3 * 4 = 12 s.
        tokio::time::advance(Duration::from_secs(25)).await;
        let started = Instant::now();
        limiter.handle_429_error().await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(12) && waited < Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_exponent_is_capped() {
        let limiter = RateLimiter::new(1000);
        assert_eq!(
            limiter.backoff_after(Duration::from_secs(55)),
            Some(Duration::from_secs(24))
        );
        assert_eq!(limiter.backoff_after(Duration::from_secs(60)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_applies_pending_backoff() {
        let limiter = RateLimiter::new(1000);
        limiter.handle_429_error().await;

        let started = Instant::now();
        assert!(limiter.acquire(10, Duration::from_millis(100)).await);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_429_is_forgotten() {
        let limiter = RateLimiter::new(1000);
        limiter.handle_429_error().await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let started = Instant::now();
        assert!(limiter.acquire(10, Duration::from_millis(100)).await);
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_wait() {
        let limiter = Arc::new(RateLimiter::new(100));
        limiter.record_tokens(100);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let result = limiter
            .acquire_with_cancel(50, Duration::from_secs(30), &cancel)
            .await;
        assert!(matches!(result, Err(crate::error::ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn concurrent_recording_is_consistent() {
        let limiter = Arc::new(RateLimiter::new(1_000_000));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    limiter.record_tokens(3);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(limiter.get_current_usage().current_tpm, 16 * 100 * 3);
    }
}
