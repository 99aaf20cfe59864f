//! Retry and polling helpers shared by every timed loop in the engine.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// `base * attempt` after the n-th failed attempt.
    Linear(Duration),
}

impl Backoff {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Linear(base) => base.saturating_mul(attempt),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(base),
        }
    }
}

#[derive(Debug)]
pub struct Retried<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `op` until it succeeds or `max_attempts` is reached (at least one attempt is made).
///
/// `op` receives the 1-based attempt number. The backoff sleep happens only between attempts,
/// never after the last one.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Retried<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) if attempt >= max_attempts => {
                return Retried {
                    result: Err(err),
                    attempts: attempt,
                }
            }
            Err(_) => {
                sleep(policy.backoff.delay_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollOutcome {
    pub satisfied: bool,
    pub polls: u32,
    pub waited: Duration,
}

/// Evaluate `condition` immediately and then every `interval` until it holds or `timeout`
/// has elapsed.
pub async fn poll_until<F, Fut>(interval: Duration, timeout: Duration, mut condition: F) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    let deadline = started + timeout;
    let mut polls = 0;
    loop {
        polls += 1;
        if condition().await {
            return PollOutcome {
                satisfied: true,
                polls,
                waited: started.elapsed(),
            };
        }
        let now = Instant::now();
        if now >= deadline {
            return PollOutcome {
                satisfied: false,
                polls,
                waited: started.elapsed(),
            };
        }
        sleep(interval.min(deadline - now)).await;
    }
}
