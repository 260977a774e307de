//! Process-wide token bucket.
//!
//! A single direct (not keyed) governor limiter is shared by every request:
//! one token is restored each `period`, at most `burst` are stored. Requests
//! never wait for a token; an empty bucket answers 429.
//!
//! Governor's GCRA admits one cell more than its burst once the state has
//! gone idle, but exactly the burst on a fresh limiter. Each request is
//! therefore charged two half-period cells against a burst of `2 * burst`,
//! which holds the capacity at `burst` in both states.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tracing::warn;

use crate::error::AppError;

/// Cells charged per request.
const CELLS_PER_REQUEST: NonZeroU32 = match NonZeroU32::new(2) {
    Some(cells) => cells,
    None => unreachable!(),
};

pub struct RateLimit<C: Clock = DefaultClock> {
    limiter: RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<C::Instant>>,
    clock: C,
    period: Duration,
}

impl RateLimit<DefaultClock> {
    pub fn new(period: Duration, burst: u32) -> anyhow::Result<Self> {
        Self::with_clock(period, burst, DefaultClock::default())
    }
}

impl<C: Clock> RateLimit<C> {
    pub fn with_clock(period: Duration, burst: u32, clock: C) -> anyhow::Result<Self> {
        let cells = burst
            .checked_mul(CELLS_PER_REQUEST.get())
            .and_then(NonZeroU32::new)
            .context("rate limit burst must be between 1 and u32::MAX / 2")?;
        let quota = Quota::with_period(period / CELLS_PER_REQUEST.get())
            .context("rate limit period must be greater than zero")?
            .allow_burst(cells);

        Ok(Self {
            limiter: RateLimiter::direct_with_clock(quota, &clock),
            clock,
            period,
        })
    }

    /// Take one token. On exhaustion returns how long until the next token
    /// becomes available.
    pub fn check(&self) -> Result<(), Duration> {
        match self.limiter.check_n(CELLS_PER_REQUEST) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(not_until)) => Err(not_until.wait_time_from(self.clock.now())),
            // The quota always holds at least two cells.
            Err(_) => Err(self.period),
        }
    }
}

/// Middleware rejecting requests once the shared bucket is empty.
pub async fn enforce_rate_limit(
    State(limit): State<Arc<RateLimit>>,
    request: Request,
    next: Next,
) -> Response {
    match limit.check() {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after_secs = retry_after_secs(wait);
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                retry_after_secs,
                "rate limit exceeded"
            );
            AppError::too_many_requests(retry_after_secs).into_response()
        }
    }
}

fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
