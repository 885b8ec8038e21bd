//! Backoff strategies applied between retry attempts.

use std::time::Duration;

/// Computes how long a task waits before its next attempt.
///
/// `attempt` is the number of failed attempts so far, so the first retry
/// is asked for `delay(1)`.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Delay proportional to the attempt count: `step * attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub step: Duration,
}

impl LinearBackoff {
    pub const DEFAULT_STEP: Duration = Duration::from_millis(100);

    pub fn new(step: Duration) -> Self {
        Self { step }
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEP)
    }
}

impl Backoff for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}

/// Doubling delay starting at `base`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl ExponentialBackoff {
    /// Doublings stop here; anything past it is at the cap for sane inputs.
    const MAX_SHIFT: u32 = 20;

    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(Self::MAX_SHIFT);
        self.base.saturating_mul(1 << shift).min(self.max)
    }
}

/// Reproduces the delay of the service this executor replaced.
///
/// That service computed `100 * 2 ^ attempt` in a language where `^` is
/// XOR, so the real delay is `200 XOR attempt` milliseconds: roughly flat
/// around 200ms instead of growing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyBackoff;

impl Backoff for LegacyBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(u64::from((100 * 2) ^ attempt))
    }
}
