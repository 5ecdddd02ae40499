use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// How the delay grows between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Every retry waits the base delay.
    #[default]
    Constant,
    /// Retry `n` waits `delay * 2^(n - 1)`, capped at `max`.
    Exponential { max: Duration },
}

/// Decides, from the number of failed attempts so far, whether another attempt is made.
///
/// `max_retries` is the total attempt budget: with the default of 3 a runtime that never comes up
/// is tried exactly three times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            delay: Duration::from_secs(1),
            backoff: Backoff::Constant,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Attempt budget, never below one.
    pub fn budget(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if !self.enabled || retry_count >= self.budget() {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for(retry_count))
    }

    fn delay_for(&self, retry_count: u32) -> Duration {
        match self.backoff {
            Backoff::Constant => self.delay,
            Backoff::Exponential { max } => {
                let shift = retry_count.saturating_sub(1).min(31);
                self.delay.saturating_mul(1 << shift).min(max)
            }
        }
    }
}
