//! Policies for controlling retry, wave size, and timeout behavior of
//! completion calls.

use tokio::time::Duration;

pub const DEFAULT_WAVE_SIZE: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Default)]
pub struct Policies {
  pub retry_policy:       RetryPolicy,
  pub concurrency_policy: ConcurrencyPolicy,
  pub timeout_policy:     TimeoutPolicy,
}

/// A policy for configuring how a single completion call retries before it
/// is reported as a failed entry.
#[derive(Clone, Debug)]
pub enum RetryPolicy {
  /// Retry the call immediately.
  Immediate {
    /// The number of retries attempted so far.
    current_retries: u32,
    /// The maximum number of retries to attempt.
    max_retries:     u32,
  },
  /// Retry the call after a delay.
  ConstantDelay {
    current_retries: u32,
    max_retries:     u32,
    /// The delay between retries.
    delay:           Duration,
  },
  /// Retry the call after a delay, with exponential backoff.
  ExponentialBackoff {
    current_retries: u32,
    max_retries:     u32,
    /// The initial delay between retries.
    initial_delay:   Duration,
    /// The maximum delay between retries.
    max_delay:       Duration,
  },
}

impl RetryPolicy {
  pub fn max_retries(&self) -> u32 {
    match self {
      RetryPolicy::Immediate { max_retries, .. } => *max_retries,
      RetryPolicy::ConstantDelay { max_retries, .. } => *max_retries,
      RetryPolicy::ExponentialBackoff { max_retries, .. } => *max_retries,
    }
  }

  /// Records a failed attempt, sleeping if the policy asks for it. Returns
  /// whether another attempt should be made.
  pub async fn failed_request(&mut self) -> bool {
    let (current_retries, max_retries, delay) = match self {
      RetryPolicy::Immediate {
        current_retries,
        max_retries,
      } => (current_retries, *max_retries, None),
      RetryPolicy::ConstantDelay {
        current_retries,
        max_retries,
        delay,
      } => (current_retries, *max_retries, Some(*delay)),
      RetryPolicy::ExponentialBackoff {
        current_retries,
        max_retries,
        initial_delay,
        max_delay,
      } => {
        let delay =
          exponential_backoff(*current_retries, *initial_delay, *max_delay);
        (current_retries, *max_retries, Some(delay))
      }
    };

    if *current_retries >= max_retries {
      return false;
    }
    *current_retries += 1;
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    true
  }

  /// A policy that never retries.
  pub fn never() -> Self {
    Self::immediate(0)
  }

  pub fn immediate(max_retries: u32) -> Self {
    Self::Immediate {
      current_retries: 0,
      max_retries,
    }
  }

  pub fn constant_delay(max_retries: u32, delay: Duration) -> Self {
    Self::ConstantDelay {
      current_retries: 0,
      max_retries,
      delay,
    }
  }

  pub fn exponential_backoff(
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
  ) -> Self {
    Self::ExponentialBackoff {
      current_retries: 0,
      max_retries,
      initial_delay,
      max_delay,
    }
  }
}

/// Never retries; a failed call is reported as an error entry.
impl Default for RetryPolicy {
  fn default() -> Self {
    Self::never()
  }
}

fn exponential_backoff(
  current_retries: u32,
  initial_delay: Duration,
  max_delay: Duration,
) -> Duration {
  let factor = 2u32.saturating_pow(current_retries);
  let delay = initial_delay.saturating_mul(factor);
  delay.min(max_delay)
}

/// How many completion calls may be in flight at once. Calls are issued in
/// waves of at most this size.
#[derive(Clone, Debug)]
pub struct ConcurrencyPolicy {
  pub max_concurrent_requests: usize,
}

impl ConcurrencyPolicy {
  /// A wave size of zero is treated as one.
  pub fn new(n: usize) -> Self {
    Self {
      max_concurrent_requests: n.max(1),
    }
  }
}

impl Default for ConcurrencyPolicy {
  fn default() -> Self {
    Self::new(DEFAULT_WAVE_SIZE)
  }
}

#[derive(Clone, Debug)]
pub struct TimeoutPolicy {
  pub timeout: Duration,
}

impl TimeoutPolicy {
  pub fn new(timeout: Duration) -> Self {
    Self { timeout }
  }
}

impl Default for TimeoutPolicy {
  fn default() -> Self {
    Self::new(DEFAULT_TIMEOUT)
  }
}
