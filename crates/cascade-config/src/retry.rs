use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

/// How many times a node may run and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
  /// Total attempts including the first one. Zero is treated as one.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  #[serde(default)]
  pub backoff: Backoff,
  /// Error codes eligible for retry. Empty means every error code is retried.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub retry_on: Vec<String>,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
    Self {
      max_attempts,
      backoff,
      retry_on: Vec::new(),
    }
  }

  /// A single attempt, no retries.
  pub fn once() -> Self {
    Self::new(1, Backoff::None)
  }

  pub fn retry_on<I, S>(mut self, codes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.retry_on = codes.into_iter().map(Into::into).collect();
    self
  }

  pub fn attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }

  /// Whether an error with the given code may be retried under this policy.
  pub fn is_retryable(&self, error_code: Option<&str>) -> bool {
    if self.retry_on.is_empty() {
      return true;
    }
    error_code.is_some_and(|code| self.retry_on.iter().any(|c| c == code))
  }

  /// Delay before the given retry (1 = first retry).
  pub fn delay(&self, retry: u32) -> Duration {
    self.backoff.delay(retry)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::once()
  }
}

/// Delay function between attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
  /// Retry immediately.
  #[default]
  None,
  Fixed {
    delay_ms: u64,
  },
  Linear {
    initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    max_delay_ms: u64,
  },
  Exponential {
    initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    max_delay_ms: u64,
  },
  Fibonacci {
    initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    max_delay_ms: u64,
  },
}

impl Backoff {
  pub fn delay(&self, retry: u32) -> Duration {
    let retry = retry.max(1);
    let millis = match *self {
      Backoff::None => 0,
      Backoff::Fixed { delay_ms } => delay_ms,
      Backoff::Linear {
        initial_delay_ms,
        max_delay_ms,
      } => initial_delay_ms
        .saturating_mul(u64::from(retry))
        .min(max_delay_ms),
      Backoff::Exponential {
        initial_delay_ms,
        max_delay_ms,
      } => {
        let factor = 1u64.checked_shl(retry - 1).unwrap_or(u64::MAX);
        initial_delay_ms.saturating_mul(factor).min(max_delay_ms)
      }
      Backoff::Fibonacci {
        initial_delay_ms,
        max_delay_ms,
      } => initial_delay_ms
        .saturating_mul(fibonacci(retry))
        .min(max_delay_ms),
    };
    Duration::from_millis(millis)
  }
}

/// fib(1) = 1, fib(2) = 1, fib(3) = 2, ...
fn fibonacci(n: u32) -> u64 {
  let (mut a, mut b) = (0u64, 1u64);
  for _ in 1..n {
    (a, b) = (b, a.saturating_add(b));
  }
  b
}

fn default_max_attempts() -> u32 {
  1
}

fn default_max_delay_ms() -> u64 {
  DEFAULT_MAX_DELAY_MS
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_exponential_backoff_is_capped() {
    let backoff = Backoff::Exponential {
      initial_delay_ms: 100,
      max_delay_ms: 1_000,
    };
    assert_eq!(backoff.delay(1), Duration::from_millis(100));
    assert_eq!(backoff.delay(2), Duration::from_millis(200));
    assert_eq!(backoff.delay(4), Duration::from_millis(800));
    assert_eq!(backoff.delay(5), Duration::from_millis(1_000));
    assert_eq!(backoff.delay(80), Duration::from_millis(1_000));
  }

  #[test]
  fn test_linear_and_fibonacci_backoff() {
    let linear = Backoff::Linear {
      initial_delay_ms: 50,
      max_delay_ms: 10_000,
    };
    assert_eq!(linear.delay(3), Duration::from_millis(150));

    let fib = Backoff::Fibonacci {
      initial_delay_ms: 10,
      max_delay_ms: 10_000,
    };
    let delays: Vec<u64> = (1..=6).map(|n| fib.delay(n).as_millis() as u64).collect();
    assert_eq!(delays, vec![10, 10, 20, 30, 50, 80]);
  }

  #[test]
  fn test_retry_on_filters_codes() {
    let policy = RetryPolicy::new(3, Backoff::None).retry_on(["TIMEOUT"]);
    assert!(policy.is_retryable(Some("TIMEOUT")));
    assert!(!policy.is_retryable(Some("HTTP_4xx")));
    assert!(!policy.is_retryable(None));

    assert!(RetryPolicy::once().is_retryable(Some("ANYTHING")));
  }

  #[test]
  fn test_deserialize_policy() {
    let policy: RetryPolicy = serde_json::from_value(json!({
      "max_attempts": 3,
      "backoff": { "type": "fixed", "delay_ms": 250 }
    }))
    .unwrap();
    assert_eq!(policy.attempts(), 3);
    assert_eq!(policy.delay(2), Duration::from_millis(250));

    let defaulted: RetryPolicy = serde_json::from_value(json!({})).unwrap();
    assert_eq!(defaulted, RetryPolicy::once());
  }
}
