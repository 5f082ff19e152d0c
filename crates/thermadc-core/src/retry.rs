//! Bounded retry policy for sensors that report their own read validity
//!
//! The MCP3008 path never retries: its responses carry no checksum, so every
//! transaction is final. Single-wire humidity sensors do validate their
//! frames, and a failed read is worth repeating after a short pause whose
//! length depends on how the read failed.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a single validated read failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadFailure {
    /// Sensor did not answer the start signal
    NoResponse,
    /// Frame received but its checksum did not match
    BadChecksum,
    /// Frame was truncated or had invalid timing
    CorruptedRead,
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response"),
            Self::BadChecksum => write!(f, "bad checksum"),
            Self::CorruptedRead => write!(f, "corrupted read"),
        }
    }
}

/// Terminal error after a policy gives up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetryError {
    /// Every allowed attempt failed
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Failure of the final attempt
        last: ReadFailure,
    },
    /// Policy allows no attempts at all
    NoAttempts,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "read failed after {attempts} attempts (last: {last})")
            }
            Self::NoAttempts => write!(f, "retry policy allows zero attempts"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RetryError {}

/// Attempt limit plus a delay table keyed by failure kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Pause after [`ReadFailure::NoResponse`] (ms)
    pub no_response_delay_ms: u32,
    /// Pause after [`ReadFailure::BadChecksum`] (ms)
    pub bad_checksum_delay_ms: u32,
    /// Pause after [`ReadFailure::CorruptedRead`] (ms)
    pub corrupted_read_delay_ms: u32,
}

impl RetryPolicy {
    /// Defaults for DHT22-class sensors.
    pub const DHT22: Self = Self {
        max_attempts: 10,
        no_response_delay_ms: 400,
        bad_checksum_delay_ms: 0,
        corrupted_read_delay_ms: 0,
    };

    /// Pause to take after `failure`.
    #[must_use]
    pub const fn delay_ms(&self, failure: ReadFailure) -> u32 {
        match failure {
            ReadFailure::NoResponse => self.no_response_delay_ms,
            ReadFailure::BadChecksum => self.bad_checksum_delay_ms,
            ReadFailure::CorruptedRead => self.corrupted_read_delay_ms,
        }
    }

    /// Run `attempt` until it succeeds or the policy is exhausted.
    ///
    /// `sleep_ms` is called between attempts, never after the last one.
    ///
    /// # Errors
    ///
    /// [`RetryError::Exhausted`] once `max_attempts` reads have failed.
    pub fn run<T>(
        &self,
        mut attempt: impl FnMut() -> Result<T, ReadFailure>,
        mut sleep_ms: impl FnMut(u32),
    ) -> Result<T, RetryError> {
        let mut last = None;
        for n in 1..=self.max_attempts {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    last = Some(failure);
                    if n < self.max_attempts {
                        sleep_ms(self.delay_ms(failure));
                    }
                }
            }
        }
        match last {
            Some(last) => Err(RetryError::Exhausted {
                attempts: self.max_attempts,
                last,
            }),
            None => Err(RetryError::NoAttempts),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DHT22
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeds_after_failures() {
        let policy = RetryPolicy::DHT22;
        let mut script = [
            Err(ReadFailure::NoResponse),
            Err(ReadFailure::BadChecksum),
            Ok(42),
        ]
        .into_iter();
        let mut slept = [0u32; 4];
        let mut sleeps = 0;

        let result = policy.run(
            || script.next().unwrap_or(Err(ReadFailure::CorruptedRead)),
            |ms| {
                slept[sleeps] = ms;
                sleeps += 1;
            },
        );

        assert_eq!(result, Ok(42));
        assert_eq!(sleeps, 2);
        assert_eq!(&slept[..2], &[400, 0]);
    }

    #[test]
    fn test_exhausted() {
        let policy = RetryPolicy { max_attempts: 3, ..RetryPolicy::DHT22 };
        let mut calls = 0;
        let mut sleeps = 0;

        let result: Result<(), _> = policy.run(
            || {
                calls += 1;
                Err(ReadFailure::NoResponse)
            },
            |_| sleeps += 1,
        );

        assert_eq!(
            result,
            Err(RetryError::Exhausted { attempts: 3, last: ReadFailure::NoResponse })
        );
        assert_eq!(calls, 3);
        assert_eq!(sleeps, 2);
    }

    #[test]
    fn test_zero_attempts() {
        let policy = RetryPolicy { max_attempts: 0, ..RetryPolicy::DHT22 };
        let result: Result<(), _> = policy.run(|| Ok(()), |_| {});
        assert_eq!(result, Err(RetryError::NoAttempts));
    }
}
