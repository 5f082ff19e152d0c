//! Self-validating humidity sensors (DHT22 class)
//!
//! Unlike the MCP3008, these sensors checksum their frames, so a failed read
//! is detectable and worth repeating. The single-wire protocol itself is
//! platform specific; implementors only provide [`Hygrometer::read_once`].

use embedded_hal::delay::DelayNs;
use thermadc_core::{ReadFailure, RetryError, RetryPolicy};

/// One validated humidity/temperature reading.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HumidityReading {
    /// Relative humidity (%)
    pub humidity_percent: f32,
    /// Air temperature (°C)
    pub temperature_c: f32,
}

/// A sensor that can tell a good read from a bad one.
pub trait Hygrometer {
    /// A single read attempt.
    ///
    /// # Errors
    ///
    /// The [`ReadFailure`] kind decides how long to wait before retrying.
    fn read_once(&mut self) -> Result<HumidityReading, ReadFailure>;

    /// Read with retries, pausing per `policy` between attempts.
    ///
    /// # Errors
    ///
    /// [`RetryError::Exhausted`] once the policy gives up.
    fn read_with_retry<D: DelayNs>(
        &mut self,
        policy: &RetryPolicy,
        delay: &mut D,
    ) -> Result<HumidityReading, RetryError> {
        policy.run(|| self.read_once(), |ms| delay.delay_ms(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        script: Vec<Result<HumidityReading, ReadFailure>>,
        attempts: usize,
    }

    impl Hygrometer for Scripted {
        fn read_once(&mut self) -> Result<HumidityReading, ReadFailure> {
            let result = self
                .script
                .get(self.attempts)
                .copied()
                .unwrap_or(Err(ReadFailure::NoResponse));
            self.attempts += 1;
            result
        }
    }

    #[derive(Default)]
    struct TotalDelay {
        ns: u64,
    }

    impl DelayNs for TotalDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += u64::from(ns);
        }
    }

    const READING: HumidityReading = HumidityReading {
        humidity_percent: 45.5,
        temperature_c: 21.3,
    };

    #[test]
    fn test_retries_until_valid() {
        let mut sensor = Scripted {
            script: vec![
                Err(ReadFailure::NoResponse),
                Err(ReadFailure::BadChecksum),
                Ok(READING),
            ],
            attempts: 0,
        };
        let mut delay = TotalDelay::default();

        let reading = sensor.read_with_retry(&RetryPolicy::DHT22, &mut delay).unwrap();
        assert_eq!(reading, READING);
        assert_eq!(sensor.attempts, 3);
        // 400 ms after no-response, nothing after the bad checksum
        assert_eq!(delay.ns, 400_000_000);
    }

    #[test]
    fn test_gives_up_after_policy_limit() {
        let mut sensor = Scripted { script: Vec::new(), attempts: 0 };
        let mut delay = TotalDelay::default();

        let err = sensor.read_with_retry(&RetryPolicy::DHT22, &mut delay).unwrap_err();
        assert_eq!(
            err,
            RetryError::Exhausted { attempts: 10, last: ReadFailure::NoResponse }
        );
        assert_eq!(sensor.attempts, 10);
        assert_eq!(delay.ns, 9 * 400_000_000);
    }
}
