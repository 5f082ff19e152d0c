//! Calibration math (`no_std` compatible)
//!
//! This module provides:
//! - Raw count to voltage scaling
//! - Voltage divider resistance for a thermistor on the lower leg
//! - The logarithmic Steinhart–Hart variant used for thermistor temperature
//! - Running mean and standard deviation for sub-sample averaging

use serde::{Deserialize, Serialize};

use crate::error::MathError;
use crate::types::RawSample;

// ============================================================================
// Constants
// ============================================================================

/// Physical and default acquisition constants
pub mod constants {
    /// Offset between kelvin and degrees Celsius
    pub const KELVIN_OFFSET: f64 = 273.15;

    /// Default ADC reference voltage (V)
    pub const DEFAULT_REFERENCE_VOLTAGE: f64 = 3.3;

    /// Default number of raw reads averaged per thermistor reading
    pub const DEFAULT_SAMPLE_COUNT: usize = 100;
}

use constants::KELVIN_OFFSET;

// ============================================================================
// ADC Scale
// ============================================================================

/// Fixed conversion from raw counts to volts.
///
/// `scale = reference_voltage / (2^resolution - 1)`; immutable once built.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdcScale {
    reference_voltage: f64,
    max_raw: u16,
}

impl AdcScale {
    /// Create a scale for a converter of `bit_resolution` bits.
    #[must_use]
    pub fn new(reference_voltage: f64, bit_resolution: u8) -> Self {
        let max_raw = ((1u32 << bit_resolution) - 1) as u16;
        Self { reference_voltage, max_raw }
    }

    /// Reference voltage (full-scale input).
    #[inline]
    #[must_use]
    pub const fn reference_voltage(&self) -> f64 {
        self.reference_voltage
    }

    /// Volts per count.
    #[inline]
    #[must_use]
    pub fn volts_per_count(&self) -> f64 {
        self.reference_voltage / f64::from(self.max_raw)
    }

    /// Convert a raw sample to volts.
    #[inline]
    #[must_use]
    pub fn to_volts(&self, raw: RawSample) -> f64 {
        f64::from(raw) * self.volts_per_count()
    }
}

// ============================================================================
// Thermistor Calibration
// ============================================================================

/// Thermistor calibration: divider resistor plus the logarithmic
/// Steinhart–Hart coefficients.
///
/// ```text
/// R        = V * R_std / (V_ref - V)
/// logR     = log10(R / R_25C)
/// T_kelvin = 1000 / (A + B*logR + C*logR^2)
/// ```
///
/// # Example
///
/// ```
/// use thermadc_core::math::ThermistorCalibration;
///
/// let cal = ThermistorCalibration::RSBR_302J_Z50;
/// // At R = R_25C the log term vanishes: T = 1000 / A
/// let t = cal.temperature_celsius(3000.0).unwrap();
/// assert!((t - (1000.0 / 3.3501 - 273.15)).abs() < 1e-9);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThermistorCalibration {
    /// Constant coefficient
    pub a: f64,
    /// Linear coefficient
    pub b: f64,
    /// Quadratic coefficient
    pub c: f64,
    /// Nominal resistance at 25 °C (Ω)
    pub r_25c: f64,
    /// Upper-leg divider resistor (Ω)
    pub r_std: f64,
}

impl ThermistorCalibration {
    /// RSBR-302J-Z50 teflon-coated 3 kΩ thermistor over a 3.19 kΩ resistor.
    pub const RSBR_302J_Z50: Self = Self {
        a: 3.3501,
        b: 0.5899,
        c: 0.0104,
        r_25c: 3000.0,
        r_std: 3190.0,
    };

    /// Create a calibration from explicit coefficients.
    #[must_use]
    pub const fn new(a: f64, b: f64, c: f64, r_25c: f64, r_std: f64) -> Self {
        Self { a, b, c, r_25c, r_std }
    }

    /// Thermistor resistance from the divider voltage.
    ///
    /// # Errors
    ///
    /// [`MathError::NoDividerHeadroom`] when `reference_voltage - voltage <= 0`.
    pub fn resistance(&self, voltage: f64, reference_voltage: f64) -> Result<f64, MathError> {
        let headroom = reference_voltage - voltage;
        if headroom <= 0.0 {
            return Err(MathError::NoDividerHeadroom {
                voltage,
                reference_voltage,
            });
        }
        Ok(voltage * self.r_std / headroom)
    }

    /// Absolute temperature for a thermistor resistance.
    ///
    /// # Errors
    ///
    /// [`MathError::NonPositiveResistance`] when `resistance <= 0`;
    /// [`MathError::ZeroDenominator`] when the polynomial vanishes.
    pub fn temperature_kelvin(&self, resistance: f64) -> Result<f64, MathError> {
        if resistance <= 0.0 {
            return Err(MathError::NonPositiveResistance { resistance });
        }
        let log_ratio = libm::log10(resistance / self.r_25c);
        let denominator = self.a + self.b * log_ratio + self.c * log_ratio * log_ratio;
        if denominator == 0.0 {
            return Err(MathError::ZeroDenominator { log_ratio });
        }
        Ok(1000.0 / denominator)
    }

    /// Temperature in degrees Celsius for a thermistor resistance.
    ///
    /// # Errors
    ///
    /// Same as [`Self::temperature_kelvin`].
    pub fn temperature_celsius(&self, resistance: f64) -> Result<f64, MathError> {
        self.temperature_kelvin(resistance).map(|t| t - KELVIN_OFFSET)
    }
}

impl Default for ThermistorCalibration {
    fn default() -> Self {
        Self::RSBR_302J_Z50
    }
}

// ============================================================================
// Running Statistics
// ============================================================================

/// Streaming mean and population standard deviation (Welford).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RunningStats {
    count: u32,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    /// Empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self { count: 0, mean: 0.0, m2: 0.0 }
    }

    /// Add one observation.
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / f64::from(self.count);
        self.m2 += delta * (value - self.mean);
    }

    /// Number of observations.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Arithmetic mean, `None` when empty.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Population standard deviation (divisor `n`), `None` when empty.
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        (self.count > 0).then(|| libm::sqrt(self.m2 / f64::from(self.count)))
    }
}

impl Extend<f64> for RunningStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn test_adc_scale() {
        let scale = AdcScale::new(3.3, 10);
        assert!((scale.volts_per_count() - 3.3 / 1023.0).abs() < 1e-12);
        assert!((scale.to_volts(RawSample::MAX) - 3.3).abs() < 1e-12);
        assert_eq!(scale.to_volts(RawSample::ZERO), 0.0);
    }

    #[test]
    fn test_resistance_midscale() {
        let cal = ThermistorCalibration::RSBR_302J_Z50;
        // V = V_ref / 2 => R = R_std
        let r = cal.resistance(1.65, 3.3).unwrap();
        assert!((r - 3190.0).abs() < TOL);
    }

    #[test]
    fn test_resistance_no_headroom() {
        let cal = ThermistorCalibration::RSBR_302J_Z50;
        assert!(matches!(
            cal.resistance(3.3, 3.3),
            Err(MathError::NoDividerHeadroom { .. })
        ));
        assert!(cal.resistance(3.4, 3.3).is_err());
    }

    #[test]
    fn test_temperature_matches_manual_calculation() {
        let cal = ThermistorCalibration::RSBR_302J_Z50;
        let mean_raw = 512.0_f64;
        let v = mean_raw * 3.3 / 1023.0;
        let r = v * 3190.0 / (3.3 - v);
        let log_r = libm::log10(r / 3000.0);
        let expected = 1000.0 / (3.3501 + 0.5899 * log_r + 0.0104 * log_r * log_r) - 273.15;

        let r_cal = cal.resistance(v, 3.3).unwrap();
        let t = cal.temperature_celsius(r_cal).unwrap();
        assert!((t - expected).abs() < TOL);
    }

    #[test]
    fn test_temperature_non_positive_resistance() {
        let cal = ThermistorCalibration::RSBR_302J_Z50;
        assert!(matches!(
            cal.temperature_kelvin(0.0),
            Err(MathError::NonPositiveResistance { .. })
        ));
    }

    #[test]
    fn test_temperature_zero_denominator() {
        let cal = ThermistorCalibration::new(0.0, 1.0, 0.0, 3000.0, 3190.0);
        assert!(matches!(
            cal.temperature_kelvin(3000.0),
            Err(MathError::ZeroDenominator { .. })
        ));
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::new();
        assert_eq!(stats.mean(), None);
        stats.extend([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count(), 8);
        assert!((stats.mean().unwrap() - 5.0).abs() < TOL);
        assert!((stats.std_dev().unwrap() - 2.0).abs() < TOL);
    }

    #[test]
    fn test_running_stats_single_value() {
        let mut stats = RunningStats::new();
        stats.push(1.25);
        assert_eq!(stats.std_dev(), Some(0.0));
    }
}
