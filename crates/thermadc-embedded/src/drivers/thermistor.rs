//! Thermistor on one ADC channel
//!
//! The thermistor sits on the lower leg of a divider against a standard
//! resistor; the ADC measures the midpoint single-ended. A reading averages
//! `sample_count` raw conversions before any conversion math.

use thermadc_core::math::constants::DEFAULT_SAMPLE_COUNT;
use thermadc_core::math::ThermistorCalibration;
use thermadc_core::types::{ChannelSpec, InputMode};
use thermadc_core::{FramingError, MathError, ThermistorError};

use super::AdcReader;

/// A thermistor bound to one ADC channel.
pub struct Thermistor<A> {
    adc: A,
    channel: u8,
    calibration: ThermistorCalibration,
    sample_count: usize,
}

impl<A: AdcReader> Thermistor<A> {
    /// Bind a thermistor to `channel` of `adc`.
    ///
    /// # Errors
    ///
    /// [`FramingError::ChannelOutOfRange`] if the ADC has no such channel.
    pub fn new(
        adc: A,
        channel: u8,
        calibration: ThermistorCalibration,
    ) -> Result<Self, FramingError> {
        ChannelSpec::single_ended(channel).validate(adc.num_channels())?;
        Ok(Self {
            adc,
            channel,
            calibration,
            sample_count: DEFAULT_SAMPLE_COUNT,
        })
    }

    /// Number of raw reads averaged by [`Self::temperature`].
    #[must_use]
    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Bound channel.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Calibration in use.
    pub fn calibration(&self) -> &ThermistorCalibration {
        &self.calibration
    }

    /// Mean divider voltage over `sample_count` conversions.
    ///
    /// # Errors
    ///
    /// [`MathError::NoSamples`] for a zero count; otherwise the first ADC
    /// failure, which aborts the whole reading.
    #[allow(clippy::cast_precision_loss)]
    pub fn read_voltage(&mut self, sample_count: usize) -> Result<f64, ThermistorError<A::Error>> {
        if sample_count == 0 {
            return Err(MathError::NoSamples.into());
        }
        let mut total: u64 = 0;
        for _ in 0..sample_count {
            let raw = self
                .adc
                .read_raw(self.channel, InputMode::SingleEnded)
                .map_err(ThermistorError::Adc)?;
            total += u64::from(raw.value());
        }
        let mean_raw = total as f64 / sample_count as f64;
        Ok(mean_raw * self.adc.scale())
    }

    /// Thermistor resistance (Ω) from the mean divider voltage.
    ///
    /// # Errors
    ///
    /// As [`Self::read_voltage`], plus [`MathError::NoDividerHeadroom`].
    pub fn read_resistance(
        &mut self,
        sample_count: usize,
    ) -> Result<f64, ThermistorError<A::Error>> {
        let voltage = self.read_voltage(sample_count)?;
        Ok(self
            .calibration
            .resistance(voltage, self.adc.reference_voltage())?)
    }

    /// Temperature (°C) from the mean divider voltage.
    ///
    /// # Errors
    ///
    /// As [`Self::read_resistance`], plus the Steinhart–Hart domain errors.
    pub fn read_temperature(
        &mut self,
        sample_count: usize,
    ) -> Result<f64, ThermistorError<A::Error>> {
        let resistance = self.read_resistance(sample_count)?;
        Ok(self.calibration.temperature_celsius(resistance)?)
    }

    /// Temperature (°C) using the configured sample count.
    ///
    /// # Errors
    ///
    /// As [`Self::read_temperature`].
    pub fn temperature(&mut self) -> Result<f64, ThermistorError<A::Error>> {
        self.read_temperature(self.sample_count)
    }

    /// Give the ADC back.
    pub fn release(self) -> A {
        self.adc
    }
}
