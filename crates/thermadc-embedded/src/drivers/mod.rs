//! Hardware drivers for the acquisition chain
//!
//! - [`bus`]: bit-banged and hardware SPI transports
//! - [`mcp3008`]: Microchip MCP3008 8-channel 10-bit ADC
//! - [`thermistor`]: divider-mounted thermistor on one ADC channel
//! - [`hygrometer`]: retry wrapper for self-validating humidity sensors

pub mod bus;
pub mod hygrometer;
pub mod mcp3008;
pub mod thermistor;

use thermadc_core::types::InputMode;
use thermadc_core::RawSample;

// ============================================================================
// ADC Contract
// ============================================================================

/// Minimal contract for a multi-channel ADC.
///
/// Consumers (the thermistor, the sampling loop) only see this trait, so a
/// real chip, a simulator or a test double are interchangeable.
pub trait AdcReader {
    /// Read failure; framing errors are reported before any bus activity.
    type Error: core::fmt::Debug + core::fmt::Display;

    /// One conversion, as raw counts in `[0, 2^bits - 1]`.
    ///
    /// # Errors
    ///
    /// Invalid channel or transport failure.
    fn read_raw(&mut self, channel: u8, mode: InputMode) -> Result<RawSample, Self::Error>;

    /// Volts per count.
    fn scale(&self) -> f64;

    /// Full-scale reference voltage.
    fn reference_voltage(&self) -> f64;

    /// Chip model name.
    fn model(&self) -> &'static str;

    /// Conversion resolution in bits.
    fn bit_resolution(&self) -> u8;

    /// Number of addressable channels.
    fn num_channels(&self) -> u8;

    /// One conversion scaled to volts.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_raw`].
    fn read(&mut self, channel: u8, mode: InputMode) -> Result<f64, Self::Error> {
        let raw = self.read_raw(channel, mode)?;
        Ok(f64::from(raw) * self.scale())
    }
}

impl<A: AdcReader + ?Sized> AdcReader for &mut A {
    type Error = A::Error;

    fn read_raw(&mut self, channel: u8, mode: InputMode) -> Result<RawSample, Self::Error> {
        (**self).read_raw(channel, mode)
    }

    fn scale(&self) -> f64 {
        (**self).scale()
    }

    fn reference_voltage(&self) -> f64 {
        (**self).reference_voltage()
    }

    fn model(&self) -> &'static str {
        (**self).model()
    }

    fn bit_resolution(&self) -> u8 {
        (**self).bit_resolution()
    }

    fn num_channels(&self) -> u8 {
        (**self).num_channels()
    }

    fn read(&mut self, channel: u8, mode: InputMode) -> Result<f64, Self::Error> {
        (**self).read(channel, mode)
    }
}
