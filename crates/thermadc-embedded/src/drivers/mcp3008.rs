//! Microchip MCP3008 driver
//!
//! 8 channels, 10-bit successive-approximation ADC on SPI mode 0,0.
//! Each [`AdcReader::read_raw`] call is exactly one 3-byte transaction;
//! there is no caching, buffering or retry.
//!
//! # Example
//!
//! ```ignore
//! let bus = BitBangSpi::new(clk, mosi, miso, cs)?;
//! let mut adc = Mcp3008::new(bus, 3.3);
//! let volts = adc.read(0, InputMode::SingleEnded)?;
//! ```

use thermadc_core::math::AdcScale;
use thermadc_core::protocol::{self, BIT_RESOLUTION, MODEL, NUM_CHANNELS};
use thermadc_core::types::InputMode;
use thermadc_core::{AdcError, RawSample};

use super::bus::{BusError, SpiTransfer};
use super::AdcReader;

/// MCP3008 on a fixed transport.
pub struct Mcp3008<T> {
    transport: T,
    scale: AdcScale,
}

impl<T: SpiTransfer> Mcp3008<T> {
    /// Create a driver with the given reference voltage.
    pub fn new(transport: T, reference_voltage: f64) -> Self {
        Self {
            transport,
            scale: AdcScale::new(reference_voltage, BIT_RESOLUTION),
        }
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the transport.
    pub fn release(self) -> T {
        self.transport
    }
}

impl<T: SpiTransfer> AdcReader for Mcp3008<T> {
    type Error = AdcError<BusError>;

    fn read_raw(&mut self, channel: u8, mode: InputMode) -> Result<RawSample, Self::Error> {
        // Rejects out-of-range channels before touching the bus
        let mut frame = protocol::encode_request(channel, mode)?;
        self.transport.transfer(&mut frame).map_err(AdcError::Bus)?;
        Ok(protocol::decode_response(&frame))
    }

    fn read(&mut self, channel: u8, mode: InputMode) -> Result<f64, Self::Error> {
        let raw = self.read_raw(channel, mode)?;
        Ok(self.scale.to_volts(raw))
    }

    fn scale(&self) -> f64 {
        self.scale.volts_per_count()
    }

    fn reference_voltage(&self) -> f64 {
        self.scale.reference_voltage()
    }

    fn model(&self) -> &'static str {
        MODEL
    }

    fn bit_resolution(&self) -> u8 {
        BIT_RESOLUTION
    }

    fn num_channels(&self) -> u8 {
        NUM_CHANNELS
    }
}
