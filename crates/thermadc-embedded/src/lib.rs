//! thermadc Embedded - `embedded-hal` drivers for the acquisition chain
//!
//! This crate provides hardware drivers built only on `embedded-hal` 1.0
//! traits, so they run on a Raspberry Pi, a microcontroller or a simulator:
//! - Bit-banged and hardware SPI transports
//! - MCP3008 8-channel 10-bit ADC driver
//! - Divider-mounted thermistor on one ADC channel
//! - Retry wrapper for DHT22-class humidity sensors
//!
//! # Default Wiring (Raspberry Pi, BCM numbering)
//!
//! ```text
//! Software SPI:  CLK=18, MISO=23, MOSI=24, CS=25
//! Hardware SPI:  /dev/spidev0.0 (SCLK=11, MISO=9, MOSI=10, CE0=8)
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod drivers;

pub use drivers::bus::{BitBangSpi, BusError, BusTransport, HardwareSpi, SpiTransfer, TransportKind};
pub use drivers::hygrometer::{HumidityReading, Hygrometer};
pub use drivers::mcp3008::Mcp3008;
pub use drivers::thermistor::Thermistor;
pub use drivers::AdcReader;
