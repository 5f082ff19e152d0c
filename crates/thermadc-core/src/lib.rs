//! thermadc Core - `no_std` compatible types and calibration math
//!
//! This crate provides the foundational pieces of the thermadc acquisition
//! stack. It is designed to work in `no_std` environments (microcontrollers)
//! as well as on a Linux host.
//!
//! # Modules
//!
//! - [`types`]: Input modes, channel specs and raw samples
//! - [`error`]: Error taxonomy for framing, ADC reads and calibration math
//! - [`protocol`]: MCP3008 command/response frame codec
//! - [`math`]: Count scaling, thermistor calibration, running statistics
//! - [`retry`]: Bounded retry policy for self-validating sensors
//!
//! # Features
//!
//! - `std`: Enable standard library support (`std::error::Error` impls)
//! - `defmt`: Enable `defmt` formatting for embedded logging
//!
//! # Example
//!
//! ```rust
//! use thermadc_core::protocol::{decode_response, encode_request};
//! use thermadc_core::types::InputMode;
//!
//! let request = encode_request(2, InputMode::SingleEnded).unwrap();
//! assert_eq!(request, [0x01, 0xA0, 0x00]);
//!
//! let raw = decode_response(&[0x00, 0x03, 0xFF]);
//! assert_eq!(raw.value(), 1023);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod math;
pub mod protocol;
pub mod retry;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{AdcError, FramingError, MathError, ThermistorError};
pub use math::{AdcScale, RunningStats, ThermistorCalibration};
pub use retry::{ReadFailure, RetryError, RetryPolicy};
pub use types::{ChannelSpec, InputMode, RawSample};
