//! thermadc Native - host-side acquisition
//!
//! This crate runs on a Linux host (typically a Raspberry Pi) and provides:
//! - The sampling loop: timed, buffered, averaged multi-channel acquisition
//! - Record sinks writing delimited text with a metadata header
//! - JSON-loadable acquisition settings
//! - A bit-accurate MCP3008 simulator for development without hardware
//!
//! # Modules
//!
//! - [`config`]: Sampler settings and text format
//! - [`record`]: Records and run metadata
//! - [`sink`]: Record sinks
//! - [`sampler`]: The acquisition state machine
//! - [`simulate`]: MCP3008 simulator

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod record;
pub mod sampler;
pub mod simulate;
pub mod sink;

// Re-export key types
pub use config::{ConfigError, ConfigResult, SamplerConfig, TextFormat};
pub use record::{Metadata, Record};
pub use sampler::{Clock, SamplerError, SamplingLoop, SamplingOutcome, StopReason, SystemClock};
pub use simulate::{Mcp3008Model, SimulatedPins, SimulatedSpiDevice};
pub use sink::{MemorySink, RecordSink, SinkError, SinkResult, TextSink};
