//! Acquisition settings
//!
//! [`SamplerConfig`] carries everything the sampling loop needs besides the
//! ADC and the sink. It can be built from the CLI's channel/mode lists or
//! loaded from a JSON file; [`SamplerConfig::validate`] must pass before a
//! loop is started.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thermadc_core::types::{ChannelSpec, InputMode};
use thermadc_core::FramingError;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No channels to sample
    #[error("at least one channel must be configured")]
    NoChannels,

    /// A count that must be positive was zero
    #[error("{field} must be at least 1")]
    ZeroCount {
        /// Offending field
        field: &'static str,
    },

    /// More modes than channels
    #[error("{modes} modes given for {channels} channels")]
    TooManyModes {
        /// Number of modes supplied
        modes: usize,
        /// Number of channels supplied
        channels: usize,
    },

    /// Delay is negative, not finite, or too long to sleep for
    #[error("delay must be a non-negative number of seconds that fits a Duration, got {0}")]
    InvalidDelay(f64),

    /// Channel index or mode code rejected
    #[error(transparent)]
    Channel(#[from] FramingError),

    /// Config file could not be read
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`SamplerConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Sampling loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Ordered channels to sample, each with its mode
    pub channels: Vec<ChannelSpec>,
    /// Pause after each cycle (seconds)
    pub delay: f64,
    /// Sub-samples averaged into each record
    pub samp_size: u32,
    /// Records to collect; `None` runs until interrupted
    pub samp_num: Option<u64>,
    /// Records held in memory between flushes
    pub buff_size: usize,
    /// Record the standard deviation of each channel's sub-samples
    pub store_error: bool,
    /// Stop after this many aborted cycles in a row
    pub max_consecutive_failures: Option<u32>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            channels: vec![ChannelSpec::single_ended(0)],
            delay: 1.0,
            samp_size: 1,
            samp_num: None,
            buff_size: 1,
            store_error: false,
            max_consecutive_failures: None,
        }
    }
}

impl SamplerConfig {
    /// Build the channel list from parallel channel and mode lists.
    ///
    /// Missing trailing modes default to single-ended.
    ///
    /// # Errors
    ///
    /// [`ConfigError::TooManyModes`] if `modes` is longer than `channels`.
    pub fn from_lists(channels: &[u8], modes: &[InputMode]) -> ConfigResult<Self> {
        if modes.len() > channels.len() {
            return Err(ConfigError::TooManyModes {
                modes: modes.len(),
                channels: channels.len(),
            });
        }
        let channels = channels
            .iter()
            .enumerate()
            .map(|(i, &channel)| {
                ChannelSpec::new(channel, modes.get(i).copied().unwrap_or_default())
            })
            .collect();
        Ok(Self { channels, ..Self::default() })
    }

    /// Parse a JSON document. Absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed input.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check the settings against a device with `num_channels` inputs.
    ///
    /// # Errors
    ///
    /// The first violated constraint.
    pub fn validate(&self, num_channels: u8) -> ConfigResult<()> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        for spec in &self.channels {
            spec.validate(num_channels)?;
        }
        if self.samp_size == 0 {
            return Err(ConfigError::ZeroCount { field: "samp_size" });
        }
        if self.samp_num == Some(0) {
            return Err(ConfigError::ZeroCount { field: "samp_num" });
        }
        if self.buff_size == 0 {
            return Err(ConfigError::ZeroCount { field: "buff_size" });
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(ConfigError::ZeroCount { field: "max_consecutive_failures" });
        }
        if Duration::try_from_secs_f64(self.delay).is_err() {
            return Err(ConfigError::InvalidDelay(self.delay));
        }
        Ok(())
    }
}

/// Line format for text sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFormat {
    /// Field separator
    pub delimiter: String,
    /// Line terminator
    pub newline: String,
}

impl Default for TextFormat {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            newline: "\n".to_string(),
        }
    }
}
