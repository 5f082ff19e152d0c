//! Core types for thermadc
//!
//! This module provides the small value types shared by every tier:
//! - [`InputMode`]: single-ended or differential conversion
//! - [`ChannelSpec`]: a (channel, mode) pair as configured for acquisition
//! - [`RawSample`]: a bounds-checked raw conversion result

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FramingError;
use crate::protocol::MAX_RAW;

// ============================================================================
// Input Mode
// ============================================================================

/// Analog input configuration for a single conversion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// Channel measured against ground (IN- = AGND)
    #[default]
    SingleEnded,
    /// Channel pair measured against each other
    Differential,
}

impl InputMode {
    /// SGL/DIFF bit as it appears at the top of the command byte.
    #[inline]
    #[must_use]
    pub const fn mode_bit(self) -> u8 {
        match self {
            Self::SingleEnded => 1,
            Self::Differential => 0,
        }
    }

    /// Short code used on the command line and in file headers.
    #[inline]
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::SingleEnded => 's',
            Self::Differential => 'd',
        }
    }

    /// Parse a short mode code (`s` or `d`).
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::UnknownMode`] for any other character.
    pub const fn from_code(code: char) -> Result<Self, FramingError> {
        match code {
            's' | 'S' => Ok(Self::SingleEnded),
            'd' | 'D' => Ok(Self::Differential),
            _ => Err(FramingError::UnknownMode { code }),
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SingleEnded => "single-ended",
            Self::Differential => "differential",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for InputMode {
    type Err = FramingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "single-ended" | "single" => Ok(Self::SingleEnded),
            "differential" | "diff" => Ok(Self::Differential),
            code => {
                let mut chars = code.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::from_code(c),
                    (first, _) => Err(FramingError::UnknownMode {
                        code: first.unwrap_or(' '),
                    }),
                }
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for InputMode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.name());
    }
}

// ============================================================================
// Channel Specification
// ============================================================================

/// One configured acquisition input: a channel index and its mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Channel index in `[0, NUM_CHANNELS)`
    pub channel: u8,
    /// Conversion mode for this channel
    #[serde(default)]
    pub mode: InputMode,
}

impl ChannelSpec {
    /// Create a channel spec.
    #[must_use]
    pub const fn new(channel: u8, mode: InputMode) -> Self {
        Self { channel, mode }
    }

    /// Single-ended spec for `channel`.
    #[must_use]
    pub const fn single_ended(channel: u8) -> Self {
        Self::new(channel, InputMode::SingleEnded)
    }

    /// Differential spec for `channel`.
    #[must_use]
    pub const fn differential(channel: u8) -> Self {
        Self::new(channel, InputMode::Differential)
    }

    /// Check the channel against a device's channel count.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::ChannelOutOfRange`] when `channel >= num_channels`.
    pub const fn validate(self, num_channels: u8) -> Result<Self, FramingError> {
        if self.channel < num_channels {
            Ok(self)
        } else {
            Err(FramingError::ChannelOutOfRange {
                channel: self.channel,
                num_channels,
            })
        }
    }

    /// Column label used in record files (`chanN`).
    #[must_use]
    pub fn label(self) -> ChannelLabel {
        ChannelLabel(self.channel)
    }
}

impl Default for ChannelSpec {
    fn default() -> Self {
        Self::single_ended(0)
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan{}:{}", self.channel, self.mode)
    }
}

/// `chanN` column label.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChannelLabel(u8);

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan{}", self.0)
    }
}

// ============================================================================
// Raw Sample
// ============================================================================

/// Raw 10-bit conversion result, always within `[0, MAX_RAW]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RawSample(u16);

impl RawSample {
    /// Zero counts
    pub const ZERO: Self = Self(0);

    /// Full-scale counts
    pub const MAX: Self = Self(MAX_RAW);

    /// Create from a count, rejecting values above full scale.
    #[inline]
    #[must_use]
    pub const fn new(value: u16) -> Option<Self> {
        if value <= MAX_RAW {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from a count, keeping only the low resolution bits.
    #[inline]
    #[must_use]
    pub const fn from_bits_truncate(value: u16) -> Self {
        Self(value & MAX_RAW)
    }

    /// Raw count.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl From<RawSample> for u16 {
    fn from(sample: RawSample) -> Self {
        sample.0
    }
}

impl From<RawSample> for f64 {
    fn from(sample: RawSample) -> Self {
        f64::from(sample.0)
    }
}

impl fmt::Display for RawSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RawSample {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.0);
    }
}
