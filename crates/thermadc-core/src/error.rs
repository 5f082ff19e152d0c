//! Error types for thermadc
//!
//! These errors work in `no_std` environments. Each one carries enough
//! context to diagnose a failure without heap allocation.

use core::fmt;

// ============================================================================
// Framing Errors
// ============================================================================

/// A request that cannot be encoded into a command frame.
///
/// Raised before the bus is touched, so no partial transaction ever occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// Channel index is not addressable on this device
    ChannelOutOfRange {
        /// Requested channel
        channel: u8,
        /// Number of channels the device exposes
        num_channels: u8,
    },
    /// Unrecognised input-mode code
    UnknownMode {
        /// The offending code
        code: char,
    },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelOutOfRange { channel, num_channels } => {
                write!(f, "channel {channel} out of range [0, {num_channels})")
            }
            Self::UnknownMode { code } => {
                write!(f, "unknown input mode '{code}' (expected 's' or 'd')")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FramingError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ChannelOutOfRange { channel, num_channels } => {
                defmt::write!(f, "Channel {} not in [0, {})", channel, num_channels);
            }
            Self::UnknownMode { code } => defmt::write!(f, "Unknown mode {}", code),
        }
    }
}

// ============================================================================
// ADC Driver Errors
// ============================================================================

/// Errors from an ADC read, generic over the transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdcError<E> {
    /// Request rejected before any bus activity
    Framing(FramingError),
    /// Transport failed during the transaction
    Bus(E),
}

impl<E> From<FramingError> for AdcError<E> {
    fn from(err: FramingError) -> Self {
        Self::Framing(err)
    }
}

impl<E: fmt::Display> fmt::Display for AdcError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framing(e) => write!(f, "framing error: {e}"),
            Self::Bus(e) => write!(f, "bus error: {e}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for AdcError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Framing(e) => defmt::write!(f, "Framing: {}", e),
            Self::Bus(e) => defmt::write!(f, "Bus: {}", e),
        }
    }
}

// ============================================================================
// Calibration Math Errors
// ============================================================================

/// A calibration computation with no finite result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MathError {
    /// Averaging requested over zero samples
    NoSamples,
    /// `V_ref - V` is zero or negative (open or shorted divider)
    NoDividerHeadroom {
        /// Measured divider voltage
        voltage: f64,
        /// ADC reference voltage
        reference_voltage: f64,
    },
    /// Logarithm of a non-positive resistance
    NonPositiveResistance {
        /// Computed resistance in ohms
        resistance: f64,
    },
    /// Calibration polynomial evaluated to zero
    ZeroDenominator {
        /// `log10(R / R_25C)` at which the polynomial vanished
        log_ratio: f64,
    },
}

impl fmt::Display for MathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSamples => write!(f, "cannot average zero samples"),
            Self::NoDividerHeadroom { voltage, reference_voltage } => write!(
                f,
                "divider voltage {voltage} V leaves no headroom below reference {reference_voltage} V"
            ),
            Self::NonPositiveResistance { resistance } => {
                write!(f, "resistance {resistance} Ω is not positive")
            }
            Self::ZeroDenominator { log_ratio } => {
                write!(f, "calibration polynomial is zero at log ratio {log_ratio}")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MathError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::NoSamples => defmt::write!(f, "No samples"),
            Self::NoDividerHeadroom { .. } => defmt::write!(f, "No divider headroom"),
            Self::NonPositiveResistance { .. } => defmt::write!(f, "Non-positive resistance"),
            Self::ZeroDenominator { .. } => defmt::write!(f, "Zero denominator"),
        }
    }
}

// ============================================================================
// Thermistor Errors
// ============================================================================

/// Errors from a thermistor reading: either the ADC or the math failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ThermistorError<E> {
    /// Underlying ADC read failed
    Adc(E),
    /// Conversion to resistance or temperature failed
    Math(MathError),
}

impl<E> From<MathError> for ThermistorError<E> {
    fn from(err: MathError) -> Self {
        Self::Math(err)
    }
}

impl<E: fmt::Display> fmt::Display for ThermistorError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adc(e) => write!(f, "ADC read failed: {e}"),
            Self::Math(e) => write!(f, "conversion failed: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FramingError {}

#[cfg(feature = "std")]
impl std::error::Error for MathError {}

#[cfg(feature = "std")]
impl<E: fmt::Debug + fmt::Display> std::error::Error for AdcError<E> {}

#[cfg(feature = "std")]
impl<E: fmt::Debug + fmt::Display> std::error::Error for ThermistorError<E> {}
