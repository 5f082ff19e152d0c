//! MCP3008 command/response framing
//!
//! Every conversion is one 3-byte full-duplex exchange:
//!
//! ```text
//! out: 0000_0001  S D2 D1 D0 x x x x  xxxx_xxxx
//!      start bit  SGL/DIFF + channel   clocks for B7..B0
//! in:  ????_????  ? ? ? ? ? 0 B9 B8    B7 .. B0
//! ```
//!
//! The SGL/DIFF bit is `1` for single-ended and `0` for differential
//! (MCP3008 datasheet, table 5-2).

use crate::error::FramingError;
use crate::types::{InputMode, RawSample};

/// Chip model name reported in file headers.
pub const MODEL: &str = "MCP3008";

/// Number of addressable input channels.
pub const NUM_CHANNELS: u8 = 8;

/// Conversion resolution in bits.
pub const BIT_RESOLUTION: u8 = 10;

/// Largest raw count (`2^10 - 1`).
pub const MAX_RAW: u16 = (1 << BIT_RESOLUTION) - 1;

/// Leading byte carrying the start bit in its LSB.
pub const START_BYTE: u8 = 0x01;

/// Bytes per transaction, both directions.
pub const FRAME_LEN: usize = 3;

/// A single request/response buffer.
pub type Frame = [u8; FRAME_LEN];

/// Command byte `(mode_bit << 7) | (channel << 4)`.
///
/// # Errors
///
/// Returns [`FramingError::ChannelOutOfRange`] if `channel >= NUM_CHANNELS`.
#[inline]
pub const fn command_byte(channel: u8, mode: InputMode) -> Result<u8, FramingError> {
    if channel >= NUM_CHANNELS {
        return Err(FramingError::ChannelOutOfRange {
            channel,
            num_channels: NUM_CHANNELS,
        });
    }
    Ok((mode.mode_bit() << 7) | (channel << 4))
}

/// Build the outgoing frame for one conversion.
///
/// # Errors
///
/// Returns [`FramingError::ChannelOutOfRange`] if `channel >= NUM_CHANNELS`.
#[inline]
pub const fn encode_request(channel: u8, mode: InputMode) -> Result<Frame, FramingError> {
    match command_byte(channel, mode) {
        Ok(cmd) => Ok([START_BYTE, cmd, 0x00]),
        Err(e) => Err(e),
    }
}

/// Extract the 10-bit result from a response frame.
///
/// Any response is accepted: the chip provides no checksum.
#[inline]
#[must_use]
pub const fn decode_response(frame: &Frame) -> RawSample {
    let value = (((frame[1] & 0b11) as u16) << 8) | frame[2] as u16;
    RawSample::from_bits_truncate(value)
}

/// Response frame the chip would clock out for `raw`.
#[inline]
#[must_use]
pub const fn encode_response(raw: RawSample) -> Frame {
    let value = raw.value();
    [0x00, ((value >> 8) & 0b11) as u8, (value & 0xFF) as u8]
}

/// Inputs `(IN+, IN-)` sampled by a differential conversion on `channel`.
///
/// Channels pair up as CH0/CH1, CH2/CH3, ... with the even code putting
/// IN+ on the even input.
#[must_use]
pub const fn differential_pair(channel: u8) -> (u8, u8) {
    let base = channel & !1;
    if channel & 1 == 0 {
        (base, base + 1)
    } else {
        (base + 1, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_byte_all_channels() {
        for channel in 0..NUM_CHANNELS {
            assert_eq!(
                command_byte(channel, InputMode::SingleEnded),
                Ok((1 << 7) | (channel << 4))
            );
            assert_eq!(command_byte(channel, InputMode::Differential), Ok(channel << 4));
        }
    }

    #[test]
    fn test_command_byte_rejects_channel() {
        assert_eq!(
            command_byte(8, InputMode::SingleEnded),
            Err(FramingError::ChannelOutOfRange { channel: 8, num_channels: 8 })
        );
    }

    #[test]
    fn test_encode_request() {
        assert_eq!(encode_request(3, InputMode::SingleEnded), Ok([0x01, 0xB0, 0x00]));
        assert_eq!(encode_request(5, InputMode::Differential), Ok([0x01, 0x50, 0x00]));
    }

    #[test]
    fn test_decode_response() {
        let raw = decode_response(&[0xAA, 0b0000_0010, 0xFF]);
        assert_eq!(raw.value(), 767);
    }

    #[test]
    fn test_decode_ignores_high_bits() {
        let raw = decode_response(&[0xFF, 0xFF, 0xFF]);
        assert_eq!(raw.value(), MAX_RAW);
    }

    #[test]
    fn test_response_roundtrip() {
        for value in 0..=MAX_RAW {
            let raw = RawSample::from_bits_truncate(value);
            assert_eq!(decode_response(&encode_response(raw)), raw);
        }
    }

    #[test]
    fn test_differential_pair() {
        assert_eq!(differential_pair(0), (0, 1));
        assert_eq!(differential_pair(1), (1, 0));
        assert_eq!(differential_pair(6), (6, 7));
        assert_eq!(differential_pair(7), (7, 6));
    }
}
