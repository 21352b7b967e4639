//! Reed-Solomon framing of over-the-air payloads.
//!
//! Uplink: RS-encode, append the `0xFF` pad marker, interleave.
//! Downlink: de-interleave, strip padding, RS-decode.

use super::interleave::{deinterleave, interleave};
use log::debug;
use reed_solomon::{Decoder, Encoder};
use std::fmt;

/// Parity bytes appended by the Reed-Solomon encoder.
pub const NPAR: usize = 16;

/// Pad marker terminating the coded buffer.
pub const PAD_MARKER: u8 = 0xFF;

/// Largest RS codeword (GF(256)).
const MAX_CODEWORD: usize = 255;

/// Largest message that still fits one 255-byte radio frame once coded.
pub const MAX_MESSAGE_LEN: usize = MAX_CODEWORD - NPAR - 1;

/// FEC pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Nothing to decode.
    Empty,
    /// Buffer shorter than the parity it must carry.
    TooShort { len: usize, min: usize },
    /// Buffer longer than one codeword / message limit.
    TooLong { len: usize, max: usize },
    /// More symbol errors than the code corrects.
    Uncorrectable,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty frame"),
            Self::TooShort { len, min } => {
                write!(f, "frame too short: {} bytes (min {})", len, min)
            }
            Self::TooLong { len, max } => {
                write!(f, "frame too long: {} bytes (max {})", len, max)
            }
            Self::Uncorrectable => write!(f, "uncorrectable symbol errors"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Effective length of `buf` once trailing padding is removed.
///
/// Scans backward for the first [`PAD_MARKER`]; the payload ends just before
/// it. Without a marker the whole buffer is payload.
pub fn strip_padding(buf: &[u8]) -> usize {
    buf.iter()
        .rposition(|&b| b == PAD_MARKER)
        .unwrap_or(buf.len())
}

/// Decode a received frame into its message.
pub fn decode(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut buf = deinterleave(raw);
    debug!("De-interleaved: {}", crate::hex(&buf));

    let len = strip_padding(&buf);
    buf.truncate(len);

    if len <= NPAR {
        return Err(DecodeError::TooShort {
            len,
            min: NPAR + 1,
        });
    }
    if len > MAX_CODEWORD {
        return Err(DecodeError::TooLong {
            len,
            max: MAX_CODEWORD,
        });
    }

    let decoder = Decoder::new(NPAR);
    let corrected = decoder
        .correct(&mut buf[..], None)
        .map_err(|_| DecodeError::Uncorrectable)?;
    let message = corrected.data().to_vec();
    debug_assert_eq!(message.len(), len - NPAR);
    Ok(message)
}

/// Encode a message for transmission; exact counterpart of [`decode`].
pub fn encode(message: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if message.is_empty() {
        return Err(DecodeError::Empty);
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(DecodeError::TooLong {
            len: message.len(),
            max: MAX_MESSAGE_LEN,
        });
    }

    let encoder = Encoder::new(NPAR);
    let mut coded = encoder.encode(message).to_vec();
    coded.push(PAD_MARKER);
    Ok(interleave(&coded))
}
