//! Forward error correction for over-the-air frames.
//!
//! - [`interleave`]: block (de-)interleaver
//! - [`codec`]: Reed-Solomon encode/decode with pad-marker framing
//!
//! # Example
//!
//! ```
//! use gs_radio_core::fec;
//!
//! let frame = fec::encode(b"hello satellite").unwrap();
//! assert_eq!(fec::decode(&frame).unwrap(), b"hello satellite");
//! ```

mod codec;
mod interleave;

pub use codec::{decode, encode, strip_padding, DecodeError, MAX_MESSAGE_LEN, NPAR, PAD_MARKER};
pub use interleave::{deinterleave, interleave, BLOCK_LEN, INTERLEAVER_COLS, INTERLEAVER_ROWS};
