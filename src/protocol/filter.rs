//! Satellite packet filter.
//!
//! Matches a configured run of expected bytes at a fixed offset, so a
//! station tracking one satellite drops traffic from others on the same
//! channel. Frames starting with the `"Tiny"` test marker always pass.
//!
//! Stored in the legacy compact form `[length, offset, bytes...]`; a zero
//! length disables filtering.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Prefix of test frames that bypass every filter.
pub const TEST_MARKER: [u8; 4] = *b"Tiny";

/// Expected-bytes filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct PacketFilter {
    offset: usize,
    expected: Vec<u8>,
}

impl PacketFilter {
    /// Filter requiring `expected` at byte `offset`.
    pub fn new(offset: usize, expected: Vec<u8>) -> Self {
        Self { offset, expected }
    }

    /// Filter that passes everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Parse the compact `[length, offset, bytes...]` form.
    pub fn from_compact(bytes: &[u8]) -> Result<Self, ConfigError> {
        let len = match bytes.first() {
            None | Some(0) => return Ok(Self::disabled()),
            Some(&len) => len as usize,
        };
        let offset = *bytes
            .get(1)
            .ok_or_else(|| ConfigError::Invalid("filter without offset".into()))?
            as usize;
        let expected = bytes.get(2..2 + len).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "filter declares {} bytes, has {}",
                len,
                bytes.len().saturating_sub(2)
            ))
        })?;
        Ok(Self::new(offset, expected.to_vec()))
    }

    /// Compact `[length, offset, bytes...]` form.
    pub fn to_compact(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.expected.len() + 2);
        out.push(self.expected.len() as u8);
        out.push(self.offset as u8);
        out.extend_from_slice(&self.expected);
        out
    }

    /// Whether any bytes are checked.
    pub fn is_enabled(&self) -> bool {
        !self.expected.is_empty()
    }

    /// Offset of the first checked byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes expected at [`offset`](Self::offset).
    pub fn expected(&self) -> &[u8] {
        &self.expected
    }

    /// Whether `frame` should be kept.
    ///
    /// A frame too short to hold the checked bytes is rejected.
    pub fn passes(&self, frame: &[u8]) -> bool {
        if !self.is_enabled() || frame.starts_with(&TEST_MARKER) {
            return true;
        }
        self.expected
            .iter()
            .enumerate()
            .all(|(i, want)| frame.get(self.offset + i) == Some(want))
    }
}

impl TryFrom<Vec<u8>> for PacketFilter {
    type Error = ConfigError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_compact(&bytes)
    }
}

impl From<PacketFilter> for Vec<u8> {
    fn from(filter: PacketFilter) -> Vec<u8> {
        filter.to_compact()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norbi() -> PacketFilter {
        PacketFilter::new(1, vec![0xC0, 0x9D])
    }

    #[test]
    fn test_disabled_passes_everything() {
        let filter = PacketFilter::disabled();
        assert!(filter.passes(&[]));
        assert!(filter.passes(&[1, 2, 3]));
    }

    #[test]
    fn test_matching_bytes_pass() {
        assert!(norbi().passes(&[0x00, 0xC0, 0x9D, 0x42]));
    }

    #[test]
    fn test_mismatch_rejects() {
        assert!(!norbi().passes(&[0x00, 0xC0, 0x9E, 0x42]));
        assert!(!norbi().passes(&[0xC0, 0x9D, 0x00]));
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(!norbi().passes(&[0x00, 0xC0]));
    }

    #[test]
    fn test_test_marker_always_passes() {
        let filter = PacketFilter::new(0, vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        assert!(filter.passes(b"Tiny"));
        assert!(filter.passes(b"TinyGS-test "));
        assert!(!filter.passes(b"Tin"));
        assert!(!filter.passes(b"tinyGS"));
    }

    #[test]
    fn test_compact_form() {
        let filter = PacketFilter::from_compact(&[2, 1, 0xC0, 0x9D]).unwrap();
        assert_eq!(filter, norbi());
        assert_eq!(filter.to_compact(), vec![2, 1, 0xC0, 0x9D]);

        assert!(!PacketFilter::from_compact(&[0, 0]).unwrap().is_enabled());
        assert!(!PacketFilter::from_compact(&[]).unwrap().is_enabled());
        assert!(PacketFilter::from_compact(&[3, 0, 1]).is_err());
    }

    #[test]
    fn test_serde_uses_compact_array() {
        let json = serde_json::to_string(&norbi()).unwrap();
        assert_eq!(json, "[2,1,192,157]");
        let back: PacketFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, norbi());
    }
}
