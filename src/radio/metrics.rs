//! Link metrics and spurious-interrupt detection.
//!
//! Some boards re-trigger the RX interrupt without a new frame in the FIFO.
//! Such a retrigger reports exactly the same RSSI, SNR and frequency error as
//! the previous frame, so a bit-exact match against the last processed frame
//! is treated as spurious. Two genuinely identical back-to-back frames are
//! suppressed the same way.

use serde::Serialize;

/// Signal metrics of a received frame.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LinkMetrics {
    /// Received signal strength in dBm.
    pub rssi: f32,
    /// Signal-to-noise ratio in dB.
    pub snr: f32,
    /// Frequency error in Hz.
    pub frequency_error: f32,
}

impl LinkMetrics {
    /// Create a metrics triple.
    pub const fn new(rssi: f32, snr: f32, frequency_error: f32) -> Self {
        Self {
            rssi,
            snr,
            frequency_error,
        }
    }

    /// Bit-exact comparison of all three fields.
    pub fn bit_identical(&self, other: &LinkMetrics) -> bool {
        self.rssi.to_bits() == other.rssi.to_bits()
            && self.snr.to_bits() == other.snr.to_bits()
            && self.frequency_error.to_bits() == other.frequency_error.to_bits()
    }
}

impl PartialEq for LinkMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.bit_identical(other)
    }
}

/// Last-seen link metrics.
#[derive(Debug, Clone, Default)]
pub struct LinkMetricsTracker {
    last: LinkMetrics,
}

impl LinkMetricsTracker {
    /// Create a tracker whose previous value is all zeros.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `metrics` repeats the previous frame's metrics exactly.
    pub fn is_spurious(&self, metrics: &LinkMetrics) -> bool {
        self.last.bit_identical(metrics)
    }

    /// Record the metrics of a processed frame.
    pub fn update(&mut self, metrics: LinkMetrics) {
        self.last = metrics;
    }

    /// Metrics of the most recently processed frame.
    pub fn last(&self) -> LinkMetrics {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_metrics_are_spurious() {
        let mut tracker = LinkMetricsTracker::new();
        let m = LinkMetrics::new(-110.5, 7.25, -1523.0);
        assert!(!tracker.is_spurious(&m));
        tracker.update(m);
        assert!(tracker.is_spurious(&m));
    }

    #[test]
    fn test_any_field_change_is_not_spurious() {
        let mut tracker = LinkMetricsTracker::new();
        tracker.update(LinkMetrics::new(-110.5, 7.25, -1523.0));
        assert!(!tracker.is_spurious(&LinkMetrics::new(-110.0, 7.25, -1523.0)));
        assert!(!tracker.is_spurious(&LinkMetrics::new(-110.5, 7.5, -1523.0)));
        assert!(!tracker.is_spurious(&LinkMetrics::new(-110.5, 7.25, -1500.0)));
    }

    #[test]
    fn test_comparison_is_bit_exact() {
        // 0.0 and -0.0 compare equal as floats but differ in bits
        let a = LinkMetrics::new(0.0, 0.0, 0.0);
        let b = LinkMetrics::new(-0.0, 0.0, 0.0);
        assert!(!a.bit_identical(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_fresh_tracker_suppresses_all_zero_metrics() {
        // Zeroed metrics at startup match the initial previous value
        let tracker = LinkMetricsTracker::new();
        assert!(tracker.is_spurious(&LinkMetrics::default()));
    }
}
