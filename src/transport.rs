//! Outbound frame transport.
//!
//! Decoded frames leave the core through [`FramePublisher`]. The uplink to
//! the network server is outside this crate; the host binary publishes into
//! a tokio channel and tests collect into a `Vec`.

use crate::radio::LinkMetrics;
use log::warn;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Payload published in place of a frame that failed its CRC.
pub const CRC_ERROR_SENTINEL: &[u8] = b"Error_CRC";

/// A frame ready for the uplink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFrame {
    /// Decoded payload, or [`CRC_ERROR_SENTINEL`].
    pub payload: Vec<u8>,
    pub crc_valid: bool,
    pub metrics: LinkMetrics,
    /// Unix seconds at reception.
    pub received_at: u32,
    /// An extra interrupt fired while this frame was pending.
    pub noisy_interrupt: bool,
}

impl DecodedFrame {
    /// Sentinel frame reporting a CRC failure.
    pub fn crc_error(metrics: LinkMetrics, received_at: u32, noisy_interrupt: bool) -> Self {
        Self {
            payload: CRC_ERROR_SENTINEL.to_vec(),
            crc_valid: false,
            metrics,
            received_at,
            noisy_interrupt,
        }
    }
}

/// Sink for decoded frames.
pub trait FramePublisher {
    fn publish(&mut self, frame: DecodedFrame);
}

impl FramePublisher for Vec<DecodedFrame> {
    fn publish(&mut self, frame: DecodedFrame) {
        self.push(frame);
    }
}

impl FramePublisher for UnboundedSender<DecodedFrame> {
    fn publish(&mut self, frame: DecodedFrame) {
        if self.send(frame).is_err() {
            warn!("Frame dropped: uplink channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_error_frame() {
        let frame = DecodedFrame::crc_error(LinkMetrics::new(-120.0, -3.0, 12.0), 99, true);
        assert_eq!(frame.payload, b"Error_CRC");
        assert!(!frame.crc_valid);
        assert!(frame.noisy_interrupt);
    }

    #[test]
    fn test_channel_publisher() {
        let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.publish(DecodedFrame::crc_error(LinkMetrics::default(), 0, false));
        assert!(rx.try_recv().is_ok());

        drop(rx);
        // Closed channel only logs
        tx.publish(DecodedFrame::crc_error(LinkMetrics::default(), 0, false));
    }

    #[test]
    fn test_frame_serializes() {
        let frame = DecodedFrame {
            payload: vec![1, 2],
            crc_valid: true,
            metrics: LinkMetrics::new(-100.0, 5.0, 0.0),
            received_at: 7,
            noisy_interrupt: false,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"payload\":[1,2]"));
        assert!(json.contains("\"rssi\":-100.0"));
    }
}
