//! Bulk-transfer acknowledgement.
//!
//! After a "send data" telecommand the satellite streams numbered segments.
//! Each received segment marks its sequence number in a 20-byte map. The map
//! is flushed back as a 27-byte ack frame when the terminal segment arrives
//! or the stream goes quiet for the configured timeout.
//!
//! Ack frame layout:
//!
//! ```text
//! [C8 9D 18] [map: 20 bytes, one per sequence number] [unix time: 4 bytes BE]
//! ```

use super::telecommand::{TcCode, HEADER};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Length of the ack frame.
pub const ACK_FRAME_LEN: usize = 27;

/// Number of sequence slots in the ack map.
pub const ACK_BITMAP_LEN: usize = 20;

/// Sequence number of the last segment of a transfer.
pub const TERMINAL_SEQUENCE: u8 = 0x13;

/// Offset of the sequence byte in a segment frame.
pub const SEQUENCE_OFFSET: usize = 3;

const BITMAP_START: usize = 3;
const TIMESTAMP_START: usize = BITMAP_START + ACK_BITMAP_LEN;

/// Fixed-size bulk-transfer acknowledgement frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame([u8; ACK_FRAME_LEN]);

impl Default for AckFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl AckFrame {
    /// Empty ack with the header written.
    pub fn new() -> Self {
        let mut frame = [0u8; ACK_FRAME_LEN];
        frame[..2].copy_from_slice(&HEADER);
        frame[2] = TcCode::AckData.code();
        Self(frame)
    }

    /// Mark segment `sequence` as received.
    ///
    /// Returns `false` if the sequence number has no slot.
    pub fn mark(&mut self, sequence: u8) -> bool {
        match self.slot_mut(sequence) {
            Some(slot) => {
                *slot = 1;
                true
            }
            None => false,
        }
    }

    /// Whether segment `sequence` has been marked.
    pub fn is_marked(&self, sequence: u8) -> bool {
        self.0
            .get(BITMAP_START..TIMESTAMP_START)
            .and_then(|map| map.get(sequence as usize))
            .is_some_and(|&b| b != 0)
    }

    /// Sequence numbers marked so far, ascending.
    pub fn marked(&self) -> Vec<u8> {
        (0..ACK_BITMAP_LEN as u8)
            .filter(|&seq| self.is_marked(seq))
            .collect()
    }

    /// Write the flush timestamp (big-endian Unix seconds).
    pub fn set_timestamp(&mut self, unix: u32) {
        self.0[TIMESTAMP_START..].copy_from_slice(&unix.to_be_bytes());
    }

    /// Flush timestamp (0 until set).
    pub fn timestamp(&self) -> u32 {
        let mut be = [0u8; 4];
        be.copy_from_slice(&self.0[TIMESTAMP_START..]);
        u32::from_be_bytes(be)
    }

    pub fn as_bytes(&self) -> &[u8; ACK_FRAME_LEN] {
        &self.0
    }

    fn slot_mut(&mut self, sequence: u8) -> Option<&mut u8> {
        self.0
            .get_mut(BITMAP_START..TIMESTAMP_START)
            .and_then(|map| map.get_mut(sequence as usize))
    }
}

/// Result of feeding a segment to [`BulkTransfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Segment marked, transfer continues.
    Recorded,
    /// Transfer complete; send this ack (twice).
    Flush(AckFrame),
    /// Segment unusable (too short or sequence without a slot).
    Ignored,
}

/// State of the current bulk transfer.
#[derive(Debug, Clone)]
pub struct BulkTransfer {
    active: bool,
    ack: AckFrame,
    segments: usize,
    last_activity: Option<Instant>,
    timeout: Duration,
}

impl BulkTransfer {
    /// Inactive transfer with the given inactivity timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            active: false,
            ack: AckFrame::new(),
            segments: 0,
            last_activity: None,
            timeout,
        }
    }

    /// Start a transfer (a "send data" telecommand went out).
    ///
    /// Restarting discards the marks of an unfinished transfer. The idle
    /// clock only starts with the first segment.
    pub fn request(&mut self) {
        if self.active && self.segments > 0 {
            warn!(
                "Bulk transfer restarted with {} segments unacknowledged",
                self.segments
            );
        }
        self.active = true;
        self.ack = AckFrame::new();
        self.segments = 0;
        self.last_activity = None;
        info!("Bulk transfer requested");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Segments recorded in the current transfer.
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Ack under construction.
    pub fn ack(&self) -> &AckFrame {
        &self.ack
    }

    /// Drop the current transfer without acknowledging it.
    pub fn cancel(&mut self) {
        if self.active {
            info!("Bulk transfer cancelled after {} segments", self.segments);
        }
        self.reset();
    }

    /// Record a received segment frame.
    ///
    /// Flushes on the terminal sequence number, or when the previous segment
    /// is older than the timeout. Either needs an earlier segment of the
    /// same transfer; the first segment is only recorded.
    pub fn record_segment(&mut self, frame: &[u8], now: Instant, unix: u32) -> SegmentOutcome {
        let Some(&sequence) = frame.get(SEQUENCE_OFFSET) else {
            warn!("Bulk segment too short ({} bytes)", frame.len());
            return SegmentOutcome::Ignored;
        };
        let idle = self.idle_time(now);

        if !self.ack.mark(sequence) {
            warn!("Bulk segment sequence {:#04x} out of range", sequence);
            return SegmentOutcome::Ignored;
        }
        let earlier = self.segments;
        self.segments += 1;
        self.last_activity = Some(now);
        debug!("Bulk segment {:#04x} ({} so far)", sequence, self.segments);

        if earlier > 0 && (sequence == TERMINAL_SEQUENCE || idle > self.timeout) {
            SegmentOutcome::Flush(self.flush(unix))
        } else {
            SegmentOutcome::Recorded
        }
    }

    /// Flush a transfer that went quiet.
    ///
    /// Returns the ack to send once at least one segment was recorded and
    /// the last one is older than the timeout.
    pub fn poll_timeout(&mut self, now: Instant, unix: u32) -> Option<AckFrame> {
        if !self.active || self.segments == 0 || self.idle_time(now) <= self.timeout {
            return None;
        }
        info!("Bulk transfer idle for over {:?}, flushing", self.timeout);
        Some(self.flush(unix))
    }

    fn idle_time(&self, now: Instant) -> Duration {
        self.last_activity
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default()
    }

    fn flush(&mut self, unix: u32) -> AckFrame {
        let mut ack = self.ack;
        ack.set_timestamp(unix);
        info!(
            "Bulk transfer complete: {} segments, acking {:?}",
            self.segments,
            ack.marked()
        );
        self.reset();
        ack
    }

    fn reset(&mut self) {
        self.active = false;
        self.ack = AckFrame::new();
        self.segments = 0;
        self.last_activity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(60);

    fn segment(seq: u8) -> Vec<u8> {
        vec![0xC8, 0x9D, 0x14, seq, 0xAA, 0xBB]
    }

    // ==================== Ack Frame Tests ====================

    #[test]
    fn test_new_ack_has_header_only() {
        let ack = AckFrame::new();
        assert_eq!(ack.as_bytes().len(), 27);
        assert_eq!(&ack.as_bytes()[..3], &[0xC8, 0x9D, 0x18]);
        assert!(ack.as_bytes()[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mark_sets_slot() {
        let mut ack = AckFrame::new();
        assert!(ack.mark(0));
        assert!(ack.mark(0x13));
        assert!(!ack.mark(20));
        assert_eq!(ack.as_bytes()[3], 1);
        assert_eq!(ack.as_bytes()[22], 1);
        assert_eq!(ack.marked(), vec![0, 0x13]);
    }

    #[test]
    fn test_timestamp_is_big_endian() {
        let mut ack = AckFrame::new();
        ack.set_timestamp(0x6543_2101);
        assert_eq!(&ack.as_bytes()[23..], &[0x65, 0x43, 0x21, 0x01]);
        assert_eq!(ack.timestamp(), 0x6543_2101);
    }

    // ==================== Transfer Tests ====================

    #[test]
    fn test_terminal_sequence_flushes_once() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();

        let t1 = start + Duration::from_secs(1);
        assert_eq!(bulk.record_segment(&segment(0x01), t1, 100), SegmentOutcome::Recorded);
        let t2 = start + Duration::from_secs(2);
        assert_eq!(bulk.record_segment(&segment(0x02), t2, 101), SegmentOutcome::Recorded);

        let t3 = start + Duration::from_secs(4);
        let ack = match bulk.record_segment(&segment(0x13), t3, 1_700_000_000) {
            SegmentOutcome::Flush(ack) => ack,
            other => panic!("expected flush, got {:?}", other),
        };
        assert_eq!(ack.marked(), vec![0x01, 0x02, 0x13]);
        assert_eq!(ack.timestamp(), 1_700_000_000);

        assert!(!bulk.is_active());
        assert_eq!(bulk.poll_timeout(t3 + Duration::from_secs(120), 0), None);
    }

    #[test]
    fn test_inactivity_flushes_single_segment() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();
        bulk.record_segment(&segment(0x01), start, 0);

        assert_eq!(bulk.poll_timeout(start + Duration::from_secs(60), 0), None);
        let ack = bulk
            .poll_timeout(start + Duration::from_secs(61), 42)
            .expect("flush after timeout");
        assert_eq!(ack.marked(), vec![0x01]);
        assert_eq!(ack.timestamp(), 42);
        assert!(!bulk.is_active());
    }

    #[test]
    fn test_late_segment_flushes_with_itself() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();
        bulk.record_segment(&segment(0x01), start, 0);

        let late = start + Duration::from_secs(90);
        match bulk.record_segment(&segment(0x05), late, 7) {
            SegmentOutcome::Flush(ack) => assert_eq!(ack.marked(), vec![0x01, 0x05]),
            other => panic!("expected flush, got {:?}", other),
        }
    }

    #[test]
    fn test_late_first_segment_is_recorded() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();

        let late = start + Duration::from_secs(90);
        assert_eq!(bulk.record_segment(&segment(0x01), late, 0), SegmentOutcome::Recorded);
        assert!(bulk.is_active());
        assert_eq!(bulk.poll_timeout(late + Duration::from_secs(30), 0), None);

        let next = late + Duration::from_secs(2);
        assert_eq!(bulk.record_segment(&segment(0x02), next, 0), SegmentOutcome::Recorded);
        assert_eq!(bulk.segments(), 2);
    }

    #[test]
    fn test_terminal_first_segment_waits_for_timeout() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();

        assert_eq!(bulk.record_segment(&segment(0x13), start, 0), SegmentOutcome::Recorded);
        assert!(bulk.is_active());

        let ack = bulk
            .poll_timeout(start + Duration::from_secs(61), 9)
            .expect("flush after timeout");
        assert_eq!(ack.marked(), vec![0x13]);
    }

    #[test]
    fn test_no_flush_without_segments() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();
        assert_eq!(bulk.poll_timeout(start + Duration::from_secs(600), 0), None);
        assert!(bulk.is_active());
    }

    #[test]
    fn test_bad_segments_ignored() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();
        assert_eq!(bulk.record_segment(&[0xC8, 0x9D], start, 0), SegmentOutcome::Ignored);
        assert_eq!(bulk.record_segment(&segment(0x40), start, 0), SegmentOutcome::Ignored);
        assert_eq!(bulk.segments(), 0);
    }

    #[test]
    fn test_cancel_discards_marks() {
        let start = Instant::now();
        let mut bulk = BulkTransfer::new(TIMEOUT);
        bulk.request();
        bulk.record_segment(&segment(0x03), start, 0);
        bulk.cancel();
        assert!(!bulk.is_active());
        assert!(bulk.ack().marked().is_empty());
    }
}
