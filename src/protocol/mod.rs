//! Over-the-air protocol pieces.
//!
//! - [`filter`]: satellite packet filter with the test-marker bypass
//! - [`telecommand`]: telecommand table and frame layout
//! - [`bulk`]: bulk-transfer acknowledgement
//! - [`nack`]: NACK of outstanding config/telemetry requests

mod bulk;
mod filter;
mod nack;
mod telecommand;

pub use bulk::{
    AckFrame, BulkTransfer, SegmentOutcome, ACK_BITMAP_LEN, ACK_FRAME_LEN, SEQUENCE_OFFSET,
    TERMINAL_SEQUENCE,
};
pub use filter::{PacketFilter, TEST_MARKER};
pub use nack::{NackKind, PendingRequests};
pub use telecommand::{TcCode, Telecommand, HEADER, TEST_PACKET};
