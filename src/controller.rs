//! Receive controller.
//!
//! Owns the transceiver, the interrupt flags and all protocol state, and
//! sequences one received frame at a time:
//!
//! ```text
//! interrupt -> frame_ready -> poll(): disable irq -> read frame + metrics
//!   -> spurious check -> bulk segment | FEC decode -> filter -> publish
//!   -> CRC branch (sentinel + NACK) -> re-arm receive -> enable irq
//! ```
//!
//! Every path out of [`ReceiveController::poll`] re-arms receive and
//! re-enables the interrupt, otherwise reception would stall for good.

use crate::clock::Clock;
use crate::config::{ProtocolTiming, RadioSession, StationConfig};
use crate::fec::{self, DecodeError};
use crate::protocol::{
    AckFrame, BulkTransfer, PendingRequests, SegmentOutcome, TcCode, Telecommand, TEST_MARKER,
    TEST_PACKET,
};
use crate::radio::{
    airtime_ms, DriverError, DriverStatus, InterruptFlags, LinkMetrics, LinkMetricsTracker,
    Transceiver,
};
use crate::status::{Counters, StationStats};
use crate::transport::{DecodedFrame, FramePublisher};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;

/// Why a polled frame was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxError {
    /// Interrupt fired without a new frame (metrics repeat the last frame).
    SpuriousInterrupt,
    /// Payload CRC failed.
    CrcMismatch,
    /// LoRa header corrupted.
    HeaderDamaged,
    /// Frame is not from the tracked satellite.
    FilterRejected,
    /// Too many symbol errors for Reed-Solomon.
    Uncorrectable,
    /// Driver reported success with no payload.
    EmptyFrame,
    /// Driver failure with its status code.
    DriverFailure(i16),
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpuriousInterrupt => write!(f, "interrupt without new data"),
            Self::CrcMismatch => write!(f, "crc mismatch"),
            Self::HeaderDamaged => write!(f, "damaged header"),
            Self::FilterRejected => write!(f, "rejected by packet filter"),
            Self::Uncorrectable => write!(f, "uncorrectable frame"),
            Self::EmptyFrame => write!(f, "empty frame"),
            Self::DriverFailure(code) => write!(f, "failed, code {}", code),
        }
    }
}

impl std::error::Error for RxError {}

/// Result of one [`ReceiveController::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    NoFrame,
    Delivered,
    Error(RxError),
}

/// Outbound transmission errors.
#[derive(Debug, Clone, PartialEq)]
pub enum TxError {
    /// Transmitting is disabled in the station config.
    TxDisabled,
    Driver(DriverError),
    Encode(DecodeError),
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxDisabled => write!(f, "tx disabled"),
            Self::Driver(e) => write!(f, "transmit failed: {}", e),
            Self::Encode(e) => write!(f, "encode failed: {}", e),
        }
    }
}

impl std::error::Error for TxError {}

impl From<DriverError> for TxError {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

impl From<DecodeError> for TxError {
    fn from(e: DecodeError) -> Self {
        Self::Encode(e)
    }
}

/// Receive state machine and outbound protocol for one transceiver.
pub struct ReceiveController<T, P, C> {
    radio: T,
    publisher: P,
    clock: C,
    session: RadioSession,
    flags: InterruptFlags,
    tracker: LinkMetricsTracker,
    bulk: BulkTransfer,
    pending: PendingRequests,
    timing: ProtocolTiming,
    allow_tx: bool,
    ready: bool,
    stats: Arc<StationStats>,
}

impl<T: Transceiver, P: FramePublisher, C: Clock> ReceiveController<T, P, C> {
    /// Controller for `radio` using the session and timing of `config`.
    ///
    /// The radio is not touched until [`begin`](Self::begin).
    pub fn new(radio: T, publisher: P, clock: C, config: &StationConfig) -> Self {
        Self {
            radio,
            publisher,
            clock,
            session: config.session.clone(),
            flags: InterruptFlags::new(),
            tracker: LinkMetricsTracker::new(),
            bulk: BulkTransfer::new(config.timing.bulk_timeout()),
            pending: PendingRequests::new(),
            timing: config.timing.clone(),
            allow_tx: config.allow_tx,
            ready: false,
            stats: Arc::new(StationStats::new()),
        }
    }

    /// Report into a shared stats container.
    pub fn with_stats(mut self, stats: Arc<StationStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Initialize the radio with the current session and start listening.
    pub fn begin(&mut self) -> Result<(), DriverError> {
        let session = self.session.clone();
        self.reinitialize(session)
    }

    /// Initialize the radio with `session` and start listening.
    ///
    /// The session is adopted only if the radio accepts it. On failure the
    /// radio stays "not ready" until a later successful initialization.
    pub fn reinitialize(&mut self, session: RadioSession) -> Result<(), DriverError> {
        self.set_ready(false);
        self.flags.disable();
        info!(
            "Initializing {} in {} mode at {:.4} MHz",
            self.radio.family().as_str(),
            session.mode,
            session.tuned_frequency()
        );

        if let Err(e) = self.radio.initialize(&session) {
            error!("Radio init failed, code {}", e.code());
            // Keep listening on whatever the chip still holds
            if self.radio.start_receive().is_ok() {
                self.flags.enable();
            }
            return Err(e);
        }
        self.session = session;
        self.stats.set_session(&self.session);

        let armed = self
            .radio
            .attach_interrupt(self.flags.clone())
            .and_then(|()| self.radio.start_receive());
        self.flags.enable();
        if let Err(e) = armed {
            error!("Starting receive failed, code {}", e.code());
            return Err(e);
        }
        self.set_ready(true);
        info!("Radio ready, listening");
        Ok(())
    }

    /// Whether the last initialization succeeded.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Session currently held by the radio.
    pub fn session(&self) -> &RadioSession {
        &self.session
    }

    /// Handle to the interrupt flags (e.g. for an interrupt routine).
    pub fn flags(&self) -> InterruptFlags {
        self.flags.clone()
    }

    pub fn stats(&self) -> Arc<StationStats> {
        self.stats.clone()
    }

    pub fn radio(&self) -> &T {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut T {
        &mut self.radio
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn bulk(&self) -> &BulkTransfer {
        &self.bulk
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn allow_tx(&self) -> bool {
        self.allow_tx
    }

    pub fn set_allow_tx(&mut self, allow: bool) {
        self.allow_tx = allow;
    }

    /// Handle a pending frame, if any.
    ///
    /// Also flushes a bulk transfer that went quiet, so call this often
    /// even when no interrupt is expected.
    pub fn poll(&mut self) -> PollOutcome {
        let now = self.clock.now();
        if let Some(ack) = self.bulk.poll_timeout(now, self.clock.unix_time()) {
            self.send_ack(ack);
        }

        if !self.flags.frame_ready() {
            return PollOutcome::NoFrame;
        }
        self.flags.disable();
        self.flags.take_frame_ready();

        let outcome = self.process_frame();

        if let Err(e) = self.radio.start_receive() {
            error!("Failed to restart receive, code {}", e.code());
        }
        self.flags.enable();
        outcome
    }

    fn process_frame(&mut self) -> PollOutcome {
        let (data, status) = match self.radio.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Frame readout failed, code {}", e.code());
                Counters::bump(&self.stats.counters.driver_failures);
                return PollOutcome::Error(RxError::DriverFailure(e.code()));
            }
        };
        let noisy = self.flags.take_duplicate_suspected();
        let metrics = self.radio.link_metrics();

        if self.tracker.is_spurious(&metrics) {
            info!("Interrupt triggered but no new data available. Check wiring and electrical interference.");
            Counters::bump(&self.stats.counters.spurious);
            return PollOutcome::Error(RxError::SpuriousInterrupt);
        }
        self.tracker.update(metrics);
        info!(
            "RSSI: {} dBm, SNR: {} dB, frequency error: {} Hz",
            metrics.rssi, metrics.snr, metrics.frequency_error
        );

        let received_at = self.clock.unix_time();
        match status {
            DriverStatus::Ok => self.handle_frame(data, metrics, received_at, noisy),
            DriverStatus::CrcMismatch => self.handle_crc_error(metrics, received_at, noisy),
            DriverStatus::HeaderDamaged => {
                warn!("Damaged header, data cannot be retrieved");
                Counters::bump(&self.stats.counters.header_errors);
                PollOutcome::Error(RxError::HeaderDamaged)
            }
            DriverStatus::Other(code) => {
                error!("Failed, code {}", code);
                Counters::bump(&self.stats.counters.driver_failures);
                PollOutcome::Error(RxError::DriverFailure(code))
            }
        }
    }

    fn handle_frame(
        &mut self,
        data: Vec<u8>,
        metrics: LinkMetrics,
        received_at: u32,
        noisy: bool,
    ) -> PollOutcome {
        if data.is_empty() {
            warn!("Driver reported a frame without payload");
            return PollOutcome::Error(RxError::EmptyFrame);
        }
        debug!("Packet received ({} bytes): {}", data.len(), crate::hex(&data));
        self.pending.clear();

        let payload = if self.bulk.is_active() {
            let now = self.clock.now();
            if let SegmentOutcome::Flush(ack) = self.bulk.record_segment(&data, now, received_at) {
                self.send_ack(ack);
            }
            data
        } else if data.starts_with(&TEST_MARKER) {
            debug!("Test packet, skipping FEC");
            data
        } else {
            match fec::decode(&data) {
                Ok(payload) => {
                    debug!("Packet data ({} bytes): {}", payload.len(), crate::hex(&payload));
                    payload
                }
                Err(e) => {
                    warn!("Dropping frame: {}", e);
                    Counters::bump(&self.stats.counters.uncorrectable);
                    return PollOutcome::Error(RxError::Uncorrectable);
                }
            }
        };

        if !self.session.filter.passes(&payload) {
            info!("Filter enabled, doesn't look like the expected satellite packet");
            Counters::bump(&self.stats.counters.filtered);
            return PollOutcome::Error(RxError::FilterRejected);
        }

        self.stats.record_frame(metrics, false);
        self.publisher.publish(DecodedFrame {
            payload,
            crc_valid: true,
            metrics,
            received_at,
            noisy_interrupt: noisy,
        });
        Counters::bump(&self.stats.counters.delivered);
        PollOutcome::Delivered
    }

    fn handle_crc_error(
        &mut self,
        metrics: LinkMetrics,
        received_at: u32,
        noisy: bool,
    ) -> PollOutcome {
        Counters::bump(&self.stats.counters.crc_errors);
        if self.session.filter.is_enabled() {
            info!("Filter enabled, CRC error filtered");
            return PollOutcome::Error(RxError::CrcMismatch);
        }

        warn!("CRC error, data cannot be retrieved");
        self.stats.record_frame(metrics, true);
        self.publisher
            .publish(DecodedFrame::crc_error(metrics, received_at, noisy));

        for nack in self.pending.take_nacks() {
            info!("{} not received, sending NACK", nack.name());
            match self.send_redundant(&nack.frame()) {
                Ok(()) => Counters::bump(&self.stats.counters.nacks_sent),
                Err(e) => warn!("NACK {} not sent: {}", nack.name(), e),
            }
        }
        PollOutcome::Error(RxError::CrcMismatch)
    }

    fn send_ack(&mut self, ack: AckFrame) {
        debug!("Ack data: {}", crate::hex(ack.as_bytes()));
        match self.send_redundant(ack.as_bytes()) {
            Ok(()) => {
                info!("Sent ACK DATA");
                Counters::bump(&self.stats.counters.acks_sent);
            }
            Err(e) => warn!("ACK DATA not sent: {}", e),
        }
    }

    /// FEC-encode `frame`, send it, wait, send it again.
    ///
    /// Both copies are attempted; the first error is returned.
    fn send_redundant(&mut self, frame: &[u8]) -> Result<(), TxError> {
        let encoded = fec::encode(frame)?;
        let first = self.send_tx(&encoded);
        self.clock.delay(self.timing.redundant_delay());
        let second = self.send_tx(&encoded);
        first.and(second)
    }

    /// Transmit raw bytes and return to receive.
    ///
    /// The interrupt is held off while transmitting and restored to its
    /// previous state afterwards, whether or not the transmit succeeded.
    pub fn send_tx(&mut self, data: &[u8]) -> Result<(), TxError> {
        if !self.allow_tx {
            warn!("TX disabled by config, {} bytes not sent", data.len());
            return Err(TxError::TxDisabled);
        }

        let restore = self.flags.interrupts_enabled();
        self.flags.disable();
        info!(
            "Transmitting {} bytes ({:.1} ms on air)",
            data.len(),
            airtime_ms(data.len(), &self.session)
        );
        let result = self.radio.transmit(data);
        if let Err(e) = &result {
            error!("Transmit failed, code {}", e.code());
        }
        if let Err(e) = self.radio.start_receive() {
            error!("Failed to restart receive, code {}", e.code());
        }
        if restore {
            self.flags.enable();
        }
        result.map_err(TxError::from)
    }

    /// FEC-encode and transmit a telecommand.
    ///
    /// "send data" opens a bulk transfer, "stop sending data" cancels it,
    /// "send config" and "send telemetry" become outstanding requests.
    pub fn send_telecommand(&mut self, tc: &Telecommand) -> Result<(), TxError> {
        let frame = tc.to_frame();
        debug!("Telecommand {}: {}", tc.code.name(), crate::hex(&frame));
        let encoded = fec::encode(&frame)?;
        self.send_tx(&encoded)?;
        info!("Sent telecommand {}", tc.code.name());

        match tc.code {
            TcCode::SendData => self.bulk.request(),
            TcCode::StopSendingData => self.bulk.cancel(),
            TcCode::SendConfig => self.pending.request_config(),
            TcCode::SendTelemetry => self.pending.request_telemetry(),
            _ => {}
        }
        Ok(())
    }

    /// Transmit the plain test frame (bypasses every packet filter).
    pub fn send_test_packet(&mut self) -> Result<(), TxError> {
        self.send_tx(TEST_PACKET)
    }

    /// Run `steps` against the radio, then return it to receive.
    ///
    /// Receive is re-armed and the interrupt re-attached whatever `steps`
    /// returned; `update` is applied to the session only on success.
    pub(crate) fn reconfigure<R, S, U>(
        &mut self,
        what: &str,
        steps: S,
        update: U,
    ) -> Result<R, DriverError>
    where
        S: FnOnce(&mut T) -> Result<R, DriverError>,
        U: FnOnce(&mut RadioSession),
    {
        self.flags.disable();
        let result = steps(&mut self.radio);
        let rearm = self
            .radio
            .start_receive()
            .and_then(|_| self.radio.attach_interrupt(self.flags.clone()));
        self.flags.enable();

        match result {
            Ok(value) => {
                update(&mut self.session);
                self.stats.set_session(&self.session);
                info!("{} applied", what);
                if let Err(e) = &rearm {
                    error!("Failed to restart receive, code {}", e.code());
                }
                rearm.map(|_| value)
            }
            Err(e) => {
                error!("{} failed, code {}", what, e.code());
                Err(e)
            }
        }
    }

    /// Replace the session wholesale without touching the radio.
    pub(crate) fn session_mut(&mut self) -> &mut RadioSession {
        &mut self.session
    }

    fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
        self.stats.set_ready(ready);
    }
}
