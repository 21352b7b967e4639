//! Station status counters and HTTP endpoint.
//!
//! [`StationStats`] is shared between the receive loop and the
//! [`StatusServer`], which serves it as JSON on `GET /status`. Uses
//! `tiny_http`, which runs on both host and ESP32 (via std::net).
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 3600,
//!   "ready": true,
//!   "session": { "modem_mode": "LoRa", "freq": 436.703, "...": "..." },
//!   "last_metrics": { "rssi": -112.5, "snr": 4.25, "frequency_error": -830.0 },
//!   "last_crc_error": false,
//!   "counters": { "delivered": 12, "spurious": 1, "crc_errors": 2, "...": 0 }
//! }
//! ```

use crate::config::RadioSession;
use crate::radio::LinkMetrics;
use log::{error, info, warn};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Response, Server};

/// Default port for the status server.
pub const DEFAULT_STATUS_PORT: u16 = 8080;

/// Receive/transmit event counters.
#[derive(Debug, Default)]
pub struct Counters {
    pub delivered: AtomicUsize,
    pub spurious: AtomicUsize,
    pub crc_errors: AtomicUsize,
    pub header_errors: AtomicUsize,
    pub filtered: AtomicUsize,
    pub uncorrectable: AtomicUsize,
    pub driver_failures: AtomicUsize,
    pub acks_sent: AtomicUsize,
    pub nacks_sent: AtomicUsize,
}

impl Counters {
    /// Bump a counter by one.
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        CounterSnapshot {
            delivered: load(&self.delivered),
            spurious: load(&self.spurious),
            crc_errors: load(&self.crc_errors),
            header_errors: load(&self.header_errors),
            filtered: load(&self.filtered),
            uncorrectable: load(&self.uncorrectable),
            driver_failures: load(&self.driver_failures),
            acks_sent: load(&self.acks_sent),
            nacks_sent: load(&self.nacks_sent),
        }
    }
}

/// Plain copy of [`Counters`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub delivered: usize,
    pub spurious: usize,
    pub crc_errors: usize,
    pub header_errors: usize,
    pub filtered: usize,
    pub uncorrectable: usize,
    pub driver_failures: usize,
    pub acks_sent: usize,
    pub nacks_sent: usize,
}

#[derive(Debug, Default)]
struct LinkState {
    session: Option<RadioSession>,
    last_metrics: LinkMetrics,
    last_crc_error: bool,
}

/// Point-in-time station status, as served on `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub uptime_secs: u64,
    pub ready: bool,
    pub session: Option<RadioSession>,
    pub last_metrics: LinkMetrics,
    pub last_crc_error: bool,
    pub counters: CounterSnapshot,
}

/// Station statistics container.
///
/// Shared across the application; counters are atomics, the link state sits
/// behind a short-lived mutex.
#[derive(Debug)]
pub struct StationStats {
    start_time: Instant,
    ready: AtomicBool,
    pub counters: Counters,
    link: Mutex<LinkState>,
}

impl Default for StationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StationStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ready: AtomicBool::new(false),
            counters: Counters::default(),
            link: Mutex::new(LinkState::default()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Record the session now held by the radio.
    pub fn set_session(&self, session: &RadioSession) {
        self.link().session = Some(session.clone());
    }

    /// Record the metrics and CRC outcome of the last frame.
    pub fn record_frame(&self, metrics: LinkMetrics, crc_error: bool) {
        let mut link = self.link();
        link.last_metrics = metrics;
        link.last_crc_error = crc_error;
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let link = self.link();
        StatusSnapshot {
            uptime_secs: self.uptime_secs(),
            ready: self.is_ready(),
            session: link.session.clone(),
            last_metrics: link.last_metrics,
            last_crc_error: link.last_crc_error,
            counters: self.counters.snapshot(),
        }
    }

    /// Serialize the current status to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|e| {
            warn!("Status serialization failed: {}", e);
            "{}".to_string()
        })
    }

    fn link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// HTTP status server.
///
/// Runs in a background thread. Drop it to stop the server.
pub struct StatusServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl StatusServer {
    /// Start serving `stats` on `bind_addr:port` (`None` binds 0.0.0.0).
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        stats: Arc<StationStats>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;

        info!("Status server listening on http://{}/status", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, stats, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    fn run_server(server: Server, stats: Arc<StationStats>, shutdown: Arc<AtomicBool>) {
        let header = |name: &str, value: &str| Header::from_bytes(name.as_bytes(), value.as_bytes()).ok();
        let content_type = header("Content-Type", "application/json");
        let location = header("Location", "/status");
        let allow_get = header("Allow", "GET");

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Status server shutting down");
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            };

            if request.method() != &Method::Get {
                let mut response = Response::from_string("Method Not Allowed").with_status_code(405);
                if let Some(h) = allow_get.clone() {
                    response = response.with_header(h);
                }
                let _ = request.respond(response);
                continue;
            }

            let response = match request.url() {
                "/status" | "/status/" => {
                    let mut response = Response::from_string(stats.to_json()).with_status_code(200);
                    if let Some(h) = content_type.clone() {
                        response = response.with_header(h);
                    }
                    response
                }
                "/" => {
                    let mut response =
                        Response::from_string("See /status for station status").with_status_code(302);
                    if let Some(h) = location.clone() {
                        response = response.with_header(h);
                    }
                    response
                }
                _ => Response::from_string("Not Found").with_status_code(404),
            };

            if let Err(e) = request.respond(response) {
                warn!("Failed to send response: {}", e);
            }
        }
    }

    /// Stop the server. May take up to 100ms due to the polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.stop();
    }
}
