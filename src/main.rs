//! Ground-station firmware binary (ESP32-S3 + SX1262).
//!
//! `cargo espflash flash --bin station --features esp32 --release`
//!
//! Delivered frames are logged as JSON on the serial console.

#[cfg(feature = "esp32")]
fn main() {
    use gs_radio_core::radio::Sx1262Radio;
    use gs_radio_core::{
        hex, DecodedFrame, FramePublisher, PollOutcome, ReceiveController, StationConfig,
        StationStats, SystemClock,
    };
    use log::{debug, error, info, warn};
    use std::sync::Arc;
    use std::time::Duration;

    /// Publisher that writes frames to the serial log.
    struct SerialPublisher;

    impl FramePublisher for SerialPublisher {
        fn publish(&mut self, frame: DecodedFrame) {
            info!("RX [{}]", hex(&frame.payload));
            match serde_json::to_string(&frame) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Failed to serialize frame: {}", e),
            }
        }
    }

    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("=== Ground station starting ===");

    let peripherals = match esp_idf_hal::peripherals::Peripherals::take() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to take peripherals: {}", e);
            return;
        }
    };
    let pins = peripherals.pins;

    let radio = match Sx1262Radio::new(
        peripherals.spi2,
        pins.gpio12,
        pins.gpio11,
        pins.gpio13,
        pins.gpio10,
        pins.gpio5,
        pins.gpio4,
        pins.gpio1,
    ) {
        Ok(radio) => radio,
        Err(e) => {
            error!("Radio bus setup failed: {}", e);
            return;
        }
    };

    // No filesystem on the device; the station starts from defaults and is
    // reconfigured remotely.
    let config = StationConfig::default();
    let stats = Arc::new(StationStats::new());
    let mut controller =
        ReceiveController::new(radio, SerialPublisher, SystemClock, &config).with_stats(stats);

    if let Err(e) = controller.begin() {
        error!("Radio initialization failed: {}", e);
    }

    info!("Entering receive loop...");
    loop {
        match controller.poll() {
            PollOutcome::NoFrame => std::thread::sleep(Duration::from_millis(5)),
            PollOutcome::Delivered => {}
            PollOutcome::Error(e) => debug!("RX: {}", e),
        }
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-station' to run against the simulated radio.");
}
