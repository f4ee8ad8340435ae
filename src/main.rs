//! # XBee Beacon
//!
//! Host runner for the beacon protocol core. Bridges an XBee radio in API
//! mode to a MAVLink craft, keeps the paired craft's link alive and serves
//! its parameter table.

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use xbee_beacon::beacon::Beacon;
use xbee_beacon::config::{Config, LoggingConfig};
use xbee_beacon::gps::NoGps;
use xbee_beacon::indicator::LogIndicators;
use xbee_beacon::params::FileStorage;
use xbee_beacon::serial::{BufferedTransport, RadioSerial};
use xbee_beacon::telemetry::TelemetryLogger;
use xbee_beacon::xbee::ApiFrameDecoder;

type HostBeacon = Beacon<BufferedTransport, NoGps, LogIndicators, FileStorage>;

/// Serial read chunk size
const READ_BUFFER_LEN: usize = 256;

/// Seconds between status log messages
const STATS_INTERVAL_S: u64 = 30;

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. When `file_dir` is set, output
/// goes to a daily-rolling file instead of stdout and the returned guard must
/// be held until exit so buffered lines are flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "xbee-beacon.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Demultiplex received bytes, or park them while receive is masked
fn deliver_rx(decoder: &mut ApiFrameDecoder, beacon: &mut HostBeacon, bytes: &[u8]) {
    let transport = beacon.radio_mut().transport_mut();
    if transport.is_inhibited() {
        transport.park_rx(bytes);
        return;
    }

    let backlog = transport.take_rx_backlog();
    for &byte in backlog.iter().chain(bytes) {
        if let Some(frame) = decoder.push(byte) {
            beacon.on_radio_frame(frame.frame_type, frame.data);
        }
    }
}

/// Write everything the core queued to the radio
async fn flush_tx(beacon: &mut HostBeacon, serial: &mut RadioSerial) {
    let transport = beacon.radio_mut().transport_mut();
    if !transport.has_tx() {
        return;
    }

    let packet = transport.take_tx();
    if let Err(e) = serial.send_packet(&packet).await {
        warn!("Failed to send to radio: {}", e);
    }
}

fn shutdown(beacon: &mut HostBeacon) {
    if let Err(e) = beacon.save_params() {
        error!("Failed to save parameters on shutdown: {}", e);
    }
    let radio = beacon.radio().stats();
    let bridge = beacon.bridge().stats();
    info!(
        "Radio frames in/out: {}/{}, MAVLink decoded/sent: {}/{}",
        radio.frames, radio.sent_frames, bridge.decoded, bridge.sent
    );
}

/// Main entry point for the beacon
///
/// Usage: `xbee-beacon [config.toml]`. Without an argument the built-in
/// defaults are used.
///
/// # Control Flow
///
/// A single task multiplexes four sources with `tokio::select!`, so no two
/// core steps ever run at the same time:
///
/// - **Fine tick** (`timing.fine_tick_ms`): clock, button, LED flashing
/// - **Coarse tick** (`timing.message_loop_hz`): watchdogs, heartbeat,
///   parameter transmit, GPS fetch
/// - **Serial read**: API frames into the radio demultiplexer
/// - **Ctrl+C**: parameters are saved and the runner exits
///
/// After every step the idle work runs and queued frames are written out.
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be loaded
/// - No radio serial device can be opened
/// - The parameter storage image cannot be opened
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            Config::load(&path).with_context(|| format!("Failed to load config {}", path))?
        }
        None => Config::default(),
    };
    let _log_guard = init_logging(&config.logging);

    info!("XBee Beacon v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut serial = RadioSerial::open(&config.serial)?;
    let storage = FileStorage::open(&config.storage.path, config.storage.size)
        .with_context(|| format!("Failed to open parameter storage {}", config.storage.path))?;

    let settings = config.settings();
    let mut beacon = Beacon::new(
        settings,
        BufferedTransport::new(),
        NoGps,
        LogIndicators::new(),
        storage,
    );
    beacon.startup();
    flush_tx(&mut beacon, &mut serial).await;

    let mut telemetry = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry)?)
    } else {
        None
    };

    let mut decoder = ApiFrameDecoder::new();
    let mut buf = [0u8; READ_BUFFER_LEN];

    let coarse_period_ms = 1000 / u64::from(settings.message_loop_hz);
    let mut fine_interval = interval(Duration::from_millis(config.timing.fine_tick_ms));
    let mut coarse_interval = interval(Duration::from_millis(coarse_period_ms));
    let mut telemetry_interval = interval(Duration::from_millis(config.telemetry.interval_ms));
    let mut stats_interval = interval(Duration::from_secs(STATS_INTERVAL_S));

    info!(
        "Radio at {}, message loop at {}Hz",
        serial.device_path(),
        settings.message_loop_hz
    );
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = fine_interval.tick() => {
                beacon.fine_tick();
            }

            _ = coarse_interval.tick() => {
                beacon.coarse_tick();
            }

            read = serial.read_chunk(&mut buf) => {
                match read {
                    Ok(0) => {
                        error!("Radio serial port closed");
                        shutdown(&mut beacon);
                        break;
                    }
                    Ok(n) => deliver_rx(&mut decoder, &mut beacon, &buf[..n]),
                    Err(e) => {
                        error!("Radio read failed: {}", e);
                        shutdown(&mut beacon);
                        return Err(e.into());
                    }
                }
            }

            _ = telemetry_interval.tick(), if telemetry.is_some() => {
                let record = beacon.telemetry_record();
                if let Some(logger) = telemetry.as_mut() {
                    if let Err(e) = logger.log(&record) {
                        warn!("Failed to write telemetry: {}", e);
                    }
                }
            }

            _ = stats_interval.tick() => {
                let session = beacon.session();
                let decoder_stats = decoder.stats();
                info!(
                    "Craft sysid {} connected={}, API frames {} (checksum errors {}), undelivered {}, MAVLink parse errors {}",
                    session.sysid,
                    session.connected,
                    decoder_stats.frames,
                    decoder_stats.checksum_errors,
                    beacon.radio().stats().delivery_failures,
                    beacon.bridge().framer_stats().parse_errors
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                shutdown(&mut beacon);
                break;
            }
        }

        beacon.idle();
        deliver_rx(&mut decoder, &mut beacon, &[]);
        flush_tx(&mut beacon, &mut serial).await;
    }

    flush_tx(&mut beacon, &mut serial).await;
    Ok(())
}
