//! # Telemetry Module
//!
//! Periodic JSONL snapshots of the craft session and link health.
//!
//! This module handles:
//! - Capturing a [`TelemetryRecord`] from the running beacon
//! - Writing one JSON object per line
//! - Rotating files after `max_records_per_file` records
//! - Retaining only the newest `max_files_to_keep` files

pub mod logger;
pub mod types;

pub use logger::TelemetryLogger;
pub use types::TelemetryRecord;
