//! Telemetry record layout

use crate::gps::GroundPosition;
use crate::scheduler::LinkHealth;
use crate::session::{CraftPosition, CraftSession, StatusText};
use serde::Serialize;

/// Craft position as reported over MAVLink, in degrees and metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CraftFix {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
    pub fix_type: u8,
}

impl From<&CraftPosition> for CraftFix {
    fn from(position: &CraftPosition) -> Self {
        Self {
            lat_deg: f64::from(position.lat) / 10_000_000.0,
            lon_deg: f64::from(position.lon) / 10_000_000.0,
            alt_m: f64::from(position.alt) / 1000.0,
            fix_type: position.fix,
        }
    }
}

/// Status text carried into a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub severity: u8,
    pub text: String,
}

impl From<&StatusText> for StatusLine {
    fn from(text: &StatusText) -> Self {
        Self {
            severity: text.severity,
            text: text.to_string_lossy(),
        }
    }
}

/// One JSONL line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339 wall-clock time the record was written
    pub timestamp: String,
    /// Beacon uptime in milliseconds
    pub uptime_ms: u64,
    pub paired: bool,
    pub sysid: Option<u8>,
    pub connected: bool,
    pub base_mode: u8,
    pub system_status: u8,
    pub battery_mv: u16,
    pub craft: CraftFix,
    pub link_ticks: u32,
    pub gps_ticks: u32,
    pub gps_fixed: bool,
    pub ground: Option<GroundPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<StatusLine>,
}

impl TelemetryRecord {
    /// Snapshot the session and health state
    ///
    /// `status_text` is passed separately because reading it consumes it.
    pub fn capture(
        uptime_ms: u64,
        session: &CraftSession,
        health: &LinkHealth,
        ground: Option<GroundPosition>,
        status_text: Option<&StatusText>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_ms,
            paired: session.valid,
            sysid: session.id_valid.then_some(session.sysid),
            connected: session.connected,
            base_mode: session.base_mode,
            system_status: session.system_status,
            battery_mv: session.battery_mv,
            craft: CraftFix::from(&session.position),
            link_ticks: health.link.count(),
            gps_ticks: health.gps.count(),
            gps_fixed: health.fixed,
            ground,
            status_text: status_text.map(StatusLine::from),
        }
    }
}
