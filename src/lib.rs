//! # XBee Beacon Library
//!
//! Ground beacon that bridges an XBee mesh radio to a MAVLink-speaking craft.
//!
//! The beacon pairs with a single craft, locks onto its MAVLink system id,
//! watches its heartbeat and the local GPS fix, and keeps a small table of
//! tunable parameters in sync with ground control. Everything here is a
//! synchronous, bounded step; [`beacon::Beacon`] ties the pieces together and
//! the binary drives it from a tokio runtime.

pub mod beacon;
pub mod bridge;
pub mod config;
pub mod error;
pub mod gps;
pub mod indicator;
pub mod params;
pub mod pending;
pub mod scheduler;
pub mod serial;
pub mod session;
pub mod telemetry;
pub mod xbee;
