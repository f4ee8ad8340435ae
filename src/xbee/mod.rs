//! # XBee Radio Module
//!
//! API-mode framing for the XBee mesh radio and the single-peer
//! [`RadioLink`] built on top of it.
//!
//! This module handles:
//! - Incremental decoding of API frames from the serial byte stream
//! - Encoding transmit requests and local AT commands
//! - Demultiplexing received frames and binding the craft radio
//! - Guarded unicast/broadcast/coordinator sends and operator AT actions

pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod link;
pub mod protocol;

pub use decoder::{ApiFrame, ApiFrameDecoder, DecoderStats};
pub use link::{LinkStats, RadioEvent, RadioLink};
