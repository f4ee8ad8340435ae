//! # GPS Driver Interface
//!
//! The beacon's own GPS receiver sits on the same bus as the radio. The
//! driver decodes the receiver's navigation solutions itself; the core only
//! sees structured records, each consumed at most once.

use tracing::debug;

/// u-blox NAV message class
pub const UBX_CLASS_NAV: u8 = 0x01;

/// Navigation messages whose output rate can be configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMessage {
    PosLlh,
    Status,
    VelNed,
}

impl NavMessage {
    /// UBX message id within [`UBX_CLASS_NAV`]
    pub fn id(self) -> u8 {
        match self {
            NavMessage::PosLlh => 0x02,
            NavMessage::Status => 0x03,
            NavMessage::VelNed => 0x12,
        }
    }
}

/// Receiver fix status (NAV-STATUS)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavStatus {
    /// 0x03 = 3D, 0x04 = GPS + dead reckoning
    pub gps_fix: u8,
    /// Bit 0: position and velocity valid
    pub flags: u8,
}

impl NavStatus {
    /// A 3D fix the receiver marks as valid
    pub fn is_3d_valid(&self) -> bool {
        matches!(self.gps_fix, 0x03 | 0x04) && self.flags & 0x01 != 0
    }
}

/// Geodetic position (NAV-POSLLH)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavPosLlh {
    /// Longitude, degrees × 10^7
    pub lon: i32,
    /// Latitude, degrees × 10^7
    pub lat: i32,
    /// Height above ellipsoid, mm
    pub height: i32,
    /// Height above mean sea level, mm
    pub h_msl: i32,
    pub h_acc: u32,
    pub v_acc: u32,
}

/// Velocity in NED frame (NAV-VELNED), cm/s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavVelNed {
    pub vel_n: i32,
    pub vel_e: i32,
    pub vel_d: i32,
    pub ground_speed: u32,
    /// Heading of motion, degrees × 10^5
    pub heading: i32,
}

/// Beacon position derived from a fixed NAV-POSLLH solution
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct GroundPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
}

impl From<&NavPosLlh> for GroundPosition {
    fn from(pos: &NavPosLlh) -> Self {
        Self {
            lat_deg: pos.lat as f64 / 10_000_000.0,
            lon_deg: pos.lon as f64 / 10_000_000.0,
            alt_m: pos.h_msl as f64 / 1000.0,
        }
    }
}

/// GPS receiver driver
///
/// [`GpsDriver::fetch`] touches the shared bus and must run with radio
/// receive masked. The `take_*` accessors return each new record once.
#[cfg_attr(test, mockall::automock)]
pub trait GpsDriver {
    /// Configure a message to be output every `every` navigation solutions
    fn set_rate(&mut self, message: NavMessage, every: u8);

    /// Pull pending data from the receiver
    fn fetch(&mut self);

    fn take_status(&mut self) -> Option<NavStatus>;

    fn take_position(&mut self) -> Option<NavPosLlh>;

    fn take_velocity(&mut self) -> Option<NavVelNed>;
}

/// Driver for a beacon without a GPS receiver attached
#[derive(Debug, Default)]
pub struct NoGps;

impl GpsDriver for NoGps {
    fn set_rate(&mut self, message: NavMessage, every: u8) {
        debug!(
            "No GPS attached, ignoring rate 0x{:02X}/0x{:02X} every {}",
            UBX_CLASS_NAV,
            message.id(),
            every
        );
    }

    fn fetch(&mut self) {}

    fn take_status(&mut self) -> Option<NavStatus> {
        None
    }

    fn take_position(&mut self) -> Option<NavPosLlh> {
        None
    }

    fn take_velocity(&mut self) -> Option<NavVelNed> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_classification() {
        assert!(NavStatus { gps_fix: 0x03, flags: 0x01 }.is_3d_valid());
        assert!(NavStatus { gps_fix: 0x04, flags: 0x0D }.is_3d_valid());
        assert!(!NavStatus { gps_fix: 0x03, flags: 0x00 }.is_3d_valid());
        assert!(!NavStatus { gps_fix: 0x02, flags: 0x01 }.is_3d_valid());
        assert!(!NavStatus { gps_fix: 0x05, flags: 0x01 }.is_3d_valid());
    }

    #[test]
    fn test_ground_position_units() {
        let pos = NavPosLlh {
            lat: 515_000_000,
            lon: -1_250_000,
            h_msl: 12_500,
            ..Default::default()
        };
        let ground = GroundPosition::from(&pos);
        assert!((ground.lat_deg - 51.5).abs() < 1e-9);
        assert!((ground.lon_deg + 0.125).abs() < 1e-9);
        assert!((ground.alt_m - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_nav_message_ids() {
        assert_eq!(NavMessage::PosLlh.id(), 0x02);
        assert_eq!(NavMessage::Status.id(), 0x03);
        assert_eq!(NavMessage::VelNed.id(), 0x12);
    }

    #[test]
    fn test_no_gps_has_no_records() {
        let mut gps = NoGps;
        gps.set_rate(NavMessage::Status, 3);
        gps.fetch();
        assert!(gps.take_status().is_none());
        assert!(gps.take_position().is_none());
        assert!(gps.take_velocity().is_none());
    }

    #[test]
    fn test_mock_records_consumed_once() {
        let mut gps = MockGpsDriver::new();
        let mut served = false;
        gps.expect_take_status().returning(move || {
            if served {
                None
            } else {
                served = true;
                Some(NavStatus { gps_fix: 3, flags: 1 })
            }
        });

        assert!(gps.take_status().is_some());
        assert!(gps.take_status().is_none());
    }
}
