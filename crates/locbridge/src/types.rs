// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-level data model: engine status, fix criteria, aiding data, AGPS
//! connection types and the location/satellite records delivered to the host.

use std::fmt;

/// Host capability bits reported at init.
pub mod capabilities {
    /// Engine schedules periodic fixes itself.
    pub const SCHEDULING: u32 = 0x0000_0001;
    /// MS-based AGPS.
    pub const MSB: u32 = 0x0000_0002;
    /// MS-assisted AGPS.
    pub const MSA: u32 = 0x0000_0004;
    /// Single-shot fixes.
    pub const SINGLE_SHOT: u32 = 0x0000_0008;
}

/// Shortest fix interval the engine will request, in milliseconds.
pub const MIN_POSSIBLE_FIX_INTERVAL_MS: u32 = 1000;

/// Maximum number of satellites delivered in one status record.
pub const GPS_MAX_SVS: usize = 32;

/// Engine/session status as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineStatus {
    #[default]
    None,
    EngineOn,
    EngineOff,
    SessionBegin,
    SessionEnd,
}

impl EngineStatus {
    /// ENGINE_ON / ENGINE_OFF.
    pub fn is_engine_state(self) -> bool {
        matches!(self, Self::EngineOn | Self::EngineOff)
    }

    /// SESSION_BEGIN / SESSION_END.
    pub fn is_session_state(self) -> bool {
        matches!(self, Self::SessionBegin | Self::SessionEnd)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::EngineOn => "ENGINE_ON",
            Self::EngineOff => "ENGINE_OFF",
            Self::SessionBegin => "SESSION_BEGIN",
            Self::SessionEnd => "SESSION_END",
        };
        f.write_str(name)
    }
}

/// Positioning mode requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionMode {
    #[default]
    Standalone,
    MsBased,
    MsAssisted,
}

/// Fix recurrence requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recurrence {
    #[default]
    Periodic,
    Single,
}

/// Operation mode as understood by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Standalone,
    Msb,
    Msa,
}

/// Fix criteria sent to the modem (SET_FIX_CRITERIA).
///
/// Optional fields are `None` when the host left them unset (zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixCriteria {
    pub operation_mode: OperationMode,
    pub recurrence: Recurrence,
    pub min_interval_ms: u32,
    pub preferred_accuracy_m: Option<u32>,
    pub preferred_response_time_ms: Option<u32>,
}

impl FixCriteria {
    /// Translate a host position-mode request.
    ///
    /// A zero interval means "as fast as possible", which the modem caps at
    /// [`MIN_POSSIBLE_FIX_INTERVAL_MS`].
    pub fn from_host(
        mode: PositionMode,
        recurrence: Recurrence,
        min_interval_ms: u32,
        preferred_accuracy_m: u32,
        preferred_time_ms: u32,
    ) -> Self {
        let operation_mode = match mode {
            PositionMode::MsBased => OperationMode::Msb,
            PositionMode::MsAssisted => OperationMode::Msa,
            PositionMode::Standalone => OperationMode::Standalone,
        };

        Self {
            operation_mode,
            recurrence,
            min_interval_ms: if min_interval_ms == 0 {
                MIN_POSSIBLE_FIX_INTERVAL_MS
            } else {
                min_interval_ms
            },
            preferred_accuracy_m: (preferred_accuracy_m > 0).then_some(preferred_accuracy_m),
            preferred_response_time_ms: (preferred_time_ms > 0).then_some(preferred_time_ms),
        }
    }
}

/// Bitmask of aiding-data categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AidingDataMask(pub u16);

impl AidingDataMask {
    pub const EPHEMERIS: Self = Self(0x0001);
    pub const ALMANAC: Self = Self(0x0002);
    pub const POSITION: Self = Self(0x0004);
    pub const TIME: Self = Self(0x0008);
    pub const IONO: Self = Self(0x0010);
    pub const UTC: Self = Self(0x0020);
    pub const HEALTH: Self = Self(0x0040);
    pub const SVDIR: Self = Self(0x0080);
    pub const SVSTEER: Self = Self(0x0100);
    pub const SADATA: Self = Self(0x0200);
    pub const RTI: Self = Self(0x0400);
    pub const CELLDB_INFO: Self = Self(0x8000);
    pub const ALL: Self = Self(0xFFFF);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for AidingDataMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for AidingDataMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// AGPS server / connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgpsType {
    Supl,
    C2k,
    WwanAny,
    /// Connection request without a declared type (single open).
    Any,
}

/// Bearer of the data connection the host brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BearerType {
    #[default]
    Invalid,
    Ipv4,
    Ipv6,
    Ipv4v6,
}

/// Data-connection request/release sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgpsStatusValue {
    RequestDataConn,
    ReleaseDataConn,
}

/// AGPS connectivity notification for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgpsStatus {
    pub agps_type: AgpsType,
    pub status: AgpsStatusValue,
    pub ipv4_addr: Option<std::net::Ipv4Addr>,
}

/// Modem-assigned identifier of a data-connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub i64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned identifier of an open client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientHandle(pub i32);

/// Location validity flags.
pub mod location_flags {
    pub const HAS_LAT_LONG: u16 = 0x0001;
    pub const HAS_ALTITUDE: u16 = 0x0002;
    pub const HAS_SPEED: u16 = 0x0004;
    pub const HAS_BEARING: u16 = 0x0008;
    pub const HAS_ACCURACY: u16 = 0x0010;
}

/// Location delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub flags: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f32,
    pub bearing: f32,
    pub accuracy: f32,
    /// UTC milliseconds.
    pub timestamp: i64,
}

impl Location {
    pub fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

/// One satellite in a status record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SvInfo {
    pub prn: i32,
    pub snr: f32,
    pub elevation: f32,
    pub azimuth: f32,
}

/// Satellite status delivered to the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SvStatus {
    pub sv_list: Vec<SvInfo>,
    pub ephemeris_mask: u32,
    pub almanac_mask: u32,
    pub used_in_fix_mask: u32,
}
