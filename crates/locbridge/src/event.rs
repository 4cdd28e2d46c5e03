// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Events delivered by the modem transport.
//!
//! These are the wire-level records as the transport parsed them. Optional
//! fields are `None` when the modem did not mark them valid.

use crate::types::ConnectionHandle;

/// Event received on the transport callback thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ModemEvent {
    Position(PositionReport),
    Satellite(GnssReport),
    Status(StatusEvent),
    Nmea(String),
    ServerRequest(ServerRequest),
    AssistanceData(AssistanceDataRequest),
    NiNotifyVerify(NiNotification),
    /// Completion report for an earlier control request.
    IoctlReport { status: i32 },
}

impl ModemEvent {
    /// Periodic reports that a newer report supersedes.
    pub fn is_periodic_report(&self) -> bool {
        matches!(self, Self::Position(_) | Self::Satellite(_) | Self::Nmea(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Position(_) => "position",
            Self::Satellite(_) => "satellite",
            Self::Status(_) => "status",
            Self::Nmea(_) => "nmea",
            Self::ServerRequest(_) => "server-request",
            Self::AssistanceData(_) => "assistance-data",
            Self::NiNotifyVerify(_) => "ni-notify-verify",
            Self::IoctlReport { .. } => "ioctl-report",
        }
    }
}

/// Transport-level restart notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartEvent {
    Begin,
    End,
}

/// Fix session outcome carried by a position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Success,
    InProgress,
    Failed,
}

/// Parsed position report.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionReport {
    pub session_status: Option<SessionStatus>,
    pub timestamp_utc: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_wrt_ellipsoid: Option<f64>,
    pub speed_horizontal: Option<f32>,
    pub speed_vertical: Option<f32>,
    pub heading: Option<f32>,
    pub hor_unc_circular: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvSystem {
    Gps,
    Galileo,
    Sbas,
    Compass,
    Glonass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvProcessStatus {
    Idle,
    Search,
    Track,
}

/// One satellite in a GNSS report.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SvReport {
    pub system: Option<SvSystem>,
    pub prn: i32,
    pub has_eph: Option<bool>,
    pub has_alm: Option<bool>,
    pub process_status: Option<SvProcessStatus>,
    pub snr: Option<f32>,
    pub elevation: Option<f32>,
    pub azimuth: Option<f32>,
}

/// Satellite report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GnssReport {
    pub sv_count: Option<usize>,
    pub sv_list: Option<Vec<SvReport>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixSessionState {
    Begin,
    End,
}

/// Engine or fix-session status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    EngineState(EngineState),
    FixSessionState(FixSessionState),
}

/// Connection type declared by a multi-open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerConnectionType {
    /// Location-based-services APN.
    Lbs,
    Wwan,
}

/// Data-connection request from the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRequest {
    Open {
        handle: ConnectionHandle,
    },
    MultiOpen {
        handle: ConnectionHandle,
        connection_type: ServerConnectionType,
    },
    Close {
        handle: ConnectionHandle,
    },
}

impl ServerRequest {
    pub fn handle(&self) -> ConnectionHandle {
        match *self {
            Self::Open { handle } | Self::MultiOpen { handle, .. } | Self::Close { handle } => {
                handle
            }
        }
    }
}

/// Assistance data the modem asks the host to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistanceDataRequest {
    PredictedOrbits,
    Time,
}

/// Identifier the modem attaches to a network-initiated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NiRequestId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiType {
    Voice,
    UmtsSupl,
    UmtsControlPlane,
}

/// Network-initiated notify/verify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NiNotification {
    pub id: NiRequestId,
    pub ni_type: NiType,
    pub notify_flags: u32,
    /// Seconds the modem waits for a user response.
    pub timeout_s: u32,
    pub requestor_id: String,
    pub text: String,
}

/// User response to a network-initiated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiResponse {
    Accept,
    Deny,
    NoResponse,
}
