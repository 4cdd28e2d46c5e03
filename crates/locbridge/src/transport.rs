// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Modem transport seam.
//!
//! The engine talks to the modem-resident positioning service only through
//! [`LocTransport`]. Calls are synchronous and may block for as long as the
//! transport's own timeout allows; the engine never holds its state lock
//! across a transport call.
//!
//! Events flow the other way through the [`ModemIngress`] handle passed to
//! [`LocTransport::open`].

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;

use crate::event::{NiRequestId, NiResponse};
use crate::ingest::ModemIngress;
use crate::types::{AidingDataMask, ClientHandle, ConnectionHandle, FixCriteria};

/// Transport call failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Remote subsystem is restarting; the client session is gone.
    #[error("modem subsystem restart")]
    ModemRestart,

    #[error("transport call failed (code {code})")]
    Failed { code: i32 },

    #[error("transport call timed out")]
    Timeout,

    #[error("invalid client handle")]
    InvalidHandle,
}

/// Event categories a client subscribes to at open.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(pub u64);

impl EventMask {
    pub const PARSED_POSITION_REPORT: Self = Self(0x0000_0001);
    pub const SATELLITE_REPORT: Self = Self(0x0000_0002);
    pub const NMEA_1HZ_REPORT: Self = Self(0x0000_0004);
    pub const NMEA_POSITION_REPORT: Self = Self(0x0000_0008);
    pub const NI_NOTIFY_VERIFY_REQUEST: Self = Self(0x0000_0010);
    pub const ASSISTANCE_DATA_REQUEST: Self = Self(0x0000_0020);
    pub const LOCATION_SERVER_REQUEST: Self = Self(0x0000_0040);
    pub const IOCTL_REPORT: Self = Self(0x0000_0080);
    pub const STATUS_REPORT: Self = Self(0x0000_0100);

    /// Everything the engine handles.
    pub const ENGINE_DEFAULT: Self = Self(
        Self::PARSED_POSITION_REPORT.0
            | Self::SATELLITE_REPORT.0
            | Self::LOCATION_SERVER_REQUEST.0
            | Self::ASSISTANCE_DATA_REQUEST.0
            | Self::IOCTL_REPORT.0
            | Self::STATUS_REPORT.0
            | Self::NMEA_1HZ_REPORT.0
            | Self::NI_NOTIFY_VERIFY_REQUEST.0,
    );

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventMask({:#06x})", self.0)
    }
}

/// PDP context type reported with multi-open acknowledgments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdpType {
    Ip,
    Ipv6,
    Ipv4v6,
    Ppp,
}

/// Control request sent to the modem.
#[derive(Debug, Clone, PartialEq)]
pub enum IoctlCommand {
    SetFixCriteria(FixCriteria),
    InjectUtcTime {
        time_utc_ms: i64,
        uncertainty_ms: u32,
    },
    InjectPosition {
        latitude: f64,
        longitude: f64,
        hor_unc_circular_m: f32,
        /// Horizontal confidence in percent.
        confidence: u8,
    },
    DeleteAssistData(AidingDataMask),
    InformServerOpenStatus {
        handle: ConnectionHandle,
        success: bool,
        apn: String,
    },
    InformServerMultiOpenStatus {
        handle: ConnectionHandle,
        success: bool,
        apn: String,
        pdp: PdpType,
    },
    InformServerCloseStatus {
        handle: ConnectionHandle,
        success: bool,
    },
    SetUmtsSlpServer {
        url: String,
    },
    SetCdmaPdeServer {
        addr: Ipv4Addr,
        port: u16,
    },
    SetDataEnable(bool),
    SetApnProfile {
        apn: String,
    },
    SetSuplVersion(u32),
    InformNiUserResponse {
        id: NiRequestId,
        response: NiResponse,
    },
}

impl IoctlCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetFixCriteria(_) => "SET_FIX_CRITERIA",
            Self::InjectUtcTime { .. } => "INJECT_UTC_TIME",
            Self::InjectPosition { .. } => "INJECT_POSITION",
            Self::DeleteAssistData(_) => "DELETE_ASSIST_DATA",
            Self::InformServerOpenStatus { .. } => "INFORM_SERVER_OPEN_STATUS",
            Self::InformServerMultiOpenStatus { .. } => "INFORM_SERVER_MULTI_OPEN_STATUS",
            Self::InformServerCloseStatus { .. } => "INFORM_SERVER_CLOSE_STATUS",
            Self::SetUmtsSlpServer { .. } => "SET_UMTS_SLP_SERVER_ADDR",
            Self::SetCdmaPdeServer { .. } => "SET_CDMA_PDE_SERVER_ADDR",
            Self::SetDataEnable(_) => "SET_DATA_ENABLE",
            Self::SetApnProfile { .. } => "SET_LBS_APN_PROFILE",
            Self::SetSuplVersion(_) => "SET_SUPL_VERSION",
            Self::InformNiUserResponse { .. } => "INFORM_NI_USER_RESPONSE",
        }
    }
}

/// Remote-call channel to the positioning service.
///
/// Implementations deliver modem events and restart notifications through
/// the ingress handle given at [`open`](Self::open), from any thread.
pub trait LocTransport: Send + Sync {
    /// Open a client session subscribed to `events`.
    ///
    /// Events may be reported through `ingress` before this returns. They are
    /// held and kept when reported for the returned handle.
    fn open(&self, events: EventMask, ingress: ModemIngress)
        -> Result<ClientHandle, TransportError>;

    /// Close a client session.
    fn close(&self, client: ClientHandle) -> Result<(), TransportError>;

    /// Drop stale per-client state left over from before a modem restart.
    fn clear(&self, client: ClientHandle) -> Result<(), TransportError>;

    fn start_fix(&self, client: ClientHandle) -> Result<(), TransportError>;

    fn stop_fix(&self, client: ClientHandle) -> Result<(), TransportError>;

    fn ioctl(&self, client: ClientHandle, command: IoctlCommand) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_default_mask() {
        let mask = EventMask::ENGINE_DEFAULT;
        assert!(mask.contains(EventMask::PARSED_POSITION_REPORT));
        assert!(mask.contains(EventMask::NI_NOTIFY_VERIFY_REQUEST));
        assert!(mask.contains(EventMask::IOCTL_REPORT));
        assert!(!mask.contains(EventMask::NMEA_POSITION_REPORT));
    }

    #[test]
    fn test_ioctl_names() {
        let cmd = IoctlCommand::InformServerCloseStatus {
            handle: ConnectionHandle(4),
            success: true,
        };
        assert_eq!(cmd.name(), "INFORM_SERVER_CLOSE_STATUS");
        assert_eq!(IoctlCommand::SetDataEnable(true).name(), "SET_DATA_ENABLE");
    }
}
