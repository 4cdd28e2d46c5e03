// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-facing notification interface.
//!
//! [`HostCallbacks`] is the listener the engine reports to. Every method has a
//! no-op default so a host implements only what it consumes.
//! [`ChannelCallbacks`] forwards every notification onto a channel instead.

use std::sync::OnceLock;
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};

use crate::event::NiNotification;
use crate::types::{AgpsStatus, EngineStatus, Location, SvStatus};

/// Listener for engine notifications.
///
/// Report callbacks run on the engine's worker thread. The wake-lock pair is
/// invoked with the engine's state lock held and must not call back into the
/// engine.
pub trait HostCallbacks: Send + Sync {
    fn set_capabilities(&self, _capabilities: u32) {}

    fn status(&self, _status: EngineStatus) {}

    fn location(&self, _location: &Location) {}

    fn sv_status(&self, _sv_status: &SvStatus) {}

    fn nmea(&self, _timestamp_ms: i64, _sentence: &str) {}

    /// Request or release of the AGPS data connection.
    fn agps_status(&self, _status: &AgpsStatus) {}

    fn acquire_wakelock(&self) {}

    fn release_wakelock(&self) {}

    /// Modem asked for predicted-orbit (XTRA) data.
    fn xtra_download_request(&self) {}

    fn ni_notify(&self, _notification: &NiNotification) {}

    /// Monotonic host clock used to age injected time, in milliseconds.
    fn elapsed_realtime_ms(&self) -> i64 {
        static START: OnceLock<Instant> = OnceLock::new();
        let start = START.get_or_init(Instant::now);
        i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// Notification forwarded by [`ChannelCallbacks`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    Capabilities(u32),
    Status(EngineStatus),
    Location(Location),
    SvStatus(SvStatus),
    Nmea { timestamp_ms: i64, sentence: String },
    Agps(AgpsStatus),
    WakelockAcquired,
    WakelockReleased,
    XtraDownloadRequest,
    NiNotify(NiNotification),
}

/// Host adapter that turns callbacks into channel messages.
#[derive(Debug, Clone)]
pub struct ChannelCallbacks {
    tx: Sender<HostNotification>,
}

impl ChannelCallbacks {
    /// Create an adapter and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<HostNotification>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, notification: HostNotification) {
        if self.tx.send(notification).is_err() {
            log::trace!("[host] notification receiver dropped");
        }
    }
}

impl HostCallbacks for ChannelCallbacks {
    fn set_capabilities(&self, capabilities: u32) {
        self.send(HostNotification::Capabilities(capabilities));
    }

    fn status(&self, status: EngineStatus) {
        self.send(HostNotification::Status(status));
    }

    fn location(&self, location: &Location) {
        self.send(HostNotification::Location(*location));
    }

    fn sv_status(&self, sv_status: &SvStatus) {
        self.send(HostNotification::SvStatus(sv_status.clone()));
    }

    fn nmea(&self, timestamp_ms: i64, sentence: &str) {
        self.send(HostNotification::Nmea {
            timestamp_ms,
            sentence: sentence.to_string(),
        });
    }

    fn agps_status(&self, status: &AgpsStatus) {
        self.send(HostNotification::Agps(*status));
    }

    fn acquire_wakelock(&self) {
        self.send(HostNotification::WakelockAcquired);
    }

    fn release_wakelock(&self) {
        self.send(HostNotification::WakelockReleased);
    }

    fn xtra_download_request(&self) {
        self.send(HostNotification::XtraDownloadRequest);
    }

    fn ni_notify(&self, notification: &NiNotification) {
        self.send(HostNotification::NiNotify(notification.clone()));
    }
}
