// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mute-session filter.
//!
//! ```text
//!   NONE ──mute_one_session()──▶ WAIT ──SESSION_BEGIN | ENGINE_ON──▶ IN_SESSION
//!    ▲                                                                   │
//!    └────────────────────SESSION_END | ENGINE_OFF───────────────────────┘
//! ```
//!
//! While IN_SESSION, position and satellite reports are dropped. Status
//! suppression follows the host's navigating flag and is independent of the
//! mute state.

use crate::types::EngineStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MuteSessionState {
    #[default]
    None,
    Wait,
    InSession,
}

/// Mute state plus the drop decisions that depend on it.
#[derive(Debug, Default)]
pub struct MuteFilter {
    state: MuteSessionState,
}

impl MuteFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MuteSessionState {
        self.state
    }

    /// Arm a mute for the next session.
    pub fn arm(&mut self) {
        log::debug!("[mute] state {:?} -> Wait", self.state);
        self.state = MuteSessionState::Wait;
    }

    pub fn reset(&mut self) {
        self.state = MuteSessionState::None;
    }

    /// Advance the mute state for a status about to be processed.
    pub fn on_status(&mut self, status: EngineStatus) {
        match (self.state, status) {
            (MuteSessionState::Wait, EngineStatus::SessionBegin | EngineStatus::EngineOn) => {
                log::debug!("[mute] Wait -> InSession on {}", status);
                self.state = MuteSessionState::InSession;
            }
            (MuteSessionState::InSession, EngineStatus::SessionEnd | EngineStatus::EngineOff) => {
                log::debug!("[mute] InSession -> None on {}", status);
                self.state = MuteSessionState::None;
            }
            _ => {}
        }
    }

    /// Whether position/satellite reports are currently dropped.
    pub fn drops_reports(&self) -> bool {
        self.state == MuteSessionState::InSession
    }
}

/// Whether a status should reach the host given the host's tracking state.
///
/// A SESSION_END while the host still navigates and a SESSION_BEGIN while it
/// does not are redundant. `NONE` is never delivered.
pub fn should_deliver_status(status: EngineStatus, navigating: bool) -> bool {
    match status {
        EngineStatus::None => false,
        EngineStatus::SessionEnd => !navigating,
        EngineStatus::SessionBegin => navigating,
        EngineStatus::EngineOn | EngineStatus::EngineOff => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_enters_session_on_begin() {
        let mut filter = MuteFilter::new();
        filter.arm();
        assert_eq!(filter.state(), MuteSessionState::Wait);
        assert!(!filter.drops_reports());

        filter.on_status(EngineStatus::SessionBegin);
        assert_eq!(filter.state(), MuteSessionState::InSession);
        assert!(filter.drops_reports());

        filter.on_status(EngineStatus::SessionEnd);
        assert_eq!(filter.state(), MuteSessionState::None);
    }

    #[test]
    fn test_engine_on_off_bound_session() {
        let mut filter = MuteFilter::new();
        filter.arm();
        filter.on_status(EngineStatus::EngineOn);
        assert!(filter.drops_reports());

        filter.on_status(EngineStatus::SessionBegin);
        assert!(filter.drops_reports());

        filter.on_status(EngineStatus::EngineOff);
        assert!(!filter.drops_reports());
    }

    #[test]
    fn test_end_without_wait_is_ignored() {
        let mut filter = MuteFilter::new();
        filter.on_status(EngineStatus::SessionEnd);
        filter.on_status(EngineStatus::SessionBegin);
        assert_eq!(filter.state(), MuteSessionState::None);

        // WAIT does not leave on an end event.
        filter.arm();
        filter.on_status(EngineStatus::EngineOff);
        assert_eq!(filter.state(), MuteSessionState::Wait);
    }

    #[test]
    fn test_status_delivery() {
        assert!(!should_deliver_status(EngineStatus::SessionEnd, true));
        assert!(should_deliver_status(EngineStatus::SessionEnd, false));
        assert!(!should_deliver_status(EngineStatus::SessionBegin, false));
        assert!(should_deliver_status(EngineStatus::SessionBegin, true));
        assert!(should_deliver_status(EngineStatus::EngineOn, false));
        assert!(should_deliver_status(EngineStatus::EngineOff, true));
        assert!(!should_deliver_status(EngineStatus::None, true));
    }
}
