// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ATL data-connection session table.
//!
//! The modem asks for a data connection per handle; the host provides one
//! shared connection for all of them. The table reconciles the two: it tracks
//! each handle in a fixed-capacity slot array and decides, per request and per
//! host acknowledgment, which host calls and modem acknowledgments to issue.
//!
//! The table is pure state. It returns [`AtlEffect`]s and the worker performs
//! them outside the state lock.
//!
//! ## Transitions
//!
//! ```text
//! request   state            effect
//! open      IDLE             another OPEN        -> ack open ok, OPEN
//!                            another OPEN_REQ    -> wait, OPEN_REQ
//!                            otherwise           -> host request, OPEN_REQ
//! open      OPEN             ack open ok
//! open      OPEN_REQ         none (pending ack covers it)
//! open      CLOSE_REQ        ack open failure, stays CLOSE_REQ so the
//!                            pending close still gets its own ack
//! close     OPEN             others all idle     -> host release, CLOSE_REQ
//!                            otherwise           -> ack close ok, freed
//! close     IDLE             ack close ok, freed
//! close     OPEN_REQ         ack close failure (pending open still acked)
//! close     CLOSE_REQ        none
//! ```
//!
//! Each request is acknowledged once, either immediately or when the host
//! reports the outcome of the shared connection. A request repeated while
//! its handle is pending shares the pending acknowledgment.

use std::fmt;

use thiserror::Error;

use crate::types::{AgpsStatusValue, AgpsType, ConnectionHandle};

/// Maximum number of simultaneous connection handles.
pub const MAX_NUM_ATL_CONNECTIONS: usize = 10;

/// Per-handle connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    #[default]
    Idle,
    OpenRequested,
    Open,
    CloseRequested,
}

/// How the modem asked for the connection; selects the acknowledgment form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnKind {
    /// Plain open; acknowledged with an open status.
    #[default]
    Single,
    /// Multi-open with a declared connection type; acknowledged with a
    /// multi-open status carrying the PDP type.
    Multi(AgpsType),
}

impl ConnKind {
    /// Connection type announced to the host.
    pub fn agps_type(self) -> AgpsType {
        match self {
            Self::Single => AgpsType::Supl,
            Self::Multi(agps_type) => agps_type,
        }
    }
}

/// One slot of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtlConnectionInfo {
    pub active: bool,
    pub handle: Option<ConnectionHandle>,
    pub state: ConnState,
    pub kind: ConnKind,
}

/// Request drained from a modem server request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlRequest {
    Open {
        handle: ConnectionHandle,
        kind: ConnKind,
    },
    Close {
        handle: ConnectionHandle,
    },
}

impl AtlRequest {
    pub fn handle(&self) -> ConnectionHandle {
        match *self {
            Self::Open { handle, .. } | Self::Close { handle } => handle,
        }
    }
}

/// Action to perform after a table transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlEffect {
    /// Ask the host to bring up or tear down the data connection.
    Host {
        agps_type: AgpsType,
        status: AgpsStatusValue,
    },
    /// Report an open outcome to the modem.
    AckOpen {
        handle: ConnectionHandle,
        kind: ConnKind,
        success: bool,
    },
    /// Report a close outcome to the modem.
    AckClose {
        handle: ConnectionHandle,
        success: bool,
    },
}

impl AtlEffect {
    /// Handle acknowledged by this effect, if it is a modem acknowledgment.
    pub fn acked_handle(&self) -> Option<ConnectionHandle> {
        match *self {
            Self::AckOpen { handle, .. } | Self::AckClose { handle, .. } => Some(handle),
            Self::Host { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AtlError {
    #[error("no free ATL slot for handle {handle}")]
    NoFreeSlot { handle: ConnectionHandle },
}

/// Fixed-capacity ATL session table.
pub struct AtlTable {
    slots: [AtlConnectionInfo; MAX_NUM_ATL_CONNECTIONS],
}

impl Default for AtlTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AtlTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().filter(|slot| slot.active))
            .finish()
    }
}

impl AtlTable {
    pub fn new() -> Self {
        Self {
            slots: [AtlConnectionInfo::default(); MAX_NUM_ATL_CONNECTIONS],
        }
    }

    /// Free every slot.
    pub fn reset(&mut self) {
        self.slots = [AtlConnectionInfo::default(); MAX_NUM_ATL_CONNECTIONS];
    }

    /// State of `handle`, or `None` if it holds no slot.
    pub fn state_of(&self, handle: ConnectionHandle) -> Option<ConnState> {
        self.find(handle).map(|index| self.slots[index].state)
    }

    /// Whether any handle waits on the host bringing the connection up.
    pub fn open_pending(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.active && slot.state == ConnState::OpenRequested)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    fn find(&self, handle: ConnectionHandle) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.active && slot.handle == Some(handle))
    }

    /// Find the slot for `handle`, allocating the first free one.
    fn lookup_or_allocate(&mut self, handle: ConnectionHandle) -> Result<usize, AtlError> {
        if let Some(index) = self.find(handle) {
            return Ok(index);
        }

        let index = self
            .slots
            .iter()
            .position(|slot| !slot.active)
            .ok_or(AtlError::NoFreeSlot { handle })?;

        self.slots[index] = AtlConnectionInfo {
            active: true,
            handle: Some(handle),
            state: ConnState::Idle,
            kind: ConnKind::Single,
        };
        Ok(index)
    }

    fn any_other_in(&self, state: ConnState, index: usize) -> bool {
        self.slots
            .iter()
            .enumerate()
            .any(|(i, slot)| i != index && slot.active && slot.state == state)
    }

    fn all_others_idle(&self, index: usize) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(i, slot)| i == index || !slot.active || slot.state == ConnState::Idle)
    }

    fn free(&mut self, index: usize) {
        self.slots[index] = AtlConnectionInfo::default();
    }

    /// Apply a modem request.
    pub fn on_request(&mut self, request: AtlRequest) -> Result<Vec<AtlEffect>, AtlError> {
        let handle = request.handle();
        let index = self.lookup_or_allocate(handle)?;
        let slot = self.slots[index];

        log::debug!(
            "[atl] {:?} on slot {} (state {:?})",
            request,
            index,
            slot.state
        );

        let effects = match request {
            AtlRequest::Open { kind, .. } => self.on_open(index, handle, kind),
            AtlRequest::Close { .. } => self.on_close(index, handle),
        };
        Ok(effects)
    }

    fn on_open(&mut self, index: usize, handle: ConnectionHandle, kind: ConnKind) -> Vec<AtlEffect> {
        match self.slots[index].state {
            ConnState::Idle => {
                self.slots[index].kind = kind;
                if self.any_other_in(ConnState::Open, index) {
                    // Shared connection already up.
                    self.slots[index].state = ConnState::Open;
                    vec![AtlEffect::AckOpen {
                        handle,
                        kind,
                        success: true,
                    }]
                } else if self.any_other_in(ConnState::OpenRequested, index) {
                    log::debug!("[atl] open already requested for another handle");
                    self.slots[index].state = ConnState::OpenRequested;
                    Vec::new()
                } else {
                    self.slots[index].state = ConnState::OpenRequested;
                    vec![AtlEffect::Host {
                        agps_type: kind.agps_type(),
                        status: AgpsStatusValue::RequestDataConn,
                    }]
                }
            }
            ConnState::Open => vec![AtlEffect::AckOpen {
                handle,
                kind,
                success: true,
            }],
            ConnState::CloseRequested => {
                log::error!("[atl] open for handle {} while close requested", handle);
                vec![AtlEffect::AckOpen {
                    handle,
                    kind,
                    success: false,
                }]
            }
            ConnState::OpenRequested => {
                log::debug!("[atl] open for handle {} already pending", handle);
                Vec::new()
            }
        }
    }

    fn on_close(&mut self, index: usize, handle: ConnectionHandle) -> Vec<AtlEffect> {
        match self.slots[index].state {
            ConnState::Open => {
                if self.all_others_idle(index) {
                    self.slots[index].state = ConnState::CloseRequested;
                    vec![AtlEffect::Host {
                        agps_type: self.slots[index].kind.agps_type(),
                        status: AgpsStatusValue::ReleaseDataConn,
                    }]
                } else {
                    // Connection still used by another handle.
                    self.free(index);
                    vec![AtlEffect::AckClose {
                        handle,
                        success: true,
                    }]
                }
            }
            ConnState::Idle => {
                self.free(index);
                vec![AtlEffect::AckClose {
                    handle,
                    success: true,
                }]
            }
            ConnState::OpenRequested => {
                log::error!("[atl] close for handle {} while open requested", handle);
                vec![AtlEffect::AckClose {
                    handle,
                    success: false,
                }]
            }
            ConnState::CloseRequested => {
                log::debug!("[atl] close for handle {} already pending", handle);
                Vec::new()
            }
        }
    }

    /// Host brought the connection up (`true`) or failed to (`false`).
    ///
    /// Every slot waiting on the open is acknowledged. Failed slots are freed.
    pub fn on_host_opened(&mut self, success: bool) -> Vec<AtlEffect> {
        let mut effects = Vec::new();
        for index in 0..MAX_NUM_ATL_CONNECTIONS {
            let slot = self.slots[index];
            if !slot.active || slot.state != ConnState::OpenRequested {
                continue;
            }
            let Some(handle) = slot.handle else {
                continue;
            };

            effects.push(AtlEffect::AckOpen {
                handle,
                kind: slot.kind,
                success,
            });
            if success {
                self.slots[index].state = ConnState::Open;
            } else {
                self.free(index);
            }
        }
        effects
    }

    /// Host tore the connection down (`true`) or failed to (`false`).
    ///
    /// Every slot waiting on the close is acknowledged and freed.
    pub fn on_host_closed(&mut self, success: bool) -> Vec<AtlEffect> {
        let mut effects = Vec::new();
        for index in 0..MAX_NUM_ATL_CONNECTIONS {
            let slot = self.slots[index];
            if !slot.active || slot.state != ConnState::CloseRequested {
                continue;
            }
            if let Some(handle) = slot.handle {
                effects.push(AtlEffect::AckClose { handle, success });
            }
            self.free(index);
        }
        effects
    }

    /// Host reported a connection failure.
    ///
    /// Pending opens fail first; without any, pending closes fail.
    pub fn on_host_failed(&mut self) -> Vec<AtlEffect> {
        if self.open_pending() {
            self.on_host_opened(false)
        } else {
            self.on_host_closed(false)
        }
    }
}
