// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared state block.
//!
//! One [`SharedState`] guarded by one mutex is the only place the transport
//! callback thread, the worker thread and host command threads meet. The
//! paired `wake` condvar wakes the worker; `idle` wakes [`wait_idle`] callers.
//!
//! [`wait_idle`]: crate::LocEngine::wait_idle

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::atl::{AtlRequest, AtlTable};
use crate::config::{EngineConfig, ServerConfig};
use crate::event::{ModemEvent, NiRequestId};
use crate::host::HostCallbacks;
use crate::mute::MuteFilter;
use crate::transport::LocTransport;
use crate::types::{AidingDataMask, BearerType, ClientHandle, EngineStatus, FixCriteria};

/// Bitmask of work pending for the worker.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct DeferredActions(pub u32);

impl DeferredActions {
    pub const QUIT: Self = Self(0x0001);
    pub const EVENT_PENDING: Self = Self(0x0002);
    pub const AGPS_DATA_OPEN_SUCCESS: Self = Self(0x0004);
    pub const AGPS_DATA_CLOSED: Self = Self(0x0008);
    pub const AGPS_DATA_FAILED: Self = Self(0x0010);
    pub const DELETE_AIDING: Self = Self(0x0020);
    pub const MODEM_DOWN: Self = Self(0x0040);
    pub const MODEM_UP: Self = Self(0x0080);

    /// Host outcomes for the data connection.
    pub const AGPS_OUTCOME: Self = Self(
        Self::AGPS_DATA_OPEN_SUCCESS.0 | Self::AGPS_DATA_CLOSED.0 | Self::AGPS_DATA_FAILED.0,
    );

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for DeferredActions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for DeferredActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(DeferredActions, &str); 8] = [
            (DeferredActions::QUIT, "QUIT"),
            (DeferredActions::EVENT_PENDING, "EVENT"),
            (DeferredActions::AGPS_DATA_OPEN_SUCCESS, "AGPS_OPEN_SUCCESS"),
            (DeferredActions::AGPS_DATA_CLOSED, "AGPS_CLOSED"),
            (DeferredActions::AGPS_DATA_FAILED, "AGPS_FAILED"),
            (DeferredActions::DELETE_AIDING, "DELETE_AIDING"),
            (DeferredActions::MODEM_DOWN, "MODEM_DOWN"),
            (DeferredActions::MODEM_UP, "MODEM_UP"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "[{}]", names.join("|"))
    }
}

/// Everything the worker copies out in one pass.
#[derive(Debug, Default)]
pub struct Pass {
    pub events: Vec<ModemEvent>,
    pub actions: DeferredActions,
}

/// The shared state block.
pub struct SharedState {
    /// Host has called `init` and not `cleanup`.
    pub inited: bool,
    pub client: Option<ClientHandle>,
    pub host: Option<Arc<dyn HostCallbacks>>,
    /// A client open is in flight; events are held until its handle is known.
    pub opening: bool,
    pub early_events: Vec<(ClientHandle, ModemEvent)>,

    events: VecDeque<ModemEvent>,
    event_capacity: usize,
    actions: DeferredActions,
    wakelock_held: bool,
    /// Worker is blocked on `wake` with nothing to do.
    pub worker_waiting: bool,

    pub aiding_mask: AidingDataMask,
    /// Last ENGINE_ON/OFF.
    pub engine_on_off: EngineStatus,
    /// Last SESSION_BEGIN/END.
    pub session_begin_end: EngineStatus,
    /// Last status delivered to the host.
    pub last_delivered: EngineStatus,
    pub mute: MuteFilter,

    pub navigating: bool,
    pub fix_criteria: Option<FixCriteria>,
    pub agps_request_pending: bool,
    pub stop_request_pending: bool,

    pub agps_enabled: bool,
    pub bearer: BearerType,
    pub apn: String,
    pub supl_server: Option<ServerConfig>,
    pub c2k_server: Option<ServerConfig>,
    pub atl: AtlTable,
    pub atl_requests: VecDeque<AtlRequest>,

    pub ni_pending: Vec<NiRequestId>,
}

impl SharedState {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            inited: false,
            client: None,
            host: None,
            opening: false,
            early_events: Vec::new(),
            events: VecDeque::with_capacity(event_capacity),
            event_capacity: event_capacity.max(1),
            actions: DeferredActions::empty(),
            wakelock_held: false,
            worker_waiting: false,
            aiding_mask: AidingDataMask::empty(),
            engine_on_off: EngineStatus::None,
            session_begin_end: EngineStatus::None,
            last_delivered: EngineStatus::None,
            mute: MuteFilter::new(),
            navigating: false,
            fix_criteria: None,
            agps_request_pending: false,
            stop_request_pending: false,
            agps_enabled: false,
            bearer: BearerType::Invalid,
            apn: String::new(),
            supl_server: None,
            c2k_server: None,
            atl: AtlTable::new(),
            atl_requests: VecDeque::new(),
            ni_pending: Vec::new(),
        }
    }

    /// Reset per-session fields at init. Buffered servers survive.
    pub fn reset_session(&mut self, host: Arc<dyn HostCallbacks>) {
        self.host = Some(host);
        self.client = None;
        self.opening = false;
        self.early_events.clear();
        self.events.clear();
        self.actions = DeferredActions::empty();
        self.aiding_mask = AidingDataMask::empty();
        self.engine_on_off = EngineStatus::None;
        self.session_begin_end = EngineStatus::None;
        self.mute.reset();
        self.navigating = false;
        self.agps_request_pending = false;
        self.stop_request_pending = false;
        self.apn.clear();
        self.atl_requests.clear();
        self.ni_pending.clear();
    }

    /// Queue a modem event.
    ///
    /// When the queue is full the oldest periodic report is dropped first;
    /// only if none is queued does the oldest event go.
    pub fn push_event(&mut self, event: ModemEvent) {
        if self.events.len() >= self.event_capacity {
            let victim = self
                .events
                .iter()
                .position(ModemEvent::is_periodic_report)
                .unwrap_or(0);
            if let Some(dropped) = self.events.remove(victim) {
                if dropped.is_periodic_report() {
                    log::warn!("[ingest] event queue full, dropped {} report", dropped.kind());
                } else {
                    log::error!("[ingest] event queue full, dropped {} event", dropped.kind());
                }
            }
        }
        self.events.push_back(event);
        self.set_actions(DeferredActions::EVENT_PENDING);
    }

    /// OR `bits` into the pending actions, holding the host wake lock.
    pub fn set_actions(&mut self, bits: DeferredActions) {
        self.actions.insert(bits);
        self.acquire_wakelock();
    }

    pub fn actions(&self) -> DeferredActions {
        self.actions
    }

    pub fn has_work(&self) -> bool {
        !self.actions.is_empty() || !self.events.is_empty()
    }

    #[cfg(test)]
    pub fn queued_events(&self) -> usize {
        self.events.len()
    }

    /// Copy out and clear the queued events and action flags.
    pub fn take_pass(&mut self) -> Pass {
        Pass {
            events: self.events.drain(..).collect(),
            actions: std::mem::take(&mut self.actions),
        }
    }

    pub fn acquire_wakelock(&mut self) {
        if self.wakelock_held {
            return;
        }
        if let Some(host) = &self.host {
            host.acquire_wakelock();
            self.wakelock_held = true;
        }
    }

    pub fn release_wakelock(&mut self) {
        if !self.wakelock_held {
            return;
        }
        if let Some(host) = &self.host {
            host.release_wakelock();
        }
        self.wakelock_held = false;
    }
}

/// State block plus the synchronization and collaborators around it.
pub struct EngineShared {
    pub state: Mutex<SharedState>,
    /// Wakes the worker.
    pub wake: Condvar,
    /// Signalled when the worker goes idle or exits.
    pub idle: Condvar,
    pub transport: Arc<dyn LocTransport>,
    pub config: EngineConfig,
}

impl EngineShared {
    pub fn new(config: EngineConfig, transport: Arc<dyn LocTransport>) -> Self {
        Self {
            state: Mutex::new(SharedState::new(config.event_queue_depth)),
            wake: Condvar::new(),
            idle: Condvar::new(),
            transport,
            config,
        }
    }

    /// Post deferred actions and wake the worker.
    pub fn post(&self, bits: DeferredActions) {
        let mut state = self.state.lock();
        state.set_actions(bits);
        self.wake.notify_one();
    }

    /// Host callbacks, if a host is registered.
    pub fn host(&self) -> Option<Arc<dyn HostCallbacks>> {
        self.state.lock().host.clone()
    }
}
