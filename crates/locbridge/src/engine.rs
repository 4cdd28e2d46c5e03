// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-facing engine.
//!
//! Host commands run on the caller's thread and call the transport directly.
//! Only a transport failure that signals a modem restart is turned into
//! deferred work (MODEM_DOWN) for the worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::atl::ConnState;
use crate::config::{EngineConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::event::{NiRequestId, NiResponse};
use crate::host::HostCallbacks;
use crate::ingest::ModemIngress;
use crate::mute::MuteSessionState;
use crate::recovery::server_url;
use crate::state::{DeferredActions, EngineShared};
use crate::transport::{IoctlCommand, LocTransport, TransportError};
use crate::types::{
    AgpsType, AidingDataMask, BearerType, ClientHandle, ConnectionHandle, EngineStatus,
    FixCriteria, PositionMode, Recurrence,
};
use crate::worker::WorkerHandle;

/// Longest APN name forwarded to the modem, in characters.
pub const MAX_APN_LEN: usize = 99;

/// Horizontal confidence attached to injected positions (one sigma).
const INJECTED_POSITION_CONFIDENCE: u8 = 63;

/// Location engine adapter.
///
/// # Example
/// ```ignore
/// let engine = LocEngine::new(EngineConfig::default(), transport)?;
/// let (host, notifications) = ChannelCallbacks::new();
/// engine.init(Arc::new(host))?;
/// engine.set_position_mode(PositionMode::MsBased, Recurrence::Periodic, 1000, 0, 0)?;
/// engine.start()?;
/// ```
pub struct LocEngine {
    shared: Arc<EngineShared>,
    /// Serializes init/cleanup and owns the worker.
    lifecycle: Mutex<Option<WorkerHandle>>,
}

impl LocEngine {
    /// Create an engine bound to `transport`. Nothing runs until [`init`](Self::init).
    pub fn new(config: EngineConfig, transport: Arc<dyn LocTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(EngineShared::new(config, transport)),
            lifecycle: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Handle for the transport to deliver events with.
    pub fn ingress(&self) -> ModemIngress {
        ModemIngress::new(&self.shared)
    }

    /// Register the host, start the worker and open the client session.
    ///
    /// Calling `init` while initialized is a no-op.
    pub fn init(&self, host: Arc<dyn HostCallbacks>) -> Result<()> {
        let mut worker = self.lifecycle.lock();

        if self.shared.state.lock().inited {
            log::debug!("[engine] already initialized");
            return Ok(());
        }

        host.set_capabilities(self.shared.config.capabilities);

        {
            let mut state = self.shared.state.lock();
            state.reset_session(host);
            if state.supl_server.is_none() {
                state.supl_server = self.shared.config.supl_server.clone();
            }
            if state.c2k_server.is_none() {
                state.c2k_server = self.shared.config.c2k_server.clone();
            }
        }

        if worker.is_none() {
            let handle = WorkerHandle::spawn(Arc::clone(&self.shared)).map_err(Error::WorkerSpawn)?;
            *worker = Some(handle);
        }

        self.shared.state.lock().inited = true;

        match self.shared.open_client() {
            Ok(client) => {
                log::info!("[engine] initialized, client {}", client.0);
                Ok(())
            }
            // Recovery reopens the client once the modem is back.
            Err(TransportError::ModemRestart) => Err(Error::ModemRestart),
            Err(err) => {
                self.shared.state.lock().inited = false;
                Err(err.into())
            }
        }
    }

    /// Stop an active fix, close the client and join the worker.
    pub fn cleanup(&self) {
        let mut worker = self.lifecycle.lock();

        let (inited, navigating, client) = {
            let state = self.shared.state.lock();
            (state.inited, state.navigating, state.client)
        };

        if inited {
            if let Some(client) = client {
                if navigating {
                    log::debug!("[engine] fix not stopped, stopping it now");
                    let _ = self.shared.check(self.shared.transport.stop_fix(client), "stop_fix");
                }
                log::debug!("[engine] closing client {}", client.0);
                let _ = self.shared.check(self.shared.transport.close(client), "close");
            }
            let mut state = self.shared.state.lock();
            state.inited = false;
            state.navigating = false;
            state.client = None;
        }

        if let Some(mut handle) = worker.take() {
            handle.shutdown();
        }

        let mut state = self.shared.state.lock();
        state.release_wakelock();
        state.host = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.state.lock().inited
    }

    fn client(&self) -> Result<ClientHandle> {
        let state = self.shared.state.lock();
        if !state.inited {
            return Err(Error::NotReady);
        }
        state.client.ok_or(Error::NotReady)
    }

    fn ensure_inited(&self) -> Result<()> {
        if self.shared.state.lock().inited {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    fn ioctl(&self, client: ClientHandle, command: IoctlCommand) -> Result<()> {
        let name = command.name();
        self.shared
            .check(self.shared.transport.ioctl(client, command), name)?;
        Ok(())
    }

    /// Start the tracking session.
    pub fn start(&self) -> Result<()> {
        let client = self.client()?;
        log::debug!("[engine] start");

        self.shared.state.lock().stop_request_pending = false;

        let result = self
            .shared
            .check(self.shared.transport.start_fix(client), "start_fix");
        if matches!(result, Ok(()) | Err(TransportError::ModemRestart)) {
            // Recovery restarts the fix when the modem is back.
            self.shared.state.lock().navigating = true;
        }
        result.map_err(Error::from)
    }

    /// Stop the tracking session.
    ///
    /// While the modem waits on a data connection the stop is deferred until
    /// the host reports the connection outcome.
    pub fn stop(&self) -> Result<()> {
        let client = self.client()?;

        {
            let mut state = self.shared.state.lock();
            if state.agps_request_pending {
                log::debug!("[engine] deferring stop until AGPS data call is finished");
                state.stop_request_pending = true;
                state.navigating = false;
                return Ok(());
            }
        }

        log::debug!("[engine] stop");
        let result = self
            .shared
            .check(self.shared.transport.stop_fix(client), "stop_fix");

        let session = {
            let mut state = self.shared.state.lock();
            state.navigating = false;
            state.session_begin_end
        };
        if result.is_ok() && session != EngineStatus::SessionBegin {
            self.shared.inform_status(EngineStatus::SessionEnd);
        }
        result.map_err(Error::from)
    }

    /// Set the fix mode and rate. Kept for replay after a modem restart.
    pub fn set_position_mode(
        &self,
        mode: PositionMode,
        recurrence: Recurrence,
        min_interval_ms: u32,
        preferred_accuracy_m: u32,
        preferred_time_ms: u32,
    ) -> Result<()> {
        let client = self.client()?;
        let criteria = FixCriteria::from_host(
            mode,
            recurrence,
            min_interval_ms,
            preferred_accuracy_m,
            preferred_time_ms,
        );
        log::debug!("[engine] set_position_mode {:?}", criteria);

        self.shared.state.lock().fix_criteria = Some(criteria);
        self.ioctl(client, IoctlCommand::SetFixCriteria(criteria))
    }

    /// Inject UTC time sampled at `time_reference_ms` on the host clock.
    pub fn inject_time(
        &self,
        time_utc_ms: i64,
        time_reference_ms: i64,
        uncertainty_ms: u32,
    ) -> Result<()> {
        let client = self.client()?;
        let now = self
            .shared
            .host()
            .map(|host| host.elapsed_realtime_ms())
            .unwrap_or(time_reference_ms);

        log::debug!("[engine] inject_time, uncertainty = {} ms", uncertainty_ms);
        self.ioctl(
            client,
            IoctlCommand::InjectUtcTime {
                time_utc_ms: time_utc_ms + (now - time_reference_ms),
                uncertainty_ms,
            },
        )
    }

    /// Inject a coarse position.
    pub fn inject_location(&self, latitude: f64, longitude: f64, accuracy_m: f32) -> Result<()> {
        let client = self.client()?;
        log::debug!(
            "[engine] inject position lat={} lon={} acc={:.2}",
            latitude,
            longitude,
            accuracy_m
        );
        self.ioctl(
            client,
            IoctlCommand::InjectPosition {
                latitude,
                longitude,
                hor_unc_circular_m: accuracy_m,
                confidence: INJECTED_POSITION_CONFIDENCE,
            },
        )
    }

    /// Request deletion of aiding data.
    ///
    /// Deletion happens on the worker once the engine is not ON; requests
    /// made while ON accumulate until the next ENGINE_OFF.
    pub fn delete_aiding_data(&self, mask: AidingDataMask) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.inited {
            return Err(Error::NotReady);
        }

        state.aiding_mask |= mask;
        if state.engine_on_off != EngineStatus::EngineOn && !state.aiding_mask.is_empty() {
            state.set_actions(DeferredActions::DELETE_AIDING);
            self.shared.wake.notify_one();
        } else {
            log::debug!("[engine] aiding deletion deferred until engine off");
        }
        Ok(())
    }

    /// Mute position, satellite and redundant status reports for the next
    /// session.
    pub fn mute_one_session(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.inited {
            return Err(Error::NotReady);
        }
        state.mute.arm();
        Ok(())
    }

    /// Enable AGPS: reset the ATL table and apply buffered server addresses.
    pub fn agps_init(&self) {
        log::debug!("[engine] agps_init");
        self.shared.state.lock().agps_enabled = true;
        self.shared.agps_reinit();
    }

    /// Set an AGPS server address.
    ///
    /// The address is buffered and re-issued after every modem restart; it
    /// is also sent right away when the client is open.
    pub fn set_server(&self, agps_type: AgpsType, host: &str, port: u16) -> Result<()> {
        if agps_type == AgpsType::Supl {
            server_url(host, port)?;
        }

        let server = ServerConfig {
            host: host.to_string(),
            port,
        };
        let ready = {
            let mut state = self.shared.state.lock();
            match agps_type {
                AgpsType::Supl => state.supl_server = Some(server),
                AgpsType::C2k => state.c2k_server = Some(server),
                other => {
                    log::error!("[engine] unknown server type {:?}", other);
                    return Ok(());
                }
            }
            state.inited && state.client.is_some()
        };

        if ready {
            self.shared.apply_server(agps_type, host, port)
        } else {
            log::warn!(
                "[engine] set_server before init, saved {:?} {}:{}",
                agps_type,
                host,
                port
            );
            Ok(())
        }
    }

    fn set_apn(&self, client: ClientHandle, apn: &str) -> Result<()> {
        let apn: String = if apn.chars().count() > MAX_APN_LEN {
            log::error!("[engine] APN name exceeds {} characters", MAX_APN_LEN);
            apn.chars().take(MAX_APN_LEN).collect()
        } else {
            apn.to_string()
        };

        log::debug!("[engine] APN = [{}]", apn);
        self.shared.state.lock().apn = apn.clone();
        self.ioctl(client, IoctlCommand::SetApnProfile { apn })
    }

    /// Host brought the data connection up.
    pub fn data_conn_open(&self, apn: &str, bearer: BearerType) -> Result<()> {
        let client = self.client()?;
        log::debug!("[engine] data_conn_open APN = [{}] {:?}", apn, bearer);

        self.shared.state.lock().bearer = bearer;
        if let Err(err) = self.set_apn(client, apn) {
            log::warn!("[engine] APN update failed: {}", err);
        }
        self.shared.post(DeferredActions::AGPS_DATA_OPEN_SUCCESS);
        Ok(())
    }

    /// Host tore the data connection down.
    pub fn data_conn_closed(&self) -> Result<()> {
        self.ensure_inited()?;
        log::debug!("[engine] data_conn_closed");
        self.shared.post(DeferredActions::AGPS_DATA_CLOSED);
        Ok(())
    }

    /// Host failed to bring the data connection up or down.
    pub fn data_conn_failed(&self) -> Result<()> {
        self.ensure_inited()?;
        log::debug!("[engine] data_conn_failed");
        self.shared.post(DeferredActions::AGPS_DATA_FAILED);
        Ok(())
    }

    /// Network availability changed: data enable, then APN.
    pub fn update_network_availability(&self, available: bool, apn: &str) -> Result<()> {
        let client = self.client()?;
        self.ioctl(client, IoctlCommand::SetDataEnable(available))?;
        self.set_apn(client, apn)
    }

    /// Forward the user's answer to a network-initiated request.
    pub fn respond_ni(&self, id: NiRequestId, response: NiResponse) -> Result<()> {
        let client = self.client()?;

        let known = {
            let mut state = self.shared.state.lock();
            match state.ni_pending.iter().position(|pending| *pending == id) {
                Some(index) => {
                    state.ni_pending.remove(index);
                    true
                }
                None => false,
            }
        };
        if !known {
            log::warn!("[engine] response for unknown NI request {:?} ignored", id);
            return Ok(());
        }

        log::debug!("[engine] NI response {:?} for {:?}", response, id);
        self.ioctl(client, IoctlCommand::InformNiUserResponse { id, response })
    }

    /// Block until the worker is waiting with nothing pending.
    ///
    /// Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let running = self
            .lifecycle
            .lock()
            .as_ref()
            .is_some_and(WorkerHandle::is_running);
        if !running {
            return true;
        }

        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.has_work() || !state.worker_waiting {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return !state.has_work() && state.worker_waiting;
            }
        }
        true
    }

    /// Last ENGINE_ON/OFF status seen.
    pub fn engine_status(&self) -> EngineStatus {
        self.shared.state.lock().engine_on_off
    }

    /// Last SESSION_BEGIN/END status seen.
    pub fn session_status(&self) -> EngineStatus {
        self.shared.state.lock().session_begin_end
    }

    pub fn mute_state(&self) -> MuteSessionState {
        self.shared.state.lock().mute.state()
    }

    pub fn is_navigating(&self) -> bool {
        self.shared.state.lock().navigating
    }

    pub fn pending_aiding_data(&self) -> AidingDataMask {
        self.shared.state.lock().aiding_mask
    }

    /// ATL state of `handle`, `None` when it holds no slot.
    pub fn atl_state(&self, handle: ConnectionHandle) -> Option<ConnState> {
        self.shared.state.lock().atl.state_of(handle)
    }
}

impl Drop for LocEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}
